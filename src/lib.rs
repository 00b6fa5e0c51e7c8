//! # ChainSight: Inventory Analytics Pipeline
//!
//! **Version**: 0.1.0
//!
//! ChainSight turns a small-business inventory export into dashboard-ready
//! structures: validated rows, stock KPIs, category rollups, reorder and
//! supplier alerts, and per-product seasonal ARIMA demand forecasts.
//!
//! ## Pipeline
//!
//! ```text
//! CSV ─▶ RawTable ─▶ InventoryTable ─▶ Metrics / CategorySummary / alerts
//!            │
//!            └─▶ PreparedSeries ─▶ ForecastResult
//! ```
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: a bad row stops only itself (recorded as a skipped row),
//!   a missing column stops only the feature that needs it
//! - **Poka-Yoke**: column aliases resolve at the loader boundary; the
//!   forecast optimizer only visits stationary, invertible models
//! - **Genchi Genbutsu**: exports carry the uploaded headers and cells
//!   verbatim, plus the derived `Total_Value`
//! - **Muda elimination**: Top-K selection instead of full sorts, one export
//!   per upload (cached)
//!
//! ## Example Usage
//!
//! ```rust
//! use chainsight::config::PipelineConfig;
//! use chainsight::session::Session;
//!
//! # fn main() -> chainsight::Result<()> {
//! let mut session = Session::new(PipelineConfig::default());
//! session.upload_inventory(b"Product,Category,Available_Stock,Unit_Cost\nP1,A,10,2.0\nP2,B,0,5.0\n")?;
//!
//! let dashboard = session.dashboard()?;
//! assert_eq!(dashboard.metrics.total_value, 20.0);
//! assert_eq!(dashboard.metrics.out_of_stock_count, 1);
//! assert_eq!(dashboard.low_stock.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod forecast;
pub mod inventory;
pub mod session;
pub mod storage;
pub mod timeseries;
pub mod topk;

pub use config::PipelineConfig;
pub use error::{Error, ModelFitError, Result};
pub use forecast::{ForecastPoint, ForecastResult};
pub use inventory::{InventoryRecord, InventoryTable};
pub use session::{Dashboard, Session};
pub use storage::RawTable;
pub use timeseries::{PreparedSeries, TimeSeriesPoint};
