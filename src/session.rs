//! Interactive session state
//!
//! A [`Session`] owns everything that lives between user actions: the most
//! recent inventory upload, an optional separate history upload, and the
//! processed-export cache. Each action borrows the session; a new inventory
//! upload replaces the table and empties the cache.
//!
//! Toyota Way: Jidoka for features, not sessions. Every dashboard card is
//! computed into its own `Result`, so a missing `Category` column blanks
//! the category chart and nothing else.

use crate::aggregate::{aggregate, CategorySummary};
use crate::config::PipelineConfig;
use crate::forecast::{forecast, ForecastResult};
use crate::inventory::metrics::{
    delayed_suppliers, derive, low_stock_set, reorder_alerts, Metrics, ReorderAlert, SupplierDelay,
};
use crate::inventory::{InventoryRecord, InventoryTable, SkippedRow, TableId};
use crate::storage::export::processed_csv_bytes;
use crate::storage::RawTable;
use crate::timeseries::{prepare_with_aliases, products};
use crate::topk::{SortOrder, TopKSelection};
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Everything the dashboard renders for one upload
#[derive(Debug)]
pub struct Dashboard {
    /// Upload the cards were computed from
    pub table_id: TableId,
    /// KPI cards
    pub metrics: Metrics,
    /// Rows below the low-stock threshold
    pub low_stock: Vec<InventoryRecord>,
    /// Reorder alerts under the configured policy
    pub reorder_alerts: Vec<ReorderAlert>,
    /// Supplier delay alerts
    pub supplier_delays: Result<Vec<SupplierDelay>>,
    /// Category rollup
    pub categories: Result<CategorySummary>,
    /// Top rows by line value
    pub top_items: Result<RecordBatch>,
    /// Rows excluded during validation
    pub skipped_rows: Vec<SkippedRow>,
}

impl Dashboard {
    /// Features that could not be computed, with their errors
    #[must_use]
    pub fn failures(&self) -> Vec<(&'static str, &Error)> {
        let mut out = Vec::new();
        if let Err(e) = &self.supplier_delays {
            out.push(("supplier_delays", e));
        }
        if let Err(e) = &self.categories {
            out.push(("categories", e));
        }
        if let Err(e) = &self.top_items {
            out.push(("top_items", e));
        }
        out
    }
}

struct Upload {
    raw: RawTable,
    table: InventoryTable,
}

/// Session-scoped pipeline state
pub struct Session {
    config: PipelineConfig,
    inventory: Option<Upload>,
    history: Option<RawTable>,
    export_cache: FxHashMap<TableId, Arc<[u8]>>,
}

impl Session {
    /// Create an empty session
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            inventory: None,
            history: None,
            export_cache: FxHashMap::default(),
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replace the inventory with a new upload
    ///
    /// On failure the previous upload stays active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed files and
    /// [`Error::MissingColumn`] when the KPI columns are absent
    pub fn upload_inventory(&mut self, bytes: &[u8]) -> Result<TableId> {
        let raw = RawTable::from_bytes(bytes)?;
        let table = InventoryTable::from_raw(&raw, &self.config)?;
        let id = table.id();

        self.export_cache.clear();
        self.inventory = Some(Upload { raw, table });
        tracing::info!(table = %id, "inventory uploaded");
        Ok(id)
    }

    /// Upload a separate sales/stock history file for forecasting
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed files
    pub fn upload_history(&mut self, bytes: &[u8]) -> Result<()> {
        let raw = RawTable::from_bytes(bytes)?;
        tracing::info!(rows = raw.num_rows(), "history uploaded");
        self.history = Some(raw);
        Ok(())
    }

    /// Current inventory table
    #[must_use]
    pub fn current_table(&self) -> Option<&InventoryTable> {
        self.inventory.as_ref().map(|u| &u.table)
    }

    fn table(&self) -> Result<&InventoryTable> {
        self.current_table()
            .ok_or_else(|| Error::InvalidInput("no inventory file uploaded".to_string()))
    }

    /// History source: the history upload, else the inventory upload
    fn history_source(&self) -> Result<&RawTable> {
        self.history
            .as_ref()
            .or_else(|| self.inventory.as_ref().map(|u| &u.raw))
            .ok_or_else(|| Error::InvalidInput("no history file uploaded".to_string()))
    }

    /// Compute every dashboard card for the current upload
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if nothing has been uploaded.
    /// Per-feature failures are carried inside the [`Dashboard`].
    pub fn dashboard(&self) -> Result<Dashboard> {
        let table = self.table()?;
        let config = &self.config;

        let top_items = table
            .to_record_batch()
            .and_then(|batch| batch.top_k_by_name("total_value", config.top_n, SortOrder::Descending));

        let dashboard = Dashboard {
            table_id: table.id(),
            metrics: derive(table),
            low_stock: low_stock_set(table, config.low_stock_threshold)
                .into_iter()
                .cloned()
                .collect(),
            reorder_alerts: reorder_alerts(table, &config.reorder_policy),
            supplier_delays: delayed_suppliers(table, config.supplier_delay_days),
            categories: aggregate(table),
            top_items,
            skipped_rows: table.skipped_rows().to_vec(),
        };

        for (feature, error) in dashboard.failures() {
            tracing::warn!(feature, kind = error.kind(), %error, "dashboard feature unavailable");
        }
        Ok(dashboard)
    }

    /// Processed inventory CSV, built once per upload
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if nothing has been uploaded, or a
    /// writer error
    pub fn processed_export(&mut self) -> Result<Arc<[u8]>> {
        let table = self.table()?;
        let id = table.id();
        if let Some(bytes) = self.export_cache.get(&id) {
            return Ok(Arc::clone(bytes));
        }
        let bytes: Arc<[u8]> = processed_csv_bytes(table)?.into();
        tracing::debug!(table = %id, bytes = bytes.len(), "cached processed export");
        self.export_cache.insert(id, Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Products available for forecasting
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] with no upload, or
    /// [`Error::MissingColumn`] without a `Product` column
    pub fn forecast_products(&self) -> Result<Vec<String>> {
        products(self.history_source()?, &self.config.aliases)
    }

    /// Forecast one product from the history upload
    ///
    /// # Errors
    ///
    /// Any preparation or model-fit error; the session itself is unaffected
    pub fn forecast(&self, product: &str) -> Result<ForecastResult> {
        let raw = self.history_source()?;
        let result = prepare_with_aliases(raw, product, &self.config.series, &self.config.aliases)
            .and_then(|series| forecast(&series, &self.config.forecast));
        if let Err(error) = &result {
            tracing::warn!(product, kind = error.kind(), %error, "forecast unavailable");
        }
        result
    }
}
