//! Inventory KPIs
//!
//! Pure functions over a borrowed [`InventoryTable`]. Calling any of them
//! twice on the same table yields the same answer; none allocate more than
//! their output.
//!
//! Thresholds are strict: "low stock" is `stock < threshold`, "delayed" is
//! `days > max_days`.

use super::{InventoryRecord, InventoryTable};
use crate::config::{ReorderPolicy, DEFAULT_LOW_STOCK_THRESHOLD};
use crate::storage::schema::columns;
use crate::{Error, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Feature label for supplier-delay alerts
pub const FEATURE_SUPPLIER_DELAYS: &str = "supplier delay alerts";

/// Headline KPI cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Distinct non-empty product identifiers
    pub total_skus: usize,
    /// Σ line value
    pub total_value: f64,
    /// Rows with zero stock
    pub out_of_stock_count: usize,
    /// Accepted rows
    pub row_count: usize,
    /// Rows excluded during validation
    pub skipped_row_count: usize,
}

/// Compute the KPI cards
#[must_use]
pub fn derive(table: &InventoryTable) -> Metrics {
    let records = table.records();
    let total_skus = records
        .iter()
        .filter(|r| !r.product.is_empty())
        .map(|r| r.product.as_str())
        .collect::<FxHashSet<_>>()
        .len();
    let total_value = records.iter().map(InventoryRecord::total_value).sum();
    let out_of_stock_count = records.iter().filter(|r| r.available_stock == 0).count();

    tracing::debug!(
        table = %table.id(),
        total_skus,
        total_value,
        out_of_stock_count,
        "derived inventory metrics"
    );

    Metrics {
        total_skus,
        total_value,
        out_of_stock_count,
        row_count: records.len(),
        skipped_row_count: table.skipped_rows().len(),
    }
}

/// Rows with `available_stock < threshold`
#[must_use]
pub fn low_stock_set(table: &InventoryTable, threshold: u64) -> Vec<&InventoryRecord> {
    table
        .records()
        .iter()
        .filter(|r| r.available_stock < threshold)
        .collect()
}

impl ReorderPolicy {
    /// Default policy for `table`: per-row levels when the upload carries a
    /// `Reorder_Level` column, otherwise the fixed `threshold`
    #[must_use]
    pub const fn for_table(table: &InventoryTable, threshold: u64) -> Self {
        if table.has_reorder_level() {
            Self::PerRow {
                fallback: threshold,
            }
        } else {
            Self::Fixed { threshold }
        }
    }

    /// Threshold that applies to `record`
    #[must_use]
    pub fn threshold_for(&self, record: &InventoryRecord) -> u64 {
        match *self {
            Self::Fixed { threshold } => threshold,
            Self::PerRow { fallback } => record.reorder_level.unwrap_or(fallback),
        }
    }
}

/// Where a reorder threshold came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    /// The row's own `Reorder_Level`
    ReorderLevel,
    /// The fixed threshold
    Fixed,
}

/// One reorder alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderAlert {
    /// 1-based source line
    pub line: usize,
    /// Product identifier
    pub product: String,
    /// Units on hand
    pub available_stock: u64,
    /// Threshold the row was compared against
    pub threshold: u64,
    /// Origin of `threshold`
    pub source: ThresholdSource,
}

/// Rows whose stock is strictly below their reorder threshold
#[must_use]
pub fn reorder_alerts(table: &InventoryTable, policy: &ReorderPolicy) -> Vec<ReorderAlert> {
    table
        .records()
        .iter()
        .filter_map(|record| {
            let threshold = policy.threshold_for(record);
            (record.available_stock < threshold).then(|| ReorderAlert {
                line: record.line,
                product: record.product.clone(),
                available_stock: record.available_stock,
                threshold,
                source: match policy {
                    ReorderPolicy::PerRow { .. } if record.reorder_level.is_some() => {
                        ThresholdSource::ReorderLevel
                    }
                    _ => ThresholdSource::Fixed,
                },
            })
        })
        .collect()
}

/// Reorder alerts under the default policy with the default threshold
#[must_use]
pub fn default_reorder_alerts(table: &InventoryTable) -> Vec<ReorderAlert> {
    reorder_alerts(
        table,
        &ReorderPolicy::for_table(table, DEFAULT_LOW_STOCK_THRESHOLD),
    )
}

/// One supplier-delay alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDelay {
    /// 1-based source line
    pub line: usize,
    /// Product identifier
    pub product: String,
    /// Days since the last delivery
    pub days_since_last_delivery: u64,
}

/// Rows with `Days_Since_Last_Delivery > max_days`
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] when the upload has no
/// `Days_Since_Last_Delivery` column
pub fn delayed_suppliers(table: &InventoryTable, max_days: u64) -> Result<Vec<SupplierDelay>> {
    if !table.has_delivery_days() {
        return Err(Error::MissingColumn {
            column: columns::DAYS_SINCE_LAST_DELIVERY.to_string(),
            feature: FEATURE_SUPPLIER_DELAYS,
        });
    }
    Ok(table
        .records()
        .iter()
        .filter_map(|r| {
            let days = r.days_since_last_delivery?;
            (days > max_days).then(|| SupplierDelay {
                line: r.line,
                product: r.product.clone(),
                days_since_last_delivery: days,
            })
        })
        .collect())
}
