//! Category rollups
//!
//! Groups validated rows by category. Rows without a category (empty cell)
//! land in the [`UNKNOWN_CATEGORY`] bucket, so Σ `value_sum` over the rollup
//! always equals the table's total value.

use crate::inventory::InventoryTable;
use crate::storage::schema::columns;
use crate::{Error, Result};
use arrow::array::{Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bucket for rows with an empty category
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Feature label for category aggregation
pub const FEATURE_CATEGORY: &str = "category aggregation";

/// One category's totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRollup {
    /// Category label
    pub category: String,
    /// Σ available stock
    pub stock_sum: u64,
    /// Σ line value
    pub value_sum: f64,
    /// Rows in the category
    pub item_count: usize,
}

/// Category rollups ordered by `value_sum` descending, then name ascending
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategorySummary {
    rows: Vec<CategoryRollup>,
}

impl CategorySummary {
    /// Rollups in display order
    #[must_use]
    pub fn rows(&self) -> &[CategoryRollup] {
        &self.rows
    }

    /// Number of categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no categories (empty table)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rollup for one category
    #[must_use]
    pub fn get(&self, category: &str) -> Option<&CategoryRollup> {
        self.rows.iter().find(|r| r.category == category)
    }

    /// Σ `value_sum` across categories
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.rows.iter().map(|r| r.value_sum).sum()
    }

    /// Columnar view: `category`, `stock_sum`, `value_sum`, `item_count`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arrow`] if the batch cannot be assembled
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("category", DataType::Utf8, false),
            Field::new("stock_sum", DataType::UInt64, false),
            Field::new("value_sum", DataType::Float64, false),
            Field::new("item_count", DataType::UInt64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from_iter_values(
                    self.rows.iter().map(|r| r.category.as_str()),
                )),
                Arc::new(UInt64Array::from_iter_values(
                    self.rows.iter().map(|r| r.stock_sum),
                )),
                Arc::new(Float64Array::from_iter_values(
                    self.rows.iter().map(|r| r.value_sum),
                )),
                Arc::new(UInt64Array::from_iter_values(
                    self.rows.iter().map(|r| r.item_count as u64),
                )),
            ],
        )?;
        Ok(batch)
    }
}

/// Group the table by category
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] when the upload has no `Category`
/// column
pub fn aggregate(table: &InventoryTable) -> Result<CategorySummary> {
    if !table.has_category() {
        return Err(Error::MissingColumn {
            column: columns::CATEGORY.to_string(),
            feature: FEATURE_CATEGORY,
        });
    }

    let mut groups: FxHashMap<&str, CategoryRollup> = FxHashMap::default();
    for record in table.records() {
        let name = record.category.as_deref().unwrap_or(UNKNOWN_CATEGORY);
        let entry = groups.entry(name).or_insert_with(|| CategoryRollup {
            category: name.to_string(),
            stock_sum: 0,
            value_sum: 0.0,
            item_count: 0,
        });
        entry.stock_sum = entry.stock_sum.saturating_add(record.available_stock);
        entry.value_sum += record.total_value();
        entry.item_count += 1;
    }

    let mut rows: Vec<CategoryRollup> = groups.into_values().collect();
    rows.sort_by(|a, b| {
        b.value_sum
            .total_cmp(&a.value_sum)
            .then_with(|| a.category.cmp(&b.category))
    });

    tracing::debug!(table = %table.id(), categories = rows.len(), "aggregated categories");
    Ok(CategorySummary { rows })
}
