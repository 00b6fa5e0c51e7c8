//! Validated inventory table
//!
//! An [`InventoryTable`] is the typed view of one upload: every accepted row
//! as an [`InventoryRecord`], plus the raw cells of those rows so the
//! processed export can carry through columns the pipeline does not know.
//!
//! Rows are never silently coerced. A bad `Available_Stock` or `Unit_Cost`
//! cell excludes the row and records a [`SkippedRow`]; a bad optional cell
//! (`Reorder_Level`, `Days_Since_Last_Delivery`) only blanks that field.

pub mod metrics;

use crate::config::PipelineConfig;
use crate::storage::schema::{columns, Schema};
use crate::storage::{RawRow, RawTable};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Feature label used when the KPI columns are missing
pub const FEATURE_KPIS: &str = "inventory metrics";

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one upload; a new upload always gets a new id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(u64);

impl TableId {
    fn next() -> Self {
        Self(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table-{}", self.0)
    }
}

/// One validated inventory row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// 1-based source line
    pub line: usize,
    /// Product identifier (empty when the file has no product column)
    pub product: String,
    /// Category label, `None` when absent or empty
    pub category: Option<String>,
    /// Units on hand
    pub available_stock: u64,
    /// Cost per unit
    pub unit_cost: f64,
    /// Per-row reorder threshold
    pub reorder_level: Option<u64>,
    /// Days since the supplier last delivered
    pub days_since_last_delivery: Option<u64>,
}

impl InventoryRecord {
    /// Line value: `available_stock * unit_cost`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_value(&self) -> f64 {
        self.available_stock as f64 * self.unit_cost
    }
}

/// Why a row was left out of the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based source line
    pub line: usize,
    /// Canonical column that failed
    pub column: String,
    /// Offending raw cell
    pub value: String,
    /// Human-readable reason
    pub reason: String,
}

impl From<SkippedRow> for Error {
    fn from(row: SkippedRow) -> Self {
        Self::Coercion {
            line: row.line,
            column: row.column,
            value: row.value,
            reason: row.reason,
        }
    }
}

/// Header positions of the columns the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumns {
    /// `Product`
    pub product: Option<usize>,
    /// `Category`
    pub category: Option<usize>,
    /// `Available_Stock`
    pub available_stock: usize,
    /// `Unit_Cost`
    pub unit_cost: usize,
    /// `Reorder_Level`
    pub reorder_level: Option<usize>,
    /// `Days_Since_Last_Delivery`
    pub days_since_last_delivery: Option<usize>,
}

/// Immutable, validated inventory table
#[derive(Debug, Clone)]
pub struct InventoryTable {
    id: TableId,
    schema: Schema,
    columns: ResolvedColumns,
    records: Vec<InventoryRecord>,
    raw_rows: Vec<RawRow>,
    skipped: Vec<SkippedRow>,
    skipped_optional: Vec<SkippedRow>,
}

impl InventoryTable {
    /// Validate a parsed upload
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if `Available_Stock` or `Unit_Cost`
    /// cannot be resolved. Row-level problems never fail the call.
    pub fn from_raw(raw: &RawTable, config: &PipelineConfig) -> Result<Self> {
        let schema = raw.schema();
        let aliases = &config.aliases;
        let columns = ResolvedColumns {
            product: schema.resolve(columns::PRODUCT, aliases),
            category: schema.resolve(columns::CATEGORY, aliases),
            available_stock: schema.require(columns::AVAILABLE_STOCK, FEATURE_KPIS, aliases)?,
            unit_cost: schema.require(columns::UNIT_COST, FEATURE_KPIS, aliases)?,
            reorder_level: schema.resolve(columns::REORDER_LEVEL, aliases),
            days_since_last_delivery: schema.resolve(columns::DAYS_SINCE_LAST_DELIVERY, aliases),
        };

        let mut records = Vec::with_capacity(raw.num_rows());
        let mut raw_rows = Vec::with_capacity(raw.num_rows());
        let mut skipped = Vec::new();
        let mut skipped_optional = Vec::new();

        for row in raw.rows() {
            match Self::read_row(row, &columns, &mut skipped_optional) {
                Ok(record) => {
                    records.push(record);
                    raw_rows.push(row.clone());
                }
                Err(skip) => {
                    tracing::warn!(
                        line = skip.line,
                        column = %skip.column,
                        value = %skip.value,
                        reason = %skip.reason,
                        "skipping inventory row"
                    );
                    skipped.push(skip);
                }
            }
        }

        let table = Self {
            id: TableId::next(),
            schema: schema.clone(),
            columns,
            records,
            raw_rows,
            skipped,
            skipped_optional,
        };
        tracing::debug!(
            table = %table.id,
            accepted = table.records.len(),
            skipped = table.skipped.len(),
            skipped_optional = table.skipped_optional.len(),
            "validated inventory table"
        );
        Ok(table)
    }

    /// Parse CSV bytes and validate in one step
    ///
    /// # Errors
    ///
    /// See [`RawTable::from_bytes`] and [`from_raw`](Self::from_raw)
    pub fn from_csv_bytes(bytes: &[u8], config: &PipelineConfig) -> Result<Self> {
        Self::from_raw(&RawTable::from_bytes(bytes)?, config)
    }

    fn read_row(
        row: &RawRow,
        columns: &ResolvedColumns,
        skipped_optional: &mut Vec<SkippedRow>,
    ) -> std::result::Result<InventoryRecord, SkippedRow> {
        let cell = |index: usize| row.get(index).unwrap_or_default();
        let skip = |column: &str, index: usize, reason: String| SkippedRow {
            line: row.line,
            column: column.to_string(),
            value: cell(index).to_string(),
            reason,
        };

        let available_stock = parse_quantity(cell(columns.available_stock))
            .map_err(|reason| skip(columns::AVAILABLE_STOCK, columns.available_stock, reason))?;
        let unit_cost = parse_cost(cell(columns.unit_cost))
            .map_err(|reason| skip(columns::UNIT_COST, columns.unit_cost, reason))?;

        let mut optional = |canonical: &str, index: Option<usize>| -> Option<u64> {
            let index = index?;
            let value = cell(index);
            if value.is_empty() {
                return None;
            }
            match parse_quantity(value) {
                Ok(v) => Some(v),
                Err(reason) => {
                    tracing::warn!(line = row.line, column = canonical, value, %reason, "ignoring optional value");
                    skipped_optional.push(skip(canonical, index, reason));
                    None
                }
            }
        };
        let reorder_level = optional(columns::REORDER_LEVEL, columns.reorder_level);
        let days_since_last_delivery =
            optional(columns::DAYS_SINCE_LAST_DELIVERY, columns.days_since_last_delivery);

        let product = columns.product.map(cell).unwrap_or_default().to_string();
        let category = columns
            .category
            .map(cell)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(InventoryRecord {
            line: row.line,
            product,
            category,
            available_stock,
            unit_cost,
            reorder_level,
            days_since_last_delivery,
        })
    }

    /// Identity of this upload
    #[must_use]
    pub const fn id(&self) -> TableId {
        self.id
    }

    /// Trimmed source headers
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Resolved header positions
    #[must_use]
    pub const fn columns(&self) -> &ResolvedColumns {
        &self.columns
    }

    /// Accepted rows in file order
    #[must_use]
    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    /// Raw cells of accepted rows, parallel to [`records`](Self::records)
    #[must_use]
    pub fn raw_rows(&self) -> &[RawRow] {
        &self.raw_rows
    }

    /// Rows excluded during validation
    #[must_use]
    pub fn skipped_rows(&self) -> &[SkippedRow] {
        &self.skipped
    }

    /// Optional cells that could not be read (their rows were kept)
    #[must_use]
    pub fn skipped_optional_values(&self) -> &[SkippedRow] {
        &self.skipped_optional
    }

    /// Number of accepted rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no row was accepted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the upload has a category column
    #[must_use]
    pub const fn has_category(&self) -> bool {
        self.columns.category.is_some()
    }

    /// Whether the upload has a reorder level column
    #[must_use]
    pub const fn has_reorder_level(&self) -> bool {
        self.columns.reorder_level.is_some()
    }

    /// Whether the upload has a days-since-delivery column
    #[must_use]
    pub const fn has_delivery_days(&self) -> bool {
        self.columns.days_since_last_delivery.is_some()
    }
}

/// Read a non-negative whole quantity; integral decimals (`10.0`) are accepted
///
/// # Errors
///
/// Returns the reason as a string
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn parse_quantity(raw: &str) -> std::result::Result<u64, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("empty value".to_string());
    }
    if let Ok(v) = value.parse::<u64>() {
        return Ok(v);
    }
    let parsed: f64 = value
        .parse()
        .map_err(|_| "not a number".to_string())?;
    if !parsed.is_finite() {
        return Err("not a finite number".to_string());
    }
    if parsed < 0.0 {
        return Err("negative quantity".to_string());
    }
    if parsed.fract() != 0.0 {
        return Err("not a whole number".to_string());
    }
    if parsed >= u64::MAX as f64 {
        return Err("quantity out of range".to_string());
    }
    Ok(parsed as u64)
}

/// Read a non-negative finite cost; a leading `$` and `,` separators are
/// tolerated
///
/// # Errors
///
/// Returns the reason as a string
pub fn parse_cost(raw: &str) -> std::result::Result<f64, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("empty value".to_string());
    }
    let value = value.strip_prefix('$').unwrap_or(value).trim_start();
    let cleaned: String = value.chars().filter(|&c| c != ',').collect();
    let parsed: f64 = cleaned
        .parse()
        .map_err(|_| "not a number".to_string())?;
    if !parsed.is_finite() {
        return Err("not a finite number".to_string());
    }
    if parsed < 0.0 {
        return Err("negative cost".to_string());
    }
    // normalizes -0.0
    Ok(parsed + 0.0)
}

/// Single-cell coercion of a stock quantity
///
/// # Errors
///
/// Returns [`Error::Coercion`] carrying the line and raw value
pub fn coerce_stock(line: usize, raw: &str) -> Result<u64> {
    parse_quantity(raw).map_err(|reason| Error::Coercion {
        line,
        column: columns::AVAILABLE_STOCK.to_string(),
        value: raw.to_string(),
        reason,
    })
}

/// Single-cell coercion of a unit cost
///
/// # Errors
///
/// Returns [`Error::Coercion`] carrying the line and raw value
pub fn coerce_cost(line: usize, raw: &str) -> Result<f64> {
    parse_cost(raw).map_err(|reason| Error::Coercion {
        line,
        column: columns::UNIT_COST.to_string(),
        value: raw.to_string(),
        reason,
    })
}
