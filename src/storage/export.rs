//! Processed exports and columnar views
//!
//! - Processed inventory CSV: the uploaded header row plus `Total_Value`,
//!   one line per accepted row, unknown columns carried through verbatim
//! - Forecast CSV: `timestamp` plus three value columns named by
//!   [`ForecastColumns`]
//! - Arrow `RecordBatch` views of both for the rendering layer

use crate::forecast::ForecastResult;
use crate::inventory::InventoryTable;
use crate::storage::schema::columns;
use crate::Result;
use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Header names for a forecast export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastColumns {
    /// Period column
    pub timestamp: String,
    /// Point forecast column
    pub forecast: String,
    /// Lower bound column
    pub lower: String,
    /// Upper bound column
    pub upper: String,
}

impl Default for ForecastColumns {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            forecast: "Forecast".to_string(),
            lower: "lower_bound".to_string(),
            upper: "upper_bound".to_string(),
        }
    }
}

impl ForecastColumns {
    /// Field-derived names: `{field}_forecast`, `{field}_lower`, `{field}_upper`
    #[must_use]
    pub fn for_field(field: &str) -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            forecast: format!("{field}_forecast"),
            lower: format!("{field}_lower"),
            upper: format!("{field}_upper"),
        }
    }
}

/// Write the processed inventory CSV
///
/// An existing `Total_Value` column is overwritten in place rather than
/// duplicated.
///
/// # Errors
///
/// Returns [`Error::Csv`](crate::Error::Csv) if writing fails
pub fn write_processed_csv<W: Write>(table: &InventoryTable, writer: W) -> Result<()> {
    let headers = table.schema().headers();
    let existing = table.schema().position(columns::TOTAL_VALUE);

    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
    if existing.is_none() {
        header_row.push(columns::TOTAL_VALUE);
    }
    csv_writer.write_record(&header_row)?;

    for (record, raw) in table.records().iter().zip(table.raw_rows()) {
        let total = record.total_value().to_string();
        let mut row: Vec<&str> = raw.cells.iter().map(String::as_str).collect();
        match existing {
            Some(index) => row[index] = &total,
            None => row.push(&total),
        }
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Processed inventory CSV as bytes
///
/// # Errors
///
/// See [`write_processed_csv`]
pub fn processed_csv_bytes(table: &InventoryTable) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_processed_csv(table, &mut out)?;
    Ok(out)
}

/// Write a forecast CSV
///
/// # Errors
///
/// Returns [`Error::Csv`](crate::Error::Csv) if writing fails
pub fn write_forecast_csv<W: Write>(
    result: &ForecastResult,
    names: &ForecastColumns,
    writer: W,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([&names.timestamp, &names.forecast, &names.lower, &names.upper])?;
    for p in &result.points {
        csv_writer.write_record([
            p.timestamp.format("%Y-%m-%d").to_string(),
            p.forecast.to_string(),
            p.lower_bound.to_string(),
            p.upper_bound.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Forecast CSV as bytes
///
/// # Errors
///
/// See [`write_forecast_csv`]
pub fn forecast_csv_bytes(result: &ForecastResult, names: &ForecastColumns) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_forecast_csv(result, names, &mut out)?;
    Ok(out)
}

/// Arrow Date32 value for a calendar date
#[must_use]
pub fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Columnar view of an inventory table
///
/// # Errors
///
/// Returns [`Error::Arrow`](crate::Error::Arrow) if the batch cannot be
/// assembled
pub fn inventory_record_batch(table: &InventoryTable) -> Result<RecordBatch> {
    let records = table.records();
    let schema = Arc::new(Schema::new(vec![
        Field::new("line", DataType::UInt64, false),
        Field::new("product", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, true),
        Field::new("available_stock", DataType::UInt64, false),
        Field::new("unit_cost", DataType::Float64, false),
        Field::new("total_value", DataType::Float64, false),
        Field::new("reorder_level", DataType::UInt64, true),
        Field::new("days_since_last_delivery", DataType::UInt64, true),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.line as u64),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.product.as_str()),
        )),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.category.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.available_stock),
        )),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.unit_cost),
        )),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(crate::inventory::InventoryRecord::total_value),
        )),
        Arc::new(UInt64Array::from(
            records.iter().map(|r| r.reorder_level).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            records
                .iter()
                .map(|r| r.days_since_last_delivery)
                .collect::<Vec<_>>(),
        )),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Columnar view of a forecast
///
/// # Errors
///
/// Returns [`Error::Arrow`](crate::Error::Arrow) if the batch cannot be
/// assembled
pub fn forecast_record_batch(result: &ForecastResult, names: &ForecastColumns) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(names.timestamp.as_str(), DataType::Date32, false),
        Field::new(names.forecast.as_str(), DataType::Float64, false),
        Field::new(names.lower.as_str(), DataType::Float64, false),
        Field::new(names.upper.as_str(), DataType::Float64, false),
    ]));
    let points = &result.points;
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from_iter_values(points.iter().map(|p| date32(p.timestamp)))),
        Arc::new(Float64Array::from_iter_values(points.iter().map(|p| p.forecast))),
        Arc::new(Float64Array::from_iter_values(points.iter().map(|p| p.lower_bound))),
        Arc::new(Float64Array::from_iter_values(points.iter().map(|p| p.upper_bound))),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

impl InventoryTable {
    /// Columnar view (see [`inventory_record_batch`])
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arrow`](crate::Error::Arrow) if the batch cannot be
    /// assembled
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        inventory_record_batch(self)
    }
}

impl ForecastResult {
    /// Columnar view with the default column names
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arrow`](crate::Error::Arrow) if the batch cannot be
    /// assembled
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        forecast_record_batch(self, &ForecastColumns::default())
    }
}
