//! Forecast path tests: history CSV → prepared series → SARIMA → export

use chainsight::config::{ForecastConfig, SeriesConfig};
use chainsight::forecast::{forecast, ArimaOrder, SeasonalOrder};
use chainsight::storage::export::{forecast_csv_bytes, ForecastColumns};
use chainsight::timeseries::{prepare, BucketAggregation, Interval};
use chainsight::{Error, ModelFitError, RawTable};
use chrono::NaiveDate;
use std::fmt::Write as _;

/// Fifteen months of stock for "Widget", two readings per month (the
/// mid-month reading is superseded by the month-end one), plus a flat
/// "Bolt" series and a short "Gasket" series.
fn history_csv() -> String {
    let mut csv = String::from("Date,Product,Available_Stock,Units_Sold\n");
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    for i in 0..15u32 {
        let month = Interval::Monthly.advance(start, i).unwrap();
        let value = 100.0 + 5.0 * f64::from(i) + 0.3 * f64::from(i * i);
        let mid = month + chrono::Days::new(14);
        let end = month + chrono::Days::new(27);
        writeln!(csv, "{mid},Widget,{},{}", value - 40.0, i + 1).unwrap();
        writeln!(csv, "{end},Widget,{value},{}", 2 * i + 3).unwrap();
        writeln!(csv, "{end},Bolt,500,7").unwrap();
        if i < 5 {
            writeln!(csv, "{end},Gasket,{value},1").unwrap();
        }
    }
    csv
}

fn history() -> RawTable {
    RawTable::from_bytes(history_csv().as_bytes()).unwrap()
}

#[test]
fn test_monthly_stock_forecast() {
    let series = prepare(&history(), "Widget", &SeriesConfig::default()).unwrap();
    assert_eq!(series.len(), 15);
    assert_eq!(series.report().matched_rows, 30);
    assert!((series.values()[0] - 100.0).abs() < 1e-12);

    let result = forecast(&series, &ForecastConfig::default()).unwrap();
    assert_eq!(result.product, "Widget");
    assert_eq!(result.value_field, "Available_Stock");
    assert_eq!(result.points.len(), 6);
    assert!(result.model.seasonal_applied);
    assert_eq!(result.model.seasonal_period, 12);

    let mut expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    for p in &result.points {
        expected = Interval::Monthly.advance(expected, 1).unwrap();
        assert_eq!(p.timestamp, expected);
        assert!(p.lower_bound <= p.forecast && p.forecast <= p.upper_bound);
    }
}

#[test]
fn test_units_sold_summed_per_month() {
    let config = SeriesConfig {
        value_column: "Units_Sold".to_string(),
        aggregation: BucketAggregation::Sum,
        ..SeriesConfig::default()
    };
    let series = prepare(&history(), "Widget", &config).unwrap();
    let values = series.values();
    // (i + 1) + (2i + 3)
    assert!((values[0] - 4.0).abs() < 1e-12);
    assert!((values[14] - 46.0).abs() < 1e-12);
}

#[test]
fn test_flat_series_is_degenerate() {
    let series = prepare(&history(), "Bolt", &SeriesConfig::default()).unwrap();
    let err = forecast(&series, &ForecastConfig::default()).unwrap_err();
    assert!(matches!(err, Error::ModelFit(ModelFitError::Degenerate { len: 15 })));
}

#[test]
fn test_short_history() {
    let err = prepare(&history(), "Gasket", &SeriesConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { required: 12, got: 5 }));

    let err = prepare(&history(), "Sprocket", &SeriesConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { required: 12, got: 0 }));
}

#[test]
fn test_daily_series_defaults() {
    let mut csv = String::from("Date,Product,Units_Sold\n");
    let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    for i in 0..40u32 {
        let day = Interval::Daily.advance(start, i).unwrap();
        // skip a weekend-ish gap to exercise forward fill
        if i == 20 || i == 21 {
            continue;
        }
        let value = 20 + (i % 7) * 3 + i / 4;
        writeln!(csv, "{day}T09:30:00,Gear,{value}").unwrap();
    }
    let raw = RawTable::from_bytes(csv.as_bytes()).unwrap();
    let config = SeriesConfig {
        interval: Interval::Daily,
        value_column: "Units_Sold".to_string(),
        ..SeriesConfig::default()
    };
    let series = prepare(&raw, "Gear", &config).unwrap();
    assert_eq!(series.len(), 40);
    assert_eq!(series.report().filled_periods, 2);
    assert!((series.values()[20] - series.values()[19]).abs() < f64::EPSILON);

    let forecast_config = ForecastConfig {
        order: ArimaOrder { p: 1, d: 1, q: 0 },
        seasonal: SeasonalOrder::NONE,
        ..ForecastConfig::default()
    };
    let result = forecast(&series, &forecast_config).unwrap();
    assert_eq!(result.horizon, 15);
    assert_eq!(
        result.points[0].timestamp,
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
    );
    assert_eq!(
        result.points[14].timestamp,
        NaiveDate::from_ymd_opt(2024, 3, 26).unwrap()
    );
    for p in &result.points {
        assert!(p.lower_bound <= p.forecast && p.forecast <= p.upper_bound);
    }
    // uncertainty never shrinks with the horizon
    let widths: Vec<f64> = result
        .points
        .iter()
        .map(|p| p.upper_bound - p.lower_bound)
        .collect();
    assert!(widths.windows(2).all(|w| w[1] >= w[0] - 1e-9));
}

#[test]
fn test_wider_confidence_gives_wider_interval() {
    let series = prepare(&history(), "Widget", &SeriesConfig::default()).unwrap();
    let config = |confidence| ForecastConfig {
        order: ArimaOrder { p: 1, d: 1, q: 0 },
        seasonal: SeasonalOrder::NONE,
        confidence,
        ..ForecastConfig::default()
    };
    let narrow = forecast(&series, &config(0.8)).unwrap();
    let wide = forecast(&series, &config(0.99)).unwrap();
    for (n, w) in narrow.points.iter().zip(&wide.points) {
        assert!((n.forecast - w.forecast).abs() < 1e-9);
        assert!(w.upper_bound - w.lower_bound >= n.upper_bound - n.lower_bound);
    }
}

#[test]
fn test_forecast_export() {
    let series = prepare(&history(), "Widget", &SeriesConfig::default()).unwrap();
    let result = forecast(&series, &ForecastConfig::default()).unwrap();

    let bytes = forecast_csv_bytes(&result, &ForecastColumns::default()).unwrap();
    let table = RawTable::from_bytes(&bytes).unwrap();
    assert_eq!(
        table.schema().headers(),
        ["timestamp", "Forecast", "lower_bound", "upper_bound"]
    );
    assert_eq!(table.num_rows(), 6);
    assert_eq!(table.rows()[0].get(0), Some("2024-04-01"));

    let names = ForecastColumns::for_field(&result.value_field);
    let bytes = forecast_csv_bytes(&result, &names).unwrap();
    let table = RawTable::from_bytes(&bytes).unwrap();
    assert_eq!(table.schema().headers()[1], "Available_Stock_forecast");

    let batch = result.to_record_batch().unwrap();
    assert_eq!(batch.num_rows(), 6);
    assert_eq!(batch.num_columns(), 4);
}

#[test]
fn test_forecast_is_deterministic() {
    let series = prepare(&history(), "Widget", &SeriesConfig::default()).unwrap();
    let a = forecast(&series, &ForecastConfig::default()).unwrap();
    let b = forecast(&series, &ForecastConfig::default()).unwrap();
    assert_eq!(a, b);
}
