//! Session tests: one user flow per test, the way the dashboard drives it

use chainsight::config::{PipelineConfig, ReorderPolicy};
use chainsight::inventory::metrics::ThresholdSource;
use chainsight::timeseries::Interval;
use chainsight::{Error, RawTable, Session};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::sync::Arc;

/// Inventory snapshot rows that double as stock history
fn combined_upload() -> Vec<u8> {
    let mut csv = String::from("Date,Product,Category,Available_Stock,Unit_Cost\n");
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    for i in 0..15u32 {
        let month = Interval::Monthly.advance(start, i).unwrap();
        let stock = 100 + 5 * i + 3 * i * i;
        writeln!(csv, "{month},Widget,Parts,{stock},1.50").unwrap();
    }
    csv.into_bytes()
}

#[test]
fn test_first_upload_flow() {
    let mut session = Session::new(PipelineConfig::default());
    let id = session
        .upload_inventory(b"Product,Category,Available_Stock,Unit_Cost\nP1,A,10,2.0\nP2,B,0,5.0\n")
        .unwrap();

    let dashboard = session.dashboard().unwrap();
    assert_eq!(dashboard.table_id, id);
    assert!((dashboard.metrics.total_value - 20.0).abs() < f64::EPSILON);
    assert_eq!(dashboard.metrics.out_of_stock_count, 1);
    assert_eq!(dashboard.metrics.total_skus, 2);

    // no Reorder_Level column: the fixed fallback applies
    assert_eq!(dashboard.reorder_alerts.len(), 1);
    assert_eq!(dashboard.reorder_alerts[0].source, ThresholdSource::Fixed);

    let categories = dashboard.categories.as_ref().unwrap();
    assert_eq!(categories.rows()[0].category, "A");

    // delivery column absent: only that card is blank
    let failures = dashboard.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "supplier_delays");
    assert!(matches!(failures[0].1, Error::MissingColumn { .. }));

    let top = dashboard.top_items.as_ref().unwrap();
    assert_eq!(top.num_rows(), 2);
}

#[test]
fn test_reupload_replaces_table_and_export() {
    let mut session = Session::new(PipelineConfig::default());
    let first = session
        .upload_inventory(b"Product,Available_Stock,Unit_Cost\nP1,1,1.0\n")
        .unwrap();
    let export_a = session.processed_export().unwrap();

    let second = session
        .upload_inventory(b"Product,Available_Stock,Unit_Cost\nP9,3,2.5\n")
        .unwrap();
    assert_ne!(first, second);

    let export_b = session.processed_export().unwrap();
    assert!(!Arc::ptr_eq(&export_a, &export_b));

    let reloaded = RawTable::from_bytes(&export_b).unwrap();
    assert_eq!(reloaded.rows()[0].get(0), Some("P9"));
    assert_eq!(reloaded.rows()[0].get(3), Some("7.5"));
}

#[test]
fn test_forecast_from_inventory_upload() {
    let mut session = Session::new(PipelineConfig::default());
    session.upload_inventory(&combined_upload()).unwrap();

    assert_eq!(session.forecast_products().unwrap(), vec!["Widget".to_string()]);

    let result = session.forecast("Widget").unwrap();
    assert_eq!(result.product, "Widget");
    assert_eq!(result.points.len(), 6);
    assert_eq!(
        result.points[0].timestamp,
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    );
    let dashboard = session.dashboard().unwrap();
    assert_eq!(dashboard.metrics.row_count, 15);
}

#[test]
fn test_history_upload_takes_precedence() {
    let mut session = Session::new(PipelineConfig::default());
    session.upload_inventory(&combined_upload()).unwrap();
    session
        .upload_history(b"Date,Product,Available_Stock\n2024-01-01,Other,1\n")
        .unwrap();

    assert_eq!(session.forecast_products().unwrap(), vec!["Other".to_string()]);
    let err = session.forecast("Widget").unwrap_err();
    assert!(matches!(err, Error::InsufficientData { required: 12, got: 0 }));

    // the dashboard is still computed from the inventory upload
    assert_eq!(session.dashboard().unwrap().metrics.total_skus, 1);
}

#[test]
fn test_forecast_failure_leaves_session_usable() {
    let mut session = Session::new(PipelineConfig::default());
    session
        .upload_inventory(b"Product,Available_Stock,Unit_Cost\nP1,4,1.0\n")
        .unwrap();

    let err = session.forecast("P1").unwrap_err();
    assert!(matches!(err, Error::MissingColumn { .. }));
    assert!(session.dashboard().is_ok());
    assert!(session.processed_export().is_ok());
}

#[test]
fn test_fixed_policy_from_config() {
    let config = PipelineConfig::builder()
        .reorder_policy(ReorderPolicy::Fixed { threshold: 50 })
        .build()
        .unwrap();
    let mut session = Session::new(config);
    session
        .upload_inventory(b"Product,Available_Stock,Unit_Cost,Reorder_Level\nP1,20,1.0,5\nP2,80,1.0,100\n")
        .unwrap();

    let dashboard = session.dashboard().unwrap();
    let alerted: Vec<_> = dashboard
        .reorder_alerts
        .iter()
        .map(|a| a.product.as_str())
        .collect();
    assert_eq!(alerted, vec!["P1"]);
}

#[test]
fn test_parse_failure_reports_line() {
    let mut session = Session::new(PipelineConfig::default());
    let err = session
        .upload_inventory(b"Product,Available_Stock,Unit_Cost\nP1,1,1.0\nP2,2\n")
        .unwrap_err();
    match err {
        Error::Parse(msg) => assert!(msg.contains("line 3"), "{msg}"),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(session.current_table().is_none());
}
