//! End-to-end tests: upload → validation → metrics → rollups → export

use chainsight::aggregate::{aggregate, UNKNOWN_CATEGORY};
use chainsight::config::{PipelineConfig, ReorderPolicy};
use chainsight::inventory::metrics::{delayed_suppliers, derive, low_stock_set, reorder_alerts, ThresholdSource};
use chainsight::storage::export::processed_csv_bytes;
use chainsight::storage::schema::columns;
use chainsight::topk::{SortOrder, TopKSelection};
use chainsight::{Error, InventoryTable, RawTable};

const WAREHOUSE: &str = "\
Product, Category ,Available Stock,Unit Cost,Reorder Level,Days Since Last Delivery,Supplier
Hammer,Tools,12,9.50,15,3,Acme
Nails,Fasteners,0,0.05,100,14,Bolt Co
Saw,Tools,4,22.00,,9,Acme
Screws,Fasteners,250,0.04,50,11,Bolt Co
Tape,,7,$3.25,5,,Stickit
Glue,Adhesives,-2,4.00,5,2,Stickit
Drill,Tools,3.5,89.00,2,1,Acme
";

fn load(csv: &str) -> InventoryTable {
    InventoryTable::from_csv_bytes(csv.as_bytes(), &PipelineConfig::default()).unwrap()
}

#[test]
fn test_warehouse_file_end_to_end() {
    let table = load(WAREHOUSE);

    // Glue (negative) and Drill (fractional) are excluded
    assert_eq!(table.len(), 5);
    let skipped: Vec<_> = table.skipped_rows().iter().map(|s| s.line).collect();
    assert_eq!(skipped, vec![7, 8]);

    let metrics = derive(&table);
    assert_eq!(metrics.total_skus, 5);
    assert_eq!(metrics.out_of_stock_count, 1);
    let expected = 12.0 * 9.5 + 0.0 + 4.0 * 22.0 + 250.0 * 0.04 + 7.0 * 3.25;
    assert!((metrics.total_value - expected).abs() < 1e-9);

    let low: Vec<_> = low_stock_set(&table, 10).iter().map(|r| r.product.as_str()).collect();
    assert_eq!(low, vec!["Nails", "Saw", "Tape"]);
}

#[test]
fn test_reorder_policy_precedence() {
    let table = load(WAREHOUSE);
    let policy = ReorderPolicy::for_table(&table, 10);
    assert_eq!(policy, ReorderPolicy::PerRow { fallback: 10 });

    let alerts = reorder_alerts(&table, &policy);
    let hits: Vec<_> = alerts
        .iter()
        .map(|a| (a.product.as_str(), a.threshold, a.source))
        .collect();
    assert_eq!(
        hits,
        vec![
            ("Hammer", 15, ThresholdSource::ReorderLevel),
            ("Nails", 100, ThresholdSource::ReorderLevel),
            ("Saw", 10, ThresholdSource::Fixed),
        ]
    );
}

#[test]
fn test_supplier_delays() {
    let table = load(WAREHOUSE);
    let delays = delayed_suppliers(&table, 10).unwrap();
    let products: Vec<_> = delays.iter().map(|d| d.product.as_str()).collect();
    assert_eq!(products, vec!["Nails", "Screws"]);
}

#[test]
fn test_category_rollup_with_unknown_bucket() {
    let table = load(WAREHOUSE);
    let summary = aggregate(&table).unwrap();

    let names: Vec<_> = summary.rows().iter().map(|r| r.category.as_str()).collect();
    assert_eq!(names, vec!["Tools", UNKNOWN_CATEGORY, "Fasteners"]);
    assert!((summary.total_value() - derive(&table).total_value).abs() < 1e-9);
}

#[test]
fn test_missing_category_keeps_kpis() {
    let table = load("Product,Available_Stock,Unit_Cost\nP1,10,2.0\nP2,0,5.0\n");
    let metrics = derive(&table);
    assert!((metrics.total_value - 20.0).abs() < f64::EPSILON);
    assert_eq!(metrics.out_of_stock_count, 1);

    let err = aggregate(&table).unwrap_err();
    assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == columns::CATEGORY));
}

#[test]
fn test_ragged_file_rejected() {
    let raw = RawTable::from_bytes(b"Product,Available_Stock,Unit_Cost\nP1,1,1\nP2,2\n");
    assert!(matches!(raw, Err(Error::Parse(_))));
}

#[test]
fn test_unterminated_quote_rejected() {
    // an unterminated quote swallows the rest of the file into one field
    let raw = RawTable::from_bytes(b"Product,Available_Stock,Unit_Cost\n\"P1,1,1\nP2,2,2\n");
    assert!(matches!(raw, Err(Error::Parse(_))));
}

#[test]
fn test_stray_quote_in_cost_fails_the_upload() {
    let err = InventoryTable::from_csv_bytes(
        b"Product,Available_Stock,Unit_Cost\nP1,10,\"2.0\nP2,0,5.0\nP3,1,1.0\n",
        &PipelineConfig::default(),
    )
    .unwrap_err();
    match err {
        Error::Parse(msg) => assert!(msg.contains("line 2: unterminated quote"), "{msg}"),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_export_reload_round_trip() {
    let table = load(WAREHOUSE);
    let bytes = processed_csv_bytes(&table).unwrap();
    let reloaded = RawTable::from_bytes(&bytes).unwrap();

    let mut expected_headers: Vec<String> = table.schema().headers().to_vec();
    expected_headers.push(columns::TOTAL_VALUE.to_string());
    assert_eq!(reloaded.schema().headers(), expected_headers.as_slice());
    assert_eq!(reloaded.num_rows(), table.len());

    let idx = reloaded.schema().position(columns::TOTAL_VALUE).unwrap();
    let supplier = reloaded.schema().position("Supplier").unwrap();
    for (record, row) in table.records().iter().zip(reloaded.rows()) {
        let value: f64 = row.get(idx).unwrap().parse().unwrap();
        assert_eq!(value.to_bits(), record.total_value().to_bits());
        assert!(!row.get(supplier).unwrap().is_empty());
    }

    // the processed file loads as an inventory table again
    let again = InventoryTable::from_raw(&reloaded, &PipelineConfig::default()).unwrap();
    assert_eq!(again.len(), table.len());
}

#[test]
fn test_top_items_by_value() {
    let table = load(WAREHOUSE);
    let batch = table.to_record_batch().unwrap();
    let top = batch.top_k_by_name("total_value", 2, SortOrder::Descending).unwrap();
    let products = top
        .column(1)
        .as_any()
        .downcast_ref::<arrow::array::StringArray>()
        .unwrap();
    assert_eq!(products.value(0), "Hammer");
    assert_eq!(products.value(1), "Saw");
}

#[test]
fn test_custom_alias_from_config() {
    let config = PipelineConfig::from_json_str(r#"{ "aliases": { "Available_Stock": ["On Hand"] } }"#).unwrap();
    let table = InventoryTable::from_csv_bytes(b"Product,On Hand,Unit_Cost\nP1,3,2\n", &config).unwrap();
    assert_eq!(table.records()[0].available_stock, 3);

    let err = InventoryTable::from_csv_bytes(b"Product,On Hand,Unit_Cost\nP1,3,2\n", &PipelineConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::MissingColumn { .. }));
}
