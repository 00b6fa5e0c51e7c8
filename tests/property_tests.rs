//! Property-based tests for chainsight
//!
//! - Test accounting invariants (value conservation, row accounting)
//! - Test export integrity (reload preserves every derived value)
//! - Test forecast interval ordering on arbitrary series
//! - Run with ProptestConfig::with_cases(100)

use arrow::array::Float64Array;
use chainsight::aggregate::aggregate;
use chainsight::config::ForecastConfig;
use chainsight::forecast::{forecast_points, ArimaOrder, SeasonalOrder};
use chainsight::inventory::metrics::{derive, low_stock_set};
use chainsight::inventory::{parse_cost, parse_quantity};
use chainsight::storage::export::processed_csv_bytes;
use chainsight::storage::schema::columns;
use chainsight::timeseries::{Interval, TimeSeriesPoint};
use chainsight::topk::{SortOrder, TopKSelection};
use chainsight::{InventoryTable, PipelineConfig, RawTable};
use chrono::NaiveDate;
use proptest::prelude::*;
use std::fmt::Write as _;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

#[derive(Debug, Clone)]
struct Row {
    product: String,
    category: Option<&'static str>,
    stock: String,
    cost_cents: u32,
}

fn arb_category() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("Tools")),
        Just(Some("Fasteners")),
        Just(Some("Adhesives")),
    ]
}

fn arb_valid_row() -> impl Strategy<Value = Row> {
    ("[A-Z][a-z]{0,5}", arb_category(), 0u64..1000, 0u32..100_000).prop_map(
        |(product, category, stock, cost_cents)| Row {
            product,
            category,
            stock: stock.to_string(),
            cost_cents,
        },
    )
}

/// Valid rows mixed with rows whose stock cell cannot be coerced
fn arb_mixed_row() -> impl Strategy<Value = (Row, bool)> {
    prop_oneof![
        4 => arb_valid_row().prop_map(|r| (r, true)),
        1 => (arb_valid_row(), prop_oneof![Just("-3"), Just("2.5"), Just("n/a"), Just("")])
            .prop_map(|(mut r, bad)| {
                r.stock = bad.to_string();
                (r, false)
            }),
    ]
}

fn to_csv(rows: &[Row]) -> String {
    let mut csv = String::from("Product,Category,Available_Stock,Unit_Cost\n");
    for r in rows {
        writeln!(
            csv,
            "{},{},{},{}.{:02}",
            r.product,
            r.category.unwrap_or(""),
            r.stock,
            r.cost_cents / 100,
            r.cost_cents % 100
        )
        .unwrap();
    }
    csv
}

fn load(rows: &[Row]) -> InventoryTable {
    InventoryTable::from_csv_bytes(to_csv(rows).as_bytes(), &PipelineConfig::default()).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

/// Series on `interval`: level, trend, a seasonal swing of `period` and
/// bounded noise
fn arb_series(
    interval: Interval,
    period: usize,
    lengths: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<TimeSeriesPoint>> {
    let max_len = lengths.end;
    (
        lengths,
        0.0f64..10.0,
        0.0f64..40.0,
        proptest::collection::vec(-5.0f64..5.0, max_len),
    )
        .prop_map(move |(len, slope, swing, noise)| {
            let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
            (0..len)
                .map(|i| {
                    let phase = 2.0 * std::f64::consts::PI * (i % period) as f64 / period as f64;
                    TimeSeriesPoint {
                        timestamp: interval.advance(start, u32::try_from(i).unwrap()).unwrap(),
                        value: 200.0 + slope * i as f64 + swing * phase.sin() + noise[i],
                    }
                })
                .collect()
        })
}

fn assert_bounds_ordered(
    points: &[TimeSeriesPoint],
    interval: Interval,
    config: &ForecastConfig,
    horizon: usize,
) -> Result<(), TestCaseError> {
    let result = forecast_points(points, interval, "v", config);
    prop_assert!(result.is_ok(), "fit failed: {:?}", result.err());
    let result = result.unwrap();

    prop_assert_eq!(result.points.len(), horizon);
    for p in &result.points {
        prop_assert!(p.lower_bound <= p.forecast && p.forecast <= p.upper_bound, "{:?}", p);
    }
    let clipped = result.clipped_non_negative();
    prop_assert!(clipped.points.iter().all(|p| p.lower_bound >= 0.0));
    Ok(())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Loader Properties
    // ========================================================================

    /// Property: every data row is either accepted or reported as skipped
    #[test]
    fn prop_rows_accepted_or_skipped(rows in proptest::collection::vec(arb_mixed_row(), 0..40)) {
        let plain: Vec<Row> = rows.iter().map(|(r, _)| r.clone()).collect();
        let table = load(&plain);
        let valid = rows.iter().filter(|(_, ok)| *ok).count();

        prop_assert_eq!(table.len(), valid);
        prop_assert_eq!(table.len() + table.skipped_rows().len(), rows.len());
    }

    /// Property: whole-number quantities always parse
    #[test]
    fn prop_parse_quantity_accepts_integers(n in any::<u64>()) {
        prop_assert_eq!(parse_quantity(&n.to_string()), Ok(n));
    }

    /// Property: dollar-formatted costs parse to the same value
    #[test]
    fn prop_parse_cost_currency_format(dollars in 0u32..10_000_000, cents in 0u32..100) {
        let plain = format!("{dollars}.{cents:02}");
        let grouped = {
            let digits = dollars.to_string();
            let mut out = String::new();
            for (i, c) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    out.push(',');
                }
                out.push(c);
            }
            format!("${out}.{cents:02}")
        };
        prop_assert_eq!(parse_cost(&plain), parse_cost(&grouped));
    }

    // ========================================================================
    // Metrics and Aggregation Properties
    // ========================================================================

    /// Property: total value is conserved by the category rollup
    #[test]
    fn prop_category_rollup_conserves_value(rows in proptest::collection::vec(arb_valid_row(), 0..50)) {
        let table = load(&rows);
        let metrics = derive(&table);
        let summary = aggregate(&table).unwrap();

        prop_assert!(close(metrics.total_value, summary.total_value()));
        let items: usize = summary.rows().iter().map(|r| r.item_count).sum();
        prop_assert_eq!(items, table.len());
        let stock: u64 = summary.rows().iter().map(|r| r.stock_sum).sum();
        prop_assert_eq!(stock, table.records().iter().map(|r| r.available_stock).sum::<u64>());
    }

    /// Property: rollup rows are ordered by value descending, then name
    #[test]
    fn prop_category_rollup_ordering(rows in proptest::collection::vec(arb_valid_row(), 0..50)) {
        let summary = aggregate(&load(&rows)).unwrap();
        for pair in summary.rows().windows(2) {
            let ordered = pair[0].value_sum > pair[1].value_sum
                || (pair[0].value_sum == pair[1].value_sum && pair[0].category < pair[1].category);
            prop_assert!(ordered, "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    /// Property: low-stock membership is exactly `stock < threshold`
    #[test]
    fn prop_low_stock_is_strict(
        rows in proptest::collection::vec(arb_valid_row(), 0..50),
        threshold in 0u64..1200
    ) {
        let table = load(&rows);
        let low = low_stock_set(&table, threshold);
        let expected = table.records().iter().filter(|r| r.available_stock < threshold).count();

        prop_assert_eq!(low.len(), expected);
        prop_assert!(low.iter().all(|r| r.available_stock < threshold));
        prop_assert!(derive(&table).out_of_stock_count <= table.len());
    }

    // ========================================================================
    // Export Properties
    // ========================================================================

    /// Property: reloading the processed export yields identical line values
    #[test]
    fn prop_export_reload_preserves_total_value(rows in proptest::collection::vec(arb_valid_row(), 0..40)) {
        let table = load(&rows);
        let reloaded = RawTable::from_bytes(&processed_csv_bytes(&table).unwrap()).unwrap();
        prop_assert_eq!(reloaded.num_rows(), table.len());

        let idx = reloaded.schema().position(columns::TOTAL_VALUE).unwrap();
        for (record, row) in table.records().iter().zip(reloaded.rows()) {
            let value: f64 = row.get(idx).unwrap().parse().unwrap();
            prop_assert_eq!(value.to_bits(), record.total_value().to_bits());
        }
    }

    // ========================================================================
    // Top-K Properties
    // ========================================================================

    /// Property: top items are the k largest line values, descending
    #[test]
    fn prop_top_items_descending(
        rows in proptest::collection::vec(arb_valid_row(), 1..50),
        k in 1usize..20
    ) {
        let table = load(&rows);
        let batch = table.to_record_batch().unwrap();
        let top = batch.top_k_by_name("total_value", k, SortOrder::Descending).unwrap();
        prop_assert_eq!(top.num_rows(), k.min(table.len()));

        let idx = top.schema().index_of("total_value").unwrap();
        let values = top.column(idx).as_any().downcast_ref::<Float64Array>().unwrap();
        for i in 1..values.len() {
            prop_assert!(values.value(i - 1) >= values.value(i));
        }

        let mut all: Vec<f64> = table.records().iter().map(|r| r.total_value()).collect();
        all.sort_by(|a, b| b.total_cmp(a));
        for (i, expected) in all.iter().take(k).enumerate() {
            prop_assert_eq!(values.value(i).to_bits(), expected.to_bits());
        }
    }
}

proptest! {
    // each case fits a model
    #![proptest_config(ProptestConfig::with_cases(25))]

    // ========================================================================
    // Forecast Properties
    // ========================================================================

    /// Property: a non-seasonal fit always succeeds with ordered bounds
    #[test]
    fn prop_arima_bounds_ordered(
        points in arb_series(Interval::Monthly, 12, 12..30),
        horizon in 1usize..12
    ) {
        let config = ForecastConfig {
            order: ArimaOrder { p: 1, d: 1, q: 1 },
            seasonal: SeasonalOrder::NONE,
            horizon: Some(horizon),
            ..ForecastConfig::default()
        };
        assert_bounds_ordered(&points, Interval::Monthly, &config, horizon)?;
    }

    /// Property: the default seasonal model on monthly history
    #[test]
    fn prop_default_monthly_bounds_ordered(points in arb_series(Interval::Monthly, 12, 15..40)) {
        assert_bounds_ordered(&points, Interval::Monthly, &ForecastConfig::default(), 6)?;
    }

    /// Property: the default seasonal model on daily history
    #[test]
    fn prop_default_daily_bounds_ordered(points in arb_series(Interval::Daily, 7, 14..60)) {
        assert_bounds_ordered(&points, Interval::Daily, &ForecastConfig::default(), 15)?;
    }
}
