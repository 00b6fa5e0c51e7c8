//! # chainsight
//!
//! Command-line driver: one invocation is one user action against a fresh
//! session. Output is plain text on stdout; logs go to stderr (`RUST_LOG`).

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chainsight::config::ReorderPolicy;
use chainsight::storage::export::{forecast_csv_bytes, ForecastColumns};
use chainsight::timeseries::Interval;
use chainsight::{Dashboard, ForecastResult, PipelineConfig, Session};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chainsight")]
#[command(about = "Inventory KPIs and demand forecasts from CSV exports", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an inventory file and print the dashboard cards
    Inventory {
        /// Inventory CSV
        file: PathBuf,

        /// Low-stock threshold (strictly below)
        #[arg(short, long)]
        threshold: Option<u64>,

        /// Write the processed CSV (with Total_Value) here
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Forecast one product from a history file
    Forecast {
        /// History CSV (Date, Product, Available_Stock or Units_Sold)
        file: PathBuf,

        /// Product to forecast
        #[arg(short, long)]
        product: String,

        /// Resampling interval (monthly or daily)
        #[arg(short, long)]
        interval: Option<Interval>,

        /// Periods to forecast
        #[arg(long)]
        horizon: Option<usize>,

        /// Name forecast columns after the value field
        #[arg(long)]
        field_columns: bool,

        /// Write the forecast CSV here
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Inventory {
            file,
            threshold,
            export,
        } => {
            if let Some(threshold) = threshold {
                config.low_stock_threshold = threshold;
                config.reorder_policy = match config.reorder_policy {
                    ReorderPolicy::Fixed { .. } => ReorderPolicy::Fixed { threshold },
                    ReorderPolicy::PerRow { .. } => ReorderPolicy::PerRow { fallback: threshold },
                };
            }
            run_inventory(config, &file, export.as_deref())
        }
        Commands::Forecast {
            file,
            product,
            interval,
            horizon,
            field_columns,
            export,
        } => {
            if let Some(interval) = interval {
                config.series.interval = interval;
            }
            if horizon.is_some() {
                config.forecast.horizon = horizon;
            }
            config.validate().context("invalid configuration")?;
            run_forecast(config, &file, &product, field_columns, export.as_deref())
        }
    }
}

fn run_inventory(config: PipelineConfig, file: &Path, export: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut session = Session::new(config);
    session
        .upload_inventory(&bytes)
        .with_context(|| format!("loading {}", file.display()))?;

    let dashboard = session.dashboard()?;
    print_dashboard(&dashboard);

    if let Some(path) = export {
        let csv = session.processed_export()?;
        std::fs::write(path, &*csv).with_context(|| format!("writing {}", path.display()))?;
        println!("\nprocessed export written to {}", path.display());
    }
    Ok(())
}

fn run_forecast(
    config: PipelineConfig,
    file: &Path,
    product: &str,
    field_columns: bool,
    export: Option<&Path>,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut session = Session::new(config);
    session
        .upload_history(&bytes)
        .with_context(|| format!("loading {}", file.display()))?;

    let result = session
        .forecast(product)
        .with_context(|| format!("forecasting '{product}'"))?;
    print_forecast(&result);

    if let Some(path) = export {
        let names = if field_columns {
            ForecastColumns::for_field(&result.value_field)
        } else {
            ForecastColumns::default()
        };
        let csv = forecast_csv_bytes(&result.clipped_non_negative(), &names)?;
        std::fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
        println!("\nforecast written to {}", path.display());
    }
    Ok(())
}

fn print_dashboard(d: &Dashboard) {
    let m = &d.metrics;
    println!("Total SKUs:        {}", m.total_skus);
    println!("Total value:       {:.2}", m.total_value);
    println!("Out of stock:      {}", m.out_of_stock_count);
    println!("Rows accepted:     {}", m.row_count);
    println!("Rows skipped:      {}", m.skipped_row_count);

    println!("\nLow stock ({}):", d.low_stock.len());
    for r in &d.low_stock {
        println!("  line {:>4}  {:<24} {:>8}", r.line, r.product, r.available_stock);
    }

    println!("\nReorder alerts ({}):", d.reorder_alerts.len());
    for a in &d.reorder_alerts {
        println!(
            "  line {:>4}  {:<24} {:>8} < {}",
            a.line, a.product, a.available_stock, a.threshold
        );
    }

    match &d.supplier_delays {
        Ok(delays) => {
            println!("\nSupplier delays ({}):", delays.len());
            for s in delays {
                println!("  line {:>4}  {:<24} {:>4} days", s.line, s.product, s.days_since_last_delivery);
            }
        }
        Err(e) => println!("\nSupplier delays unavailable: {e}"),
    }

    match &d.categories {
        Ok(summary) => {
            println!("\nCategories:");
            for c in summary.rows() {
                println!(
                    "  {:<24} stock {:>8}  value {:>12.2}  items {:>5}",
                    c.category, c.stock_sum, c.value_sum, c.item_count
                );
            }
        }
        Err(e) => println!("\nCategories unavailable: {e}"),
    }

    match &d.top_items {
        Ok(top) => print_top_items(top),
        Err(e) => println!("\nTop items unavailable: {e}"),
    }

    for s in &d.skipped_rows {
        println!("skipped line {}: {} '{}' ({})", s.line, s.column, s.value, s.reason);
    }
}

fn print_top_items(top: &RecordBatch) {
    match top_item_lines(top) {
        Some(lines) => {
            println!("\nTop {} items by value:", lines.len());
            for line in lines {
                println!("{line}");
            }
        }
        None => println!("\nTop items unavailable: unexpected column layout"),
    }
}

/// One ranked line per row of the Top-K batch
fn top_item_lines(top: &RecordBatch) -> Option<Vec<String>> {
    let products = top
        .column_by_name("product")?
        .as_any()
        .downcast_ref::<StringArray>()?;
    let values = top
        .column_by_name("total_value")?
        .as_any()
        .downcast_ref::<Float64Array>()?;
    Some(
        (0..top.num_rows())
            .map(|i| format!("  {:>3}. {:<24} {:>12.2}", i + 1, products.value(i), values.value(i)))
            .collect(),
    )
}

fn print_forecast(result: &ForecastResult) {
    let model = &result.model;
    println!(
        "SARIMA({},{},{})({},{},{})[{}]{}  sigma2={:.4}",
        model.order.p,
        model.order.d,
        model.order.q,
        model.seasonal.p,
        model.seasonal.d,
        model.seasonal.q,
        model.seasonal_period,
        if model.seasonal_applied { "" } else { " (seasonal terms dropped)" },
        model.sigma2
    );
    println!(
        "{:<12} {:>12} {:>12} {:>12}",
        "period", "forecast", "lower", "upper"
    );
    for p in &result.clipped_non_negative().points {
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2}",
            p.timestamp, p.forecast, p.lower_bound, p.upper_bound
        );
    }
}
