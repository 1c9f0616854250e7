//! Command-line entry point: fetches prices, computes every configured
//! portfolio and writes the HTML dashboard.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueHint};
use portfolio_viz::{
    build_dashboard, html, text_summary, DashboardConfig, HtmlReportOptions, MissingTickerPolicy,
    Rebalance, TimePeriod, YahooFinance,
};
use tracing::info;

const DEFAULT_OUTPUT: &str = "portfolio_dashboard.html";

/// Portfolio Performance Visualizer
///
/// Compares the indexed value of weighted portfolios against a benchmark
/// over a selectable window, using daily adjusted closes from Yahoo Finance.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with portfolios and settings (built-in defaults otherwise)
    #[arg(
        short = 'c',
        long = "config",
        env = "PORTFOLIO_VIZ_CONFIG",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,

    /// Look-back window: 1m, 3m, 6m, 1y, 3y or 5y
    #[arg(short = 'p', long = "period", value_parser = parse_period)]
    period: Option<TimePeriod>,

    /// Last day of the window, YYYY-MM-DD (default: today)
    #[arg(long = "end", value_parser = parse_date)]
    end: Option<NaiveDate>,

    /// Value every series starts at, e.g. 1 or 100
    #[arg(long = "base")]
    base: Option<f64>,

    /// Weighting over time: never (buy and hold) or daily
    #[arg(long = "rebalance", value_parser = parse_rebalance)]
    rebalance: Option<Rebalance>,

    /// Tickers without data: drop-ticker or skip-portfolio
    #[arg(long = "missing", value_parser = parse_missing_policy)]
    missing: Option<MissingTickerPolicy>,

    /// Where to write the HTML dashboard
    #[arg(
        short = 'o',
        long = "output",
        default_value = DEFAULT_OUTPUT,
        value_hint = ValueHint::FilePath
    )]
    output: PathBuf,

    /// Yahoo Finance chart API endpoint
    #[arg(long = "yahoo-url", env = "YAHOO_CHART_URL")]
    yahoo_url: Option<String>,
}

fn parse_period(s: &str) -> Result<TimePeriod, String> {
    s.parse()
}

fn parse_rebalance(s: &str) -> Result<Rebalance, String> {
    s.parse()
}

fn parse_missing_policy(s: &str) -> Result<MissingTickerPolicy, String> {
    s.parse()
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {} (expected YYYY-MM-DD)", s.trim(), e))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(period) = args.period {
        config.period = period;
    }
    if let Some(base) = args.base {
        config.base = base;
    }
    if let Some(rebalance) = args.rebalance {
        config.rebalance = rebalance;
    }
    if let Some(missing) = args.missing {
        config.missing_ticker = missing;
    }
    config.validate()?;

    let (portfolios, input_warnings) = config.build_portfolios();
    let end = args.end.unwrap_or_else(|| Local::now().date_naive());
    let options = config.dashboard_options(end);
    info!(
        period = %config.period,
        start = %options.start,
        end = %options.end,
        portfolios = portfolios.len(),
        "building dashboard"
    );

    let source = match &args.yahoo_url {
        Some(url) => YahooFinance::with_base_url(url.as_str()),
        None => YahooFinance::new(),
    }
    .context("failed to create Yahoo Finance client")?;

    let mut dashboard = build_dashboard(&source, &portfolios, &options);
    dashboard.prepend_warnings(input_warnings);

    let report_options = HtmlReportOptions::default()
        .with_title(config.title.as_str())
        .with_output(&args.output);
    html(&dashboard, report_options)
        .with_context(|| format!("failed to write dashboard to {}", args.output.display()))?;

    print!("{}", text_summary(&dashboard));
    for warning in &dashboard.warnings {
        println!("warning: {warning}");
    }
    println!("Dashboard written to {}", args.output.display());

    Ok(())
}
