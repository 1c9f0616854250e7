//! One dashboard refresh: fetch every weighted ticker, compute each
//! portfolio's performance, and collect the user-facing warnings.
//!
//! Nothing here is fatal. Fetch and calculation failures are turned into
//! warnings and the remaining portfolios are still computed.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fetch::{FetchError, PriceSource};
use crate::portfolio::Portfolio;
use crate::stats::{
    compute_performance_metrics, portfolio_performance, CalcError, CalcOptions,
    PerformanceMetrics, Rebalance,
};
use crate::utils::{PerformanceSeries, PriceHistory, PriceSeries};

pub const NO_DATA_MESSAGE: &str = "No valid data available for any portfolio. Please check your portfolio compositions and try again.";

/// What to do with a portfolio when some of its tickers returned no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingTickerPolicy {
    /// Chart the remaining tickers with their weights renormalized.
    #[default]
    DropTicker,
    /// Leave the whole portfolio off the chart.
    SkipPortfolio,
}

impl FromStr for MissingTickerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop-ticker" | "drop" => Ok(MissingTickerPolicy::DropTicker),
            "skip-portfolio" | "skip" => Ok(MissingTickerPolicy::SkipPortfolio),
            other => Err(format!(
                "invalid missing-ticker policy '{}'; expected one of: drop-ticker, skip-portfolio",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub period_label: String,
    pub base: f64,
    pub rebalance: Rebalance,
    pub missing_ticker: MissingTickerPolicy,
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
}

impl DashboardOptions {
    fn calc_options(&self) -> CalcOptions {
        CalcOptions {
            base: self.base,
            rebalance: self.rebalance,
            start: Some(self.start),
            end: Some(self.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Charted,
    /// No positive weight; silently left out.
    Inactive,
    /// Could not be computed; the message was also added to the warnings.
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct PortfolioOutcome {
    pub portfolio: Portfolio,
    pub status: OutcomeStatus,
    pub performance: Option<PerformanceSeries>,
    pub metrics: Option<PerformanceMetrics>,
    /// Tickers left out because they returned no data.
    pub dropped_tickers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub period_label: String,
    pub base: f64,
    pub outcomes: Vec<PortfolioOutcome>,
    pub warnings: Vec<String>,
}

impl Dashboard {
    /// The first benchmark portfolio, whatever its status.
    pub fn benchmark(&self) -> Option<&PortfolioOutcome> {
        self.outcomes.iter().find(|o| o.portfolio.is_benchmark())
    }

    pub fn benchmark_metrics(&self) -> Option<&PerformanceMetrics> {
        self.benchmark().and_then(|o| o.metrics.as_ref())
    }

    pub fn charted(&self) -> impl Iterator<Item = &PortfolioOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Charted)
    }

    pub fn has_data(&self) -> bool {
        self.charted().next().is_some()
    }

    /// Puts warnings about the input itself, such as rejected portfolios,
    /// ahead of the ones raised while computing.
    pub fn prepend_warnings(&mut self, warnings: Vec<String>) {
        self.warnings.splice(0..0, warnings);
    }
}

/// Runs one full refresh over `portfolios`.
///
/// Each distinct ticker is requested once per refresh even if several
/// portfolios hold it.
pub fn build_dashboard<S: PriceSource + ?Sized>(
    source: &S,
    portfolios: &[Portfolio],
    options: &DashboardOptions,
) -> Dashboard {
    let mut warnings = Vec::new();
    let mut fetched: BTreeMap<String, Result<PriceSeries, FetchError>> = BTreeMap::new();

    for portfolio in portfolios.iter().filter(|p| p.is_active()) {
        for symbol in portfolio.symbols() {
            if fetched.contains_key(symbol) {
                continue;
            }
            let result = source.history(symbol, options.start, options.end);
            if let Err(err) = &result {
                let message = match err {
                    FetchError::NoData { .. } => format!("No data available for {symbol}"),
                    other => format!("Error fetching data for {symbol}: {other}"),
                };
                warn!("{message}");
                warnings.push(message);
            }
            fetched.insert(symbol.to_string(), result);
        }
    }

    let history: PriceHistory = fetched
        .iter()
        .filter_map(|(symbol, result)| {
            result
                .as_ref()
                .ok()
                .map(|series| (symbol.clone(), series.clone()))
        })
        .collect();

    let outcomes = portfolios
        .iter()
        .map(|portfolio| evaluate(portfolio, &history, options, &mut warnings))
        .collect::<Vec<_>>();

    let charted = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Charted)
        .count();
    info!(
        charted,
        total = outcomes.len(),
        warnings = warnings.len(),
        "dashboard computed"
    );

    Dashboard {
        start: options.start,
        end: options.end,
        period_label: options.period_label.clone(),
        base: options.base,
        outcomes,
        warnings,
    }
}

fn evaluate(
    portfolio: &Portfolio,
    history: &PriceHistory,
    options: &DashboardOptions,
    warnings: &mut Vec<String>,
) -> PortfolioOutcome {
    let mut outcome = PortfolioOutcome {
        portfolio: portfolio.clone(),
        status: OutcomeStatus::Inactive,
        performance: None,
        metrics: None,
        dropped_tickers: Vec::new(),
    };

    if !portfolio.is_active() {
        return outcome;
    }

    let missing: BTreeSet<String> = portfolio
        .symbols()
        .filter(|s| !history.contains_key(*s))
        .map(str::to_string)
        .collect();

    let effective = if missing.is_empty() {
        portfolio.clone()
    } else {
        match options.missing_ticker {
            MissingTickerPolicy::SkipPortfolio => {
                let listed = missing.iter().cloned().collect::<Vec<_>>().join(", ");
                return unavailable(
                    outcome,
                    format!("{}: skipped, no data for {}", portfolio.name, listed),
                    warnings,
                );
            }
            MissingTickerPolicy::DropTicker => {
                outcome.dropped_tickers = missing.iter().cloned().collect();
                portfolio.without(&missing)
            }
        }
    };

    match portfolio_performance(&effective, history, &options.calc_options()) {
        Ok(Some(performance)) => {
            outcome.metrics = Some(compute_performance_metrics(
                &performance,
                options.risk_free_rate,
                options.periods_per_year,
            ));
            outcome.performance = Some(performance);
            outcome.status = OutcomeStatus::Charted;
            outcome
        }
        // every ticker was dropped
        Ok(None) => unavailable(
            outcome,
            format!("{}: no data for any holding", portfolio.name),
            warnings,
        ),
        Err(CalcError::EmptyWindow) => unavailable(
            outcome,
            format!(
                "{}: no trading days shared by all holdings between {} and {}",
                portfolio.name, options.start, options.end
            ),
            warnings,
        ),
        Err(err @ CalcError::DataUnavailable { .. }) => {
            unavailable(outcome, format!("{}: {}", portfolio.name, err), warnings)
        }
    }
}

fn unavailable(
    mut outcome: PortfolioOutcome,
    message: String,
    warnings: &mut Vec<String>,
) -> PortfolioOutcome {
    warn!("{message}");
    warnings.push(message.clone());
    outcome.status = OutcomeStatus::Unavailable(message);
    outcome
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::fetch::StaticPriceSource;
    use crate::utils::TimeSeries;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn series(values: &[f64]) -> PriceSeries {
        TimeSeries::new((1..=values.len() as u32).map(d).collect(), values.to_vec(), None).unwrap()
    }

    fn options(missing_ticker: MissingTickerPolicy) -> DashboardOptions {
        DashboardOptions {
            start: d(1),
            end: d(31),
            period_label: "1 Month".to_string(),
            base: 1.0,
            rebalance: Rebalance::Never,
            missing_ticker,
            risk_free_rate: 0.0,
            periods_per_year: 252,
        }
    }

    fn source() -> StaticPriceSource {
        StaticPriceSource::new()
            .with_series("A", series(&[100.0, 110.0]))
            .with_series("B", series(&[200.0, 180.0]))
    }

    struct CountingSource {
        inner: StaticPriceSource,
        calls: RefCell<Vec<String>>,
    }

    impl PriceSource for CountingSource {
        fn history(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceSeries, FetchError> {
            self.calls.borrow_mut().push(ticker.to_string());
            self.inner.history(ticker, start, end)
        }
    }

    #[test]
    fn missing_ticker_is_dropped_and_reported() {
        let mixed = Portfolio::custom("Mixed")
            .with_holding("A", 50.0)
            .unwrap()
            .with_holding("GONE", 50.0)
            .unwrap();

        let dash = build_dashboard(&source(), &[mixed], &options(MissingTickerPolicy::DropTicker));
        let outcome = &dash.outcomes[0];

        assert_eq!(outcome.status, OutcomeStatus::Charted);
        assert_eq!(outcome.dropped_tickers, vec!["GONE".to_string()]);
        let perf = outcome.performance.as_ref().unwrap();
        assert!((perf.values[1] - 1.1).abs() < 1e-12);
        assert_eq!(dash.warnings, vec!["No data available for GONE".to_string()]);
    }

    #[test]
    fn skip_policy_leaves_portfolio_out_but_keeps_others() {
        let mixed = Portfolio::custom("Mixed")
            .with_holding("A", 50.0)
            .unwrap()
            .with_holding("GONE", 50.0)
            .unwrap();
        let fine = Portfolio::benchmark("Bench").with_holding("B", 100.0).unwrap();

        let dash = build_dashboard(
            &source(),
            &[fine, mixed],
            &options(MissingTickerPolicy::SkipPortfolio),
        );

        assert_eq!(dash.outcomes[0].status, OutcomeStatus::Charted);
        assert!(matches!(dash.outcomes[1].status, OutcomeStatus::Unavailable(_)));
        assert_eq!(dash.warnings.len(), 2);
        assert!(dash.has_data());
        assert_eq!(dash.benchmark().unwrap().portfolio.name, "Bench");
    }

    #[test]
    fn inactive_portfolio_is_silent() {
        let empty = Portfolio::custom("Empty");
        let dash = build_dashboard(&source(), &[empty], &options(MissingTickerPolicy::DropTicker));

        assert_eq!(dash.outcomes[0].status, OutcomeStatus::Inactive);
        assert!(dash.warnings.is_empty());
        assert!(!dash.has_data());
    }

    #[test]
    fn all_tickers_missing_is_unavailable() {
        let ghost = Portfolio::custom("Ghost").with_holding("NOPE", 100.0).unwrap();
        let dash = build_dashboard(&source(), &[ghost], &options(MissingTickerPolicy::DropTicker));

        assert!(matches!(dash.outcomes[0].status, OutcomeStatus::Unavailable(_)));
        assert_eq!(dash.warnings.len(), 2);
    }

    #[test]
    fn shared_tickers_are_fetched_once() {
        let counting = CountingSource {
            inner: source(),
            calls: RefCell::new(Vec::new()),
        };
        let one = Portfolio::custom("One").with_holding("A", 100.0).unwrap();
        let two = Portfolio::custom("Two")
            .with_holding("A", 50.0)
            .unwrap()
            .with_holding("B", 50.0)
            .unwrap();

        let dash = build_dashboard(&counting, &[one, two], &options(MissingTickerPolicy::DropTicker));

        assert_eq!(*counting.calls.borrow(), vec!["A".to_string(), "B".to_string()]);
        let two_perf = dash.outcomes[1].performance.as_ref().unwrap();
        assert!((two_perf.values[1] - 1.0).abs() < 1e-12);
    }

    struct OfflineSource;

    impl PriceSource for OfflineSource {
        fn history(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<PriceSeries, FetchError> {
            Err(FetchError::Request("connection refused".to_string()))
        }
    }

    #[test]
    fn request_failure_is_reported_per_ticker() {
        let p = Portfolio::custom("Net").with_holding("A", 100.0).unwrap();
        let dash = build_dashboard(&OfflineSource, &[p], &options(MissingTickerPolicy::DropTicker));

        assert_eq!(
            dash.warnings[0],
            "Error fetching data for A: request failed: connection refused"
        );
        assert!(matches!(dash.outcomes[0].status, OutcomeStatus::Unavailable(_)));
        assert!(!dash.has_data());
    }

    #[test]
    fn input_warnings_come_first() {
        let ghost = Portfolio::custom("Ghost").with_holding("NOPE", 100.0).unwrap();
        let mut dash = build_dashboard(&source(), &[ghost], &options(MissingTickerPolicy::DropTicker));
        dash.prepend_warnings(vec!["portfolio 'Bad': invalid weight".to_string()]);

        assert_eq!(dash.warnings.len(), 3);
        assert_eq!(dash.warnings[0], "portfolio 'Bad': invalid weight");
    }

    #[test]
    fn policy_parses() {
        assert_eq!("skip".parse::<MissingTickerPolicy>(), Ok(MissingTickerPolicy::SkipPortfolio));
        assert_eq!(
            "Drop-Ticker".parse::<MissingTickerPolicy>(),
            Ok(MissingTickerPolicy::DropTicker)
        );
        assert!("zero-fill".parse::<MissingTickerPolicy>().is_err());
    }
}
