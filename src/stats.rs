use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::portfolio::Portfolio;
use crate::utils::{common_dates, PerformanceSeries, PriceHistory, PriceSeries, TimeSeries};

pub const DEFAULT_PERIODS_PER_YEAR: u32 = 252;
pub const DEFAULT_BASE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("no price data available for {ticker}")]
    DataUnavailable { ticker: String },
    #[error("no trading days in the selected window")]
    EmptyWindow,
}

/// How constituent weights evolve over the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rebalance {
    /// Weights are applied once at the first date (buy and hold).
    #[default]
    Never,
    /// Weights are restored every period; period returns are compounded.
    Daily,
}

impl FromStr for Rebalance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" | "none" | "buy-and-hold" => Ok(Rebalance::Never),
            "daily" => Ok(Rebalance::Daily),
            other => Err(format!(
                "invalid rebalance mode '{}'; expected one of: never, daily",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalcOptions {
    /// Value every series starts at, e.g. 1.0 or 100.0.
    pub base: f64,
    pub rebalance: Rebalance,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for CalcOptions {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            rebalance: Rebalance::Never,
            start: None,
            end: None,
        }
    }
}

/// Each ticker's price divided by its price on the first of `dates`.
///
/// Every date must be present in `series`; missing dates yield NaN.
pub fn relative_prices(series: &PriceSeries, dates: &[NaiveDate]) -> Vec<f64> {
    let prices: Vec<f64> = dates
        .iter()
        .map(|d| series.value_on(*d).unwrap_or(f64::NAN))
        .collect();

    match prices.first().copied() {
        Some(p0) if p0 != 0.0 => prices.iter().map(|p| p / p0).collect(),
        _ => vec![f64::NAN; prices.len()],
    }
}

/// Indexed value of `portfolio` over the common trading days of its
/// constituents.
///
/// Returns `Ok(None)` when the portfolio has no positive weight.
pub fn portfolio_performance(
    portfolio: &Portfolio,
    history: &PriceHistory,
    options: &CalcOptions,
) -> Result<Option<PerformanceSeries>, CalcError> {
    let Some(weights) = portfolio.normalized_weights() else {
        return Ok(None);
    };

    let mut constituents: Vec<(&PriceSeries, f64)> = Vec::with_capacity(weights.len());
    for (ticker, weight) in &weights {
        match history.get(ticker) {
            Some(series) if !series.is_empty() => constituents.push((series, *weight)),
            _ => {
                return Err(CalcError::DataUnavailable {
                    ticker: ticker.clone(),
                })
            }
        }
    }

    let series_refs: Vec<&TimeSeries> = constituents.iter().map(|(s, _)| *s).collect();
    let dates = common_dates(&series_refs, options.start, options.end);
    if dates.is_empty() {
        return Err(CalcError::EmptyWindow);
    }

    let relatives: Vec<(Vec<f64>, f64)> = constituents
        .iter()
        .map(|(series, weight)| (relative_prices(series, &dates), *weight))
        .collect();

    let values: Vec<f64> = match options.rebalance {
        Rebalance::Never => (0..dates.len())
            .map(|t| {
                options.base
                    * relatives
                        .iter()
                        .map(|(rel, w)| w * rel[t])
                        .sum::<f64>()
            })
            .collect(),
        Rebalance::Daily => {
            let mut out = Vec::with_capacity(dates.len());
            let mut value = options.base;
            out.push(value);
            for t in 1..dates.len() {
                let period_return: f64 = relatives
                    .iter()
                    .map(|(rel, w)| w * (rel[t] / rel[t - 1] - 1.0))
                    .sum();
                value *= 1.0 + period_return;
                out.push(value);
            }
            out
        }
    };

    Ok(Some(TimeSeries {
        dates,
        values,
        name: Some(portfolio.name.clone()),
    }))
}

#[derive(Clone, Debug)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: u32,
    pub max_drawdown_start: Option<NaiveDate>,
    pub max_drawdown_trough: Option<NaiveDate>,
    pub max_drawdown_end: Option<NaiveDate>,
    pub best_day: f64,
    pub worst_day: f64,
}

impl PerformanceMetrics {
    /// Total-return difference against `benchmark`, as a fraction.
    pub fn excess_over(&self, benchmark: &PerformanceMetrics) -> f64 {
        self.total_return - benchmark.total_return
    }
}

pub fn compute_performance_metrics(
    performance: &PerformanceSeries,
    rf: f64,
    periods_per_year: u32,
) -> PerformanceMetrics {
    let returns = performance.period_returns();
    let n = returns.len() as f64;

    let total_return = match (performance.first_value(), performance.last_value()) {
        (Some(first), Some(last)) if first != 0.0 => last / first - 1.0,
        _ => 0.0,
    };
    let annualized_return = if n > 0.0 {
        (1.0 + total_return).powf(periods_per_year as f64 / n) - 1.0
    } else {
        0.0
    };

    let volatility = annualized_volatility(&returns, periods_per_year);
    let sharpe_ratio = sharpe_from_values(&returns, rf, periods_per_year);

    let dd_segments = top_drawdowns(performance, 1);
    let (max_drawdown, max_duration, max_start, max_trough, max_end) =
        if let Some(dd) = dd_segments.first() {
            (
                dd.depth,
                dd.duration,
                Some(dd.start),
                Some(dd.trough),
                Some(dd.end),
            )
        } else {
            (0.0, 0, None, None, None)
        };

    let (best_day, worst_day) = best_and_worst(&returns);

    PerformanceMetrics {
        total_return,
        annualized_return,
        annualized_volatility: volatility,
        sharpe_ratio,
        max_drawdown,
        max_drawdown_duration: max_duration,
        max_drawdown_start: max_start,
        max_drawdown_trough: max_trough,
        max_drawdown_end: max_end,
        best_day,
        worst_day,
    }
}

fn annualized_volatility(returns: &[f64], periods_per_year: u32) -> f64 {
    let clean: Vec<f64> = returns
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if clean.len() < 2 {
        return 0.0;
    }

    let n = clean.len() as f64;
    let mean = clean.iter().sum::<f64>() / n;
    let var = clean
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    var.sqrt() * (periods_per_year as f64).sqrt()
}

fn best_and_worst(returns: &[f64]) -> (f64, f64) {
    let mut best = f64::NEG_INFINITY;
    let mut worst = f64::INFINITY;

    for r in returns.iter().copied().filter(|v| !v.is_nan()) {
        if r > best {
            best = r;
        }
        if r < worst {
            worst = r;
        }
    }

    if best == f64::NEG_INFINITY {
        best = 0.0;
    }
    if worst == f64::INFINITY {
        worst = 0.0;
    }

    (best, worst)
}

fn sharpe_from_values(returns: &[f64], rf: f64, periods_per_year: u32) -> f64 {
    let vals: Vec<f64> = returns
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if vals.len() < 2 {
        return 0.0;
    }

    let n = vals.len() as f64;

    // annual risk-free rate to per-period
    let rf_per_period = if rf != 0.0 {
        (1.0 + rf).powf(1.0 / periods_per_year as f64) - 1.0
    } else {
        0.0
    };

    let excess: Vec<f64> = vals.into_iter().map(|r| r - rf_per_period).collect();

    let mean = excess.iter().sum::<f64>() / n;
    let var = excess
        .iter()
        .map(|r| {
            let diff = *r - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);
    let std = var.sqrt();

    if std == 0.0 {
        0.0
    } else {
        mean / std * (periods_per_year as f64).sqrt()
    }
}

#[derive(Clone, Debug)]
pub struct Drawdown {
    pub start: NaiveDate,
    pub trough: NaiveDate,
    pub end: NaiveDate,
    /// Depth as a negative fraction (e.g. -0.25 for -25%)
    pub depth: f64,
    /// Number of observations from the first underwater point to recovery
    pub duration: u32,
}

/// The `top_n` deepest drawdowns of a value curve, deepest first.
pub fn top_drawdowns(performance: &PerformanceSeries, top_n: usize) -> Vec<Drawdown> {
    let mut segments = compute_drawdown_segments(performance);

    segments.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(std::cmp::Ordering::Equal));
    segments.truncate(top_n);

    segments
}

fn compute_drawdown_segments(performance: &PerformanceSeries) -> Vec<Drawdown> {
    let n = performance.values.len();
    if n == 0 {
        return Vec::new();
    }

    // Carry the last finite value over gaps
    let mut equity = Vec::with_capacity(n);
    let mut last = performance.values[0];
    for v in &performance.values {
        if v.is_finite() {
            last = *v;
        }
        equity.push(last);
    }

    let mut peak = equity[0];
    let mut drawdowns = Vec::with_capacity(n);
    for &e in &equity {
        if e > peak {
            peak = e;
        }
        drawdowns.push(if peak != 0.0 { e / peak - 1.0 } else { 0.0 });
    }

    let mut segments: Vec<Drawdown> = Vec::new();
    let mut in_dd = false;
    let mut start_idx = 0usize;
    let mut trough_idx = 0usize;
    let mut min_dd = 0.0_f64;

    for (i, &dd) in drawdowns.iter().enumerate() {
        if !in_dd {
            if dd < 0.0 {
                in_dd = true;
                start_idx = i;
                trough_idx = i;
                min_dd = dd;
            }
        } else {
            if dd < min_dd {
                min_dd = dd;
                trough_idx = i;
            }

            if dd >= 0.0 {
                segments.push(Drawdown {
                    start: performance.dates[start_idx],
                    trough: performance.dates[trough_idx],
                    end: performance.dates[i],
                    depth: min_dd,
                    duration: (i - start_idx + 1) as u32,
                });
                in_dd = false;
            }
        }
    }

    // still underwater at the end of the window
    if in_dd {
        let last = n - 1;
        segments.push(Drawdown {
            start: performance.dates[start_idx],
            trough: performance.dates[trough_idx],
            end: performance.dates[last],
            depth: min_dd,
            duration: (last - start_idx + 1) as u32,
        });
    }

    segments
}
