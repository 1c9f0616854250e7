//! Dashboard configuration, read from a JSON file.
//!
//! Every field is optional; anything left out falls back to the built-in
//! defaults, including the default benchmark and custom portfolios.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dashboard::{DashboardOptions, MissingTickerPolicy};
use crate::portfolio::{default_portfolios, Portfolio, PortfolioError, Role};
use crate::stats::{Rebalance, DEFAULT_BASE, DEFAULT_PERIODS_PER_YEAR};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("portfolio '{name}': {source}")]
    Portfolio {
        name: String,
        #[source]
        source: PortfolioError,
    },
    #[error("display base must be a positive number, got {0}")]
    InvalidBase(f64),
}

/// Look-back windows offered for comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePeriod {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "3y")]
    ThreeYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 6] = [
        TimePeriod::OneMonth,
        TimePeriod::ThreeMonths,
        TimePeriod::SixMonths,
        TimePeriod::OneYear,
        TimePeriod::ThreeYears,
        TimePeriod::FiveYears,
    ];

    /// Calendar days covered.
    pub fn days(self) -> u64 {
        match self {
            TimePeriod::OneMonth => 30,
            TimePeriod::ThreeMonths => 90,
            TimePeriod::SixMonths => 180,
            TimePeriod::OneYear => 365,
            TimePeriod::ThreeYears => 1095,
            TimePeriod::FiveYears => 1825,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimePeriod::OneMonth => "1 Month",
            TimePeriod::ThreeMonths => "3 Months",
            TimePeriod::SixMonths => "6 Months",
            TimePeriod::OneYear => "1 Year",
            TimePeriod::ThreeYears => "3 Years",
            TimePeriod::FiveYears => "5 Years",
        }
    }

    fn code(self) -> &'static str {
        match self {
            TimePeriod::OneMonth => "1m",
            TimePeriod::ThreeMonths => "3m",
            TimePeriod::SixMonths => "6m",
            TimePeriod::OneYear => "1y",
            TimePeriod::ThreeYears => "3y",
            TimePeriod::FiveYears => "5y",
        }
    }

    /// First calendar day of the window ending on `end`.
    pub fn start_from(self, end: NaiveDate) -> NaiveDate {
        end.checked_sub_days(Days::new(self.days()))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TimePeriod::ALL
            .into_iter()
            .find(|p| p.code() == wanted || p.label().to_ascii_lowercase() == wanted)
            .ok_or_else(|| {
                format!(
                    "invalid period '{}'; expected one of: 1m, 3m, 6m, 1y, 3y, 5y",
                    s.trim()
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingConfig {
    pub symbol: String,
    /// Percentage weight.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub holdings: Vec<HoldingConfig>,
}

impl PortfolioConfig {
    pub fn build(&self) -> Result<Portfolio, ConfigError> {
        let mut portfolio = Portfolio::new(self.name.trim(), self.role);
        for holding in &self.holdings {
            portfolio
                .insert(&holding.symbol, holding.weight)
                .map_err(|source| ConfigError::Portfolio {
                    name: self.name.clone(),
                    source,
                })?;
        }
        Ok(portfolio)
    }
}

impl From<&Portfolio> for PortfolioConfig {
    fn from(portfolio: &Portfolio) -> Self {
        Self {
            name: portfolio.name.clone(),
            role: portfolio.role,
            holdings: portfolio
                .holdings()
                .iter()
                .map(|h| HoldingConfig {
                    symbol: h.symbol.clone(),
                    weight: h.weight,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub period: TimePeriod,
    /// Value every performance series starts at.
    pub base: f64,
    pub rebalance: Rebalance,
    pub missing_ticker: MissingTickerPolicy,
    /// Annual risk-free rate used for the Sharpe ratio.
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
    pub portfolios: Vec<PortfolioConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Portfolio Performance Visualizer".to_string(),
            period: TimePeriod::default(),
            base: DEFAULT_BASE,
            rebalance: Rebalance::default(),
            missing_ticker: MissingTickerPolicy::default(),
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            portfolios: default_portfolios().iter().map(PortfolioConfig::from).collect(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base.is_finite() || self.base <= 0.0 {
            return Err(ConfigError::InvalidBase(self.base));
        }
        Ok(())
    }

    /// Builds every configured portfolio.
    ///
    /// A portfolio with an invalid weight is left out and described in the
    /// returned warnings; the others are still built.
    pub fn build_portfolios(&self) -> (Vec<Portfolio>, Vec<String>) {
        let mut portfolios = Vec::with_capacity(self.portfolios.len());
        let mut warnings = Vec::new();

        for config in &self.portfolios {
            match config.build() {
                Ok(portfolio) => portfolios.push(portfolio),
                Err(err) => {
                    warn!("{err}");
                    warnings.push(err.to_string());
                }
            }
        }

        (portfolios, warnings)
    }

    /// Options for a window ending on `end`.
    pub fn dashboard_options(&self, end: NaiveDate) -> DashboardOptions {
        DashboardOptions {
            start: self.period.start_from(end),
            end,
            period_label: self.period.label().to_string(),
            base: self.base,
            rebalance: self.rebalance,
            missing_ticker: self.missing_ticker,
            risk_free_rate: self.risk_free_rate,
            periods_per_year: self.periods_per_year.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = DashboardConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.period, TimePeriod::OneYear);
        let (portfolios, warnings) = config.build_portfolios();
        assert_eq!(portfolios.len(), 4);
        assert!(warnings.is_empty());
    }

    #[test]
    fn parses_full_config() {
        let json = r#"{
            "period": "3m",
            "base": 100,
            "rebalance": "daily",
            "missing_ticker": "skip-portfolio",
            "portfolios": [
                {"name": "Index", "role": "benchmark", "holdings": [{"symbol": "spy", "weight": 100}]},
                {"name": "Mine", "holdings": [{"symbol": "AAPL", "weight": 60}, {"symbol": "MSFT", "weight": 40}]}
            ]
        }"#;
        let config = DashboardConfig::from_json_str(json).unwrap();
        assert_eq!(config.period, TimePeriod::ThreeMonths);
        assert_eq!(config.rebalance, Rebalance::Daily);
        assert_eq!(config.missing_ticker, MissingTickerPolicy::SkipPortfolio);

        let (portfolios, _) = config.build_portfolios();
        assert!(portfolios[0].is_benchmark());
        assert_eq!(portfolios[0].symbols().collect::<Vec<_>>(), vec!["SPY"]);
        assert_eq!(portfolios[1].role, Role::Custom);
        assert_eq!(portfolios[1].total_weight(), 100.0);
    }

    #[test]
    fn negative_weight_skips_only_that_portfolio() {
        let json = r#"{"portfolios": [
            {"name": "Bad", "holdings": [{"symbol": "X", "weight": -5}]},
            {"name": "Fine", "holdings": [{"symbol": "Y", "weight": 100}]}
        ]}"#;
        let config = DashboardConfig::from_json_str(json).unwrap();
        let (portfolios, warnings) = config.build_portfolios();

        assert_eq!(portfolios.len(), 1);
        assert_eq!(portfolios[0].name, "Fine");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Bad"));
        assert!(warnings[0].contains("invalid weight"));
    }

    #[test]
    fn rejects_non_positive_base() {
        assert!(matches!(
            DashboardConfig::from_json_str(r#"{"base": 0}"#),
            Err(ConfigError::InvalidBase(_))
        ));
    }

    #[test]
    fn period_parsing_and_window() {
        assert_eq!("5Y".parse::<TimePeriod>(), Ok(TimePeriod::FiveYears));
        assert_eq!("6 months".parse::<TimePeriod>(), Ok(TimePeriod::SixMonths));
        assert!("2w".parse::<TimePeriod>().is_err());

        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            TimePeriod::OneMonth.start_from(end),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        let options = DashboardConfig::default().dashboard_options(end);
        assert_eq!(options.period_label, "1 Year");
        assert_eq!(options.start, NaiveDate::from_ymd_opt(2023, 4, 1).unwrap());
    }
}
