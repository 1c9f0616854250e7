//! Portfolio definitions: named, ordered ticker → raw weight mappings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Expected total of raw weights, which are entered as percentages.
pub const TARGET_TOTAL_WEIGHT: f64 = 100.0;

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortfolioError {
    #[error("invalid weight {weight} for {symbol}: weights must be finite and non-negative")]
    InvalidWeight { symbol: String, weight: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Comparison baseline for the other portfolios.
    Benchmark,
    #[default]
    Custom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub name: String,
    pub role: Role,
    holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new<S: Into<String>>(name: S, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            holdings: Vec::new(),
        }
    }

    pub fn benchmark<S: Into<String>>(name: S) -> Self {
        Self::new(name, Role::Benchmark)
    }

    pub fn custom<S: Into<String>>(name: S) -> Self {
        Self::new(name, Role::Custom)
    }

    /// Adds or replaces a holding.
    ///
    /// The symbol is trimmed and upper-cased. Rows with an empty symbol or a
    /// zero weight are ignored, the same way an empty input row would be.
    pub fn insert(&mut self, symbol: &str, weight: f64) -> Result<(), PortfolioError> {
        let symbol = symbol.trim().to_uppercase();

        if !weight.is_finite() || weight < 0.0 {
            return Err(PortfolioError::InvalidWeight { symbol, weight });
        }

        if symbol.is_empty() || weight == 0.0 {
            return Ok(());
        }

        match self.holdings.iter_mut().find(|h| h.symbol == symbol) {
            Some(existing) => existing.weight = weight,
            None => self.holdings.push(Holding { symbol, weight }),
        }

        Ok(())
    }

    pub fn with_holding(mut self, symbol: &str, weight: f64) -> Result<Self, PortfolioError> {
        self.insert(symbol, weight)?;
        Ok(self)
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.holdings.iter().map(|h| h.symbol.as_str())
    }

    pub fn is_benchmark(&self) -> bool {
        self.role == Role::Benchmark
    }

    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    /// A portfolio with no positive weight is inactive and never charted.
    pub fn is_active(&self) -> bool {
        self.total_weight() > 0.0
    }

    /// Weights divided by their sum, in holding order.
    ///
    /// Returns `None` for an inactive portfolio.
    pub fn normalized_weights(&self) -> Option<Vec<(String, f64)>> {
        let total = self.total_weight();
        if total <= 0.0 {
            return None;
        }

        Some(
            self.holdings
                .iter()
                .map(|h| (h.symbol.clone(), h.weight / total))
                .collect(),
        )
    }

    pub fn weight_warning(&self) -> Option<String> {
        let total = self.total_weight();
        if (total - TARGET_TOTAL_WEIGHT).abs() > WEIGHT_TOLERANCE {
            Some(format!(
                "Total weight should be 100% (currently {:.1}%)",
                total
            ))
        } else {
            None
        }
    }

    /// Copy of this portfolio without the given symbols.
    pub fn without(&self, excluded: &BTreeSet<String>) -> Portfolio {
        Portfolio {
            name: self.name.clone(),
            role: self.role,
            holdings: self
                .holdings
                .iter()
                .filter(|h| !excluded.contains(&h.symbol))
                .cloned()
                .collect(),
        }
    }
}

/// Portfolios available when no configuration file is given.
pub fn default_portfolios() -> Vec<Portfolio> {
    fn holdings(rows: &[(&str, f64)]) -> Vec<Holding> {
        rows.iter()
            .map(|(symbol, weight)| Holding {
                symbol: symbol.to_string(),
                weight: *weight,
            })
            .collect()
    }

    // ZAG.TO is part of the benchmark at 0%, so it is not held.
    let benchmark = Portfolio {
        holdings: holdings(&[("XIU.TO", 35.0), ("VFV.TO", 65.0)]),
        ..Portfolio::benchmark("Benchmark Portfolio")
    };
    let custom = Portfolio {
        holdings: holdings(&[
            ("AVDV", 8.0),
            ("AVUV", 8.0),
            ("VUN.TO", 25.0),
            ("XEC.TO", 10.0),
            ("XEF.TO", 20.0),
            ("XIC.TO", 29.0),
        ]),
        ..Portfolio::custom("Custom Portfolio 1")
    };

    vec![
        benchmark,
        custom,
        Portfolio::custom("Custom Portfolio 2"),
        Portfolio::custom("Custom Portfolio 3"),
    ]
}
