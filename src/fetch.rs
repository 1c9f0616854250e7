//! Price history retrieval.
//!
//! [`PriceSource`] is the seam between the calculator and wherever prices
//! come from. [`YahooFinance`] queries the Yahoo Finance chart API with a
//! blocking HTTP client; [`StaticPriceSource`] serves preloaded series.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::utils::{is_usable_price, PriceSeries, TimeSeries};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("no data available for {ticker}")]
    NoData { ticker: String },
    #[error("API error [{code}]: {description}")]
    Api { code: String, description: String },
}

/// Anything that can produce adjusted closing prices for a ticker.
pub trait PriceSource {
    /// Daily adjusted closes for `ticker` with `start <= date <= end`, in
    /// ascending date order.
    fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError>;
}

#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance chart API client.
#[derive(Debug, Clone)]
pub struct YahooFinance {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl YahooFinance {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url<S: Into<String>>(base_url: S) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn build_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        // period2 is exclusive; push it to the following midnight
        let end_exclusive = end.checked_add_days(Days::new(1)).unwrap_or(end);
        format!(
            "{}/{}?period1={}&period2={}&interval=1d&includeAdjustedClose=true",
            self.base_url,
            ticker,
            unix_midnight(start),
            unix_midnight(end_exclusive),
        )
    }
}

impl PriceSource for YahooFinance {
    fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        let url = self.build_url(ticker, start, end);
        debug!(ticker, %start, %end, "fetching price history");

        // Unknown symbols come back as 404 with a JSON error body, so the
        // status is not checked before parsing.
        let text = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.text())
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let series = parse_chart_response(ticker, &text)?;
        let windowed = series.window(start, end);
        if windowed.is_empty() {
            return Err(FetchError::NoData {
                ticker: ticker.to_string(),
            });
        }

        debug!(ticker, rows = windowed.len(), "price history received");
        Ok(windowed)
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Adjusted closes from a chart API payload; falls back to the raw close
/// when no adjusted value is present and skips rows without a price.
pub(crate) fn parse_chart_response(ticker: &str, json: &str) -> Result<PriceSeries, FetchError> {
    let no_data = || FetchError::NoData {
        ticker: ticker.to_string(),
    };

    let response: YahooResponse =
        serde_json::from_str(json).map_err(|e| FetchError::Parse(e.to_string()))?;

    if let Some(error) = response.chart.error {
        return Err(FetchError::Api {
            code: error.code,
            description: error.description,
        });
    }

    let results = response.chart.result.ok_or_else(no_data)?;
    let data = results.first().ok_or_else(no_data)?;

    let offset = data.meta.as_ref().map_or(0, |m| m.gmtoffset);
    let closes = data.indicators.quote.first().map(|q| q.close.as_slice());
    let adj_closes = data
        .indicators
        .adjclose
        .as_ref()
        .and_then(|a| a.first())
        .map(|a| a.adjclose.as_slice());

    let mut dates = Vec::with_capacity(data.timestamp.len());
    let mut values = Vec::with_capacity(data.timestamp.len());

    for (i, ts) in data.timestamp.iter().enumerate() {
        let adj = adj_closes.and_then(|a| a.get(i).copied().flatten());
        let close = closes.and_then(|c| c.get(i).copied().flatten());
        let Some(price) = adj.or(close).filter(|p| is_usable_price(*p)) else {
            continue;
        };
        // exchange-local trading date
        let Some(date) = ts
            .checked_add(offset)
            .and_then(|local| DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        dates.push(date);
        values.push(price);
    }

    TimeSeries::new(dates, values, Some(ticker.to_string())).map_err(|_| no_data())
}

/// A [`PriceSource`] over series supplied up front.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    series: BTreeMap<String, PriceSeries>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series<S: Into<String>>(mut self, ticker: S, series: PriceSeries) -> Self {
        self.insert(ticker, series);
        self
    }

    pub fn insert<S: Into<String>>(&mut self, ticker: S, series: PriceSeries) {
        self.series.insert(ticker.into().to_uppercase(), series);
    }
}

impl PriceSource for StaticPriceSource {
    fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        self.series
            .get(&ticker.to_uppercase())
            .map(|s| s.window(start, end))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FetchError::NoData {
                ticker: ticker.to_string(),
            })
    }
}
