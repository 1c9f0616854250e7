use std::collections::BTreeMap;

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("time series is empty")]
    Empty,
    #[error("time series length mismatch: {dates} dates vs {values} values")]
    LengthMismatch { dates: usize, values: usize },
}

/// A date-indexed sequence of values, sorted by ascending date.
///
/// Used both for fetched adjusted closing prices and for computed
/// portfolio value series.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub name: Option<String>,
}

/// Adjusted closing prices of a single ticker.
pub type PriceSeries = TimeSeries;

/// Indexed value of a portfolio, starting at the display base.
pub type PerformanceSeries = TimeSeries;

/// Price series keyed by ticker symbol.
pub type PriceHistory = BTreeMap<String, PriceSeries>;

impl TimeSeries {
    pub fn new(
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
        name: Option<String>,
    ) -> Result<Self, DataError> {
        if dates.is_empty() || values.is_empty() {
            return Err(DataError::Empty);
        }

        if dates.len() != values.len() {
            return Err(DataError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }

        let mut paired: Vec<(NaiveDate, f64)> = dates.into_iter().zip(values).collect();
        // stable sort, so for a repeated date the later row survives the dedup below
        paired.sort_by_key(|(d, _)| *d);
        let mut deduped: Vec<(NaiveDate, f64)> = Vec::with_capacity(paired.len());
        for (date, value) in paired {
            match deduped.last_mut() {
                Some(last) if last.0 == date => last.1 = value,
                _ => deduped.push((date, value)),
            }
        }

        let (sorted_dates, sorted_values): (Vec<_>, Vec<_>) = deduped.into_iter().unzip();

        Ok(Self {
            dates: sorted_dates,
            values: sorted_values,
            name,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => Some((*first, *last)),
            _ => None,
        }
    }

    pub fn first_value(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value recorded on `date`, if any.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Rows with `start <= date <= end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        let (lo, hi) = (lo.min(hi), hi);

        TimeSeries {
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
            name: self.name.clone(),
        }
    }

    /// Simple period-over-period returns; one element shorter than the series.
    pub fn period_returns(&self) -> Vec<f64> {
        self.values
            .windows(2)
            .map(|w| {
                if w[0] != 0.0 && w[0].is_finite() && w[1].is_finite() {
                    w[1] / w[0] - 1.0
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}

pub(crate) fn is_usable_price(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Dates inside `[start, end]` on which every series has a usable price.
pub fn common_dates(
    series: &[&TimeSeries],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<NaiveDate> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };

    first
        .dates
        .iter()
        .zip(first.values.iter())
        .filter(|(date, value)| {
            start.map_or(true, |s| **date >= s)
                && end.map_or(true, |e| **date <= e)
                && is_usable_price(**value)
        })
        .map(|(date, _)| *date)
        .filter(|date| {
            rest.iter()
                .all(|s| s.value_on(*date).map_or(false, is_usable_price))
        })
        .collect()
}
