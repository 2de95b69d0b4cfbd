use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of calendar days fetched on each side of a release date.
pub const WINDOW_DAYS: i64 = 30;

/// One daily OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Inclusive date range around an earnings release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PriceWindow {
    pub fn around(release_date: NaiveDate) -> Self {
        Self {
            start: release_date - Duration::days(WINDOW_DAYS),
            end: release_date + Duration::days(WINDOW_DAYS),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
