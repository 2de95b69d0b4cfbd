use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{EpsSample, PriceBar};

/// Output of one quarterly analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyAnalysisResult {
    pub symbol: String,
    pub release_date: Option<NaiveDate>,
    pub eps_sample: EpsSample,
    pub price_bars: Vec<PriceBar>,
}

impl QuarterlyAnalysisResult {
    /// Result for a ticker without a recent earnings release.
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            release_date: None,
            eps_sample: EpsSample::absent(),
            price_bars: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.release_date.is_none() && self.eps_sample.is_absent() && self.price_bars.is_empty()
    }

    /// One-row table projection, `None` when there is nothing to show.
    pub fn table_row(&self) -> Option<EarningsRow> {
        let release_date = self.release_date?;
        Some(EarningsRow {
            symbol: self.symbol.clone(),
            release_date,
            latest_eps: self.eps_sample.latest_eps,
            eps_growth_pct: self.eps_sample.growth_pct,
        })
    }
}

/// Row of the earnings report table: symbol, release date, latest EPS, EPS growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsRow {
    pub symbol: String,
    pub release_date: NaiveDate,
    pub latest_eps: Option<f64>,
    pub eps_growth_pct: Option<f64>,
}
