use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::models::QuarterlyAnalysisResult;
use crate::service::finance::earnings::find_release;
use crate::service::finance::{
    market_today, EarningsFeed, FundamentalsSource, PriceHistorySource,
};

/// Per-request inputs that would otherwise come from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisContext {
    /// Calendar date the 90-day earnings window is measured from.
    pub today: NaiveDate,
}

impl AnalysisContext {
    pub fn now() -> Self {
        Self {
            today: market_today(),
        }
    }

    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }
}

/// Joins the earnings calendar, diluted EPS and the price window for one ticker.
#[derive(Clone)]
pub struct QuarterlyAnalyzer {
    feed: Arc<dyn EarningsFeed>,
    fundamentals: Arc<dyn FundamentalsSource>,
    prices: Arc<dyn PriceHistorySource>,
}

impl QuarterlyAnalyzer {
    pub fn new(
        feed: Arc<dyn EarningsFeed>,
        fundamentals: Arc<dyn FundamentalsSource>,
        prices: Arc<dyn PriceHistorySource>,
    ) -> Self {
        Self {
            feed,
            fundamentals,
            prices,
        }
    }

    pub async fn analyze(&self, ticker: &str) -> QuarterlyAnalysisResult {
        self.analyze_in(&AnalysisContext::now(), ticker).await
    }

    /// Never fails: provider errors show up as absent EPS values or an empty window.
    pub async fn analyze_in(&self, ctx: &AnalysisContext, ticker: &str) -> QuarterlyAnalysisResult {
        let records = match self.feed.fetch_recent_earnings_as_of(ctx.today).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Earnings feed failed while analyzing {}: {}", ticker, e);
                return QuarterlyAnalysisResult::empty(ticker);
            }
        };

        let Some(record) = find_release(&records, ticker) else {
            info!("No recent earnings release for {}", ticker);
            return QuarterlyAnalysisResult::empty(ticker);
        };

        info!(
            "Analyzing {} around release date {}",
            record.symbol, record.release_date
        );

        let (eps_sample, price_bars) = tokio::join!(
            self.fundamentals.fetch_eps_growth(&record.symbol),
            self.prices
                .fetch_price_window(&record.symbol, record.release_date),
        );

        QuarterlyAnalysisResult {
            symbol: record.symbol.clone(),
            release_date: Some(record.release_date),
            eps_sample,
            price_bars,
        }
    }
}
