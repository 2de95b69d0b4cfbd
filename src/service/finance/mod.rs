use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::America::New_York;
use finance_query_core::{FetchClient, YahooAuthManager, YahooError, YahooFinanceClient};
use tracing::info;

use crate::config::Config;
use crate::models::{EarningsRecord, EpsSample, NewsItem, PriceBar, QuarterlyAnalysisResult};
use crate::service::analysis::QuarterlyAnalyzer;

pub mod earnings;
pub mod fundamentals;
pub mod growth;
pub mod news;
pub mod prices;
pub mod retry;

pub use earnings::FinnhubClient;
pub use fundamentals::YahooFundamentals;
pub use prices::YahooPriceHistory;

#[derive(Debug, thiserror::Error)]
pub enum FinanceServiceError {
    #[error(transparent)]
    Yahoo(#[from] YahooError),
    #[error("earnings feed unavailable: {0}")]
    FeedUnavailable(String),
    #[error("fundamentals unavailable: {0}")]
    FundamentalsUnavailable(String),
    #[error("price data unavailable: {0}")]
    PriceDataUnavailable(String),
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Source of recent earnings release dates.
#[async_trait]
pub trait EarningsFeed: Send + Sync {
    /// Releases dated after `today - 90d`, in feed order.
    async fn fetch_recent_earnings_as_of(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<EarningsRecord>, FinanceServiceError>;

    async fn fetch_recent_earnings(&self) -> Result<Vec<EarningsRecord>, FinanceServiceError> {
        self.fetch_recent_earnings_as_of(market_today()).await
    }
}

/// Source of quarterly diluted EPS. Failures degrade to an absent sample.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fetch_eps_growth(&self, symbol: &str) -> EpsSample;
}

/// Source of daily price bars. Failures degrade to an empty window.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    async fn fetch_price_window(&self, symbol: &str, release_date: NaiveDate) -> Vec<PriceBar>;
}

/// Current calendar date on the US/Eastern market clock.
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, FinanceServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .map_err(|e| FinanceServiceError::Http(format!("failed to build client: {e}")))
}

/// Provider clients plus the quarterly analysis pipeline built on top of them.
pub struct FinanceService {
    finnhub: Arc<FinnhubClient>,
    analyzer: QuarterlyAnalyzer,
}

impl FinanceService {
    pub fn new(config: &Config) -> Result<Self, FinanceServiceError> {
        let http = build_http_client(config.http_timeout)?;

        let fetch = Arc::new(FetchClient::new(config.yahoo_proxy.clone())?);
        let auth = Arc::new(YahooAuthManager::new(
            config.yahoo_proxy.clone(),
            fetch.cookie_jar().clone(),
        ));
        let yahoo = Arc::new(YahooFinanceClient::new(auth, fetch));

        let finnhub = Arc::new(FinnhubClient::new(
            http.clone(),
            &config.finnhub_base_url,
            &config.finnhub_api_key,
            config.retry,
        ));
        let fundamentals = Arc::new(YahooFundamentals::new(
            yahoo,
            config.http_timeout,
            config.retry,
        ));
        let prices = Arc::new(YahooPriceHistory::new(
            http,
            &config.yahoo_chart_url,
            config.retry,
        ));

        let analyzer = QuarterlyAnalyzer::new(finnhub.clone(), fundamentals, prices);

        info!(
            "Finance service ready (finnhub={}, chart={}, timeout={:?}, attempts={})",
            config.finnhub_base_url,
            config.yahoo_chart_url,
            config.http_timeout,
            config.retry.max_attempts
        );

        Ok(Self { finnhub, analyzer })
    }

    /// Run the full quarterly analysis for a ticker.
    pub async fn analyze_quarter(&self, ticker: &str) -> QuarterlyAnalysisResult {
        self.analyzer.analyze(ticker).await
    }

    /// Recent company news, newest first. Empty when the ticker has none.
    pub async fn get_news(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<NewsItem>, FinanceServiceError> {
        let limit = limit.clamp(1, news::MAX_NEWS_ITEMS);
        self.finnhub
            .fetch_company_news_as_of(symbol, market_today(), limit)
            .await
    }
}

pub use FinanceServiceError as Error;
