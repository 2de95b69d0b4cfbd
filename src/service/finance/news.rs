use chrono::{DateTime, Duration, NaiveDate};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::NewsItem;
use crate::service::finance::retry::with_retry;
use crate::service::finance::{FinanceServiceError, FinnhubClient};

/// How far back company news is requested (about eight months).
pub const NEWS_LOOKBACK_DAYS: i64 = 240;
pub const DEFAULT_NEWS_ITEMS: usize = 5;
pub const MAX_NEWS_ITEMS: usize = 10;

impl FinnhubClient {
    /// Fetch company news published between `today - 240d` and `today`.
    pub async fn fetch_company_news_as_of(
        &self,
        symbol: &str,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<NewsItem>, FinanceServiceError> {
        let from = (today - Duration::days(NEWS_LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let to = today.format("%Y-%m-%d").to_string();
        info!("Fetching news for {} from {} to {}", symbol, from, to);

        let query = [
            ("symbol", symbol),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ];
        let raw = with_retry(self.retry_policy(), "company news request", || {
            self.get_bytes("/company-news", &query)
        })
        .await
        .map_err(|e| {
            warn!("Company news request failed: {}", e);
            FinanceServiceError::Http(e)
        })?;

        let data: Value = serde_json::from_slice(&raw)
            .map_err(|e| FinanceServiceError::Http(format!("news parse failed: {e}")))?;

        Ok(parse_news(&data, limit))
    }
}

fn parse_news(data: &Value, limit: usize) -> Vec<NewsItem> {
    let empty = Vec::new();
    let articles = data.as_array().unwrap_or(&empty);

    let mut dated: Vec<(Option<i64>, NewsItem)> = articles
        .iter()
        .map(|item| {
            let text = |key: &str, fallback: &str| {
                item.get(key)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(fallback)
                    .to_string()
            };
            let ts = item.get("datetime").and_then(|v| v.as_i64());

            let news = NewsItem {
                headline: text("headline", "No title"),
                url: text("url", "#"),
                published: ts
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.date_naive()),
                summary: text("summary", "No summary available."),
            };
            (ts, news)
        })
        .collect();

    // Newest first; undated items sink to the bottom.
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    dated.into_iter().take(limit).map(|(_, n)| n).collect()
}
