use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::models::{PriceBar, PriceWindow};
use crate::service::finance::retry::with_retry_if;
use crate::service::finance::{FinanceServiceError, PriceHistorySource};

/// Daily bars from the Yahoo Finance chart endpoint.
pub struct YahooPriceHistory {
    http: reqwest::Client,
    chart_url: String,
    retry: RetryPolicy,
}

impl YahooPriceHistory {
    pub fn new(http: reqwest::Client, chart_url: &str, retry: RetryPolicy) -> Self {
        Self {
            http,
            chart_url: chart_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// Like [`PriceHistorySource::fetch_price_window`] but surfaces provider failures.
    pub async fn try_fetch_window(
        &self,
        symbol: &str,
        window: PriceWindow,
    ) -> Result<Vec<PriceBar>, FinanceServiceError> {
        let (period1, period2) = request_bounds(window);
        let url = format!("{}/{}", self.chart_url, symbol);

        let data = with_retry_if(
            self.retry,
            "price history request",
            |failure: &ChartFailure| failure.retryable,
            || async {
                let resp = self
                    .http
                    .get(&url)
                    .query(&[
                        ("period1", period1.to_string()),
                        ("period2", period2.to_string()),
                        ("interval", "1d".to_string()),
                    ])
                    .send()
                    .await
                    .map_err(|e| ChartFailure::transient(format!("chart request failed: {e}")))?;

                let status = resp.status();
                let retryable = is_transient_status(status);
                let body: Value = resp.json().await.map_err(|e| ChartFailure {
                    error: FinanceServiceError::PriceDataUnavailable(format!(
                        "chart status {status}, unreadable body: {e}"
                    )),
                    retryable,
                })?;

                if !status.is_success() {
                    return Err(ChartFailure {
                        error: FinanceServiceError::PriceDataUnavailable(format!(
                            "chart status {status}: {}",
                            chart_error(&body).unwrap_or_else(|| "no description".to_string())
                        )),
                        retryable,
                    });
                }
                Ok::<Value, ChartFailure>(body)
            },
        )
        .await
        .map_err(|failure| failure.error)?;

        parse_chart(&data, window)
    }
}

#[async_trait]
impl PriceHistorySource for YahooPriceHistory {
    async fn fetch_price_window(&self, symbol: &str, release_date: NaiveDate) -> Vec<PriceBar> {
        let window = PriceWindow::around(release_date);
        info!(
            "Fetching {} daily bars from {} to {}",
            symbol, window.start, window.end
        );

        match self.try_fetch_window(symbol, window).await {
            Ok(bars) => {
                info!("Received {} bars for {}", bars.len(), symbol);
                bars
            }
            Err(e) => {
                warn!("Price data unavailable for {}: {}", symbol, e);
                Vec::new()
            }
        }
    }
}

/// A failed chart request and whether another attempt could succeed.
#[derive(Debug)]
struct ChartFailure {
    error: FinanceServiceError,
    retryable: bool,
}

impl ChartFailure {
    fn transient(message: String) -> Self {
        Self {
            error: FinanceServiceError::PriceDataUnavailable(message),
            retryable: true,
        }
    }
}

impl fmt::Display for ChartFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

/// Server errors and rate limiting are worth another attempt; other statuses are final.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Unix bounds for the request: window start through the end of the window's last day.
fn request_bounds(window: PriceWindow) -> (i64, i64) {
    let start = window.start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    let end = (window.end + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp());
    (start.unwrap_or_default(), end.unwrap_or_default())
}

fn chart_error(data: &Value) -> Option<String> {
    let error = data.get("chart")?.get("error")?;
    if error.is_null() {
        return None;
    }
    Some(
        error
            .get("description")
            .and_then(|d| d.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

/// Turn a chart payload into chronological bars inside `window`.
///
/// Bars are dated in exchange-local time (`meta.gmtoffset`). Rows with any
/// missing OHLC value are skipped and duplicate dates keep the first bar.
pub fn parse_chart(data: &Value, window: PriceWindow) -> Result<Vec<PriceBar>, FinanceServiceError> {
    if let Some(err) = chart_error(data) {
        return Err(FinanceServiceError::PriceDataUnavailable(err));
    }

    let Some(result) = data
        .get("chart")
        .and_then(|c| c.get("result"))
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
    else {
        return Ok(Vec::new());
    };

    let gmtoffset = result
        .get("meta")
        .and_then(|m| m.get("gmtoffset"))
        .and_then(|o| o.as_i64())
        .unwrap_or(0);

    let empty = Vec::new();
    let timestamps = result
        .get("timestamp")
        .and_then(|t| t.as_array())
        .unwrap_or(&empty);
    let quote = result
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.as_array())
        .and_then(|arr| arr.first());

    let series = |name: &str| -> Vec<Option<f64>> {
        quote
            .and_then(|q| q.get(name))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
            .unwrap_or_default()
    };
    let (opens, highs, lows, closes) = (series("open"), series("high"), series("low"), series("close"));
    let at = |values: &[Option<f64>], idx: usize| values.get(idx).copied().flatten();

    let mut bars: Vec<PriceBar> = timestamps
        .iter()
        .enumerate()
        .filter_map(|(idx, ts)| {
            let local = DateTime::from_timestamp(ts.as_i64()? + gmtoffset, 0)?;
            Some(PriceBar {
                date: local.date_naive(),
                open: at(&opens, idx)?,
                high: at(&highs, idx)?,
                low: at(&lows, idx)?,
                close: at(&closes, idx)?,
            })
        })
        .filter(|bar| window.contains(bar.date))
        .collect();

    bars.sort_by_key(|bar| bar.date);
    bars.dedup_by_key(|bar| bar.date);

    Ok(bars)
}
