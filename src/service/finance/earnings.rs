use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::models::EarningsRecord;
use crate::service::finance::retry::with_retry;
use crate::service::finance::{EarningsFeed, FinanceServiceError};

/// Releases older than this many days are dropped from the calendar.
pub const RECENT_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(default, rename = "earningsCalendar")]
    earnings_calendar: Option<Vec<CalendarEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CalendarEntry {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Finnhub REST client (earnings calendar and company news).
pub struct FinnhubClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl FinnhubClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry,
        }
    }

    /// GET `{base_url}{path}` with the API token appended and return the raw body.
    pub(super) async fn get_bytes(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<u8>, String> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| format!("request to {path} failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unable to read body".to_string());
            return Err(format!("{path} status {status}: {body}"));
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| format!("{path} body read failed: {e}"))
    }

    pub(super) fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn fetch_calendar(&self) -> Result<Vec<CalendarEntry>, FinanceServiceError> {
        info!("Fetching earnings calendar from Finnhub");

        let raw = with_retry(self.retry, "earnings calendar request", || {
            self.get_bytes("/calendar/earnings", &[])
        })
        .await
        .map_err(|e| {
            warn!("Earnings calendar request failed: {}", e);
            FinanceServiceError::FeedUnavailable(e)
        })?;

        let entries = parse_calendar(&raw)?;
        info!("Earnings calendar returned {} entries", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl EarningsFeed for FinnhubClient {
    async fn fetch_recent_earnings_as_of(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<EarningsRecord>, FinanceServiceError> {
        let entries = self.fetch_calendar().await?;
        let records = retain_recent(entries, today);
        info!(
            "Kept {} earnings releases after {}",
            records.len(),
            cutoff_date(today)
        );
        Ok(records)
    }
}

fn parse_calendar(raw: &[u8]) -> Result<Vec<CalendarEntry>, FinanceServiceError> {
    let parsed: CalendarResponse = serde_json::from_slice(raw).map_err(|e| {
        let preview = String::from_utf8_lossy(&raw[..raw.len().min(500)]);
        warn!(
            "Failed to parse earnings calendar: {}; body preview: {}",
            e, preview
        );
        FinanceServiceError::FeedUnavailable(format!("earnings parse failed: {e}"))
    })?;

    Ok(parsed.earnings_calendar.unwrap_or_default())
}

fn cutoff_date(today: NaiveDate) -> NaiveDate {
    today - Duration::days(RECENT_WINDOW_DAYS)
}

/// Keep entries with a symbol and a `%Y-%m-%d` date strictly after `today - 90d`.
fn retain_recent(entries: Vec<CalendarEntry>, today: NaiveDate) -> Vec<EarningsRecord> {
    let cutoff = cutoff_date(today);

    entries
        .into_iter()
        .filter_map(|entry| {
            let symbol = entry.symbol?;
            let release_date = NaiveDate::parse_from_str(entry.date.as_deref()?, "%Y-%m-%d").ok()?;
            (release_date > cutoff).then_some(EarningsRecord {
                symbol,
                release_date,
            })
        })
        .collect()
}

/// Linear scan for the first release matching `symbol` exactly.
pub fn find_release<'a>(records: &'a [EarningsRecord], symbol: &str) -> Option<&'a EarningsRecord> {
    records.iter().find(|r| r.symbol == symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(symbol: Option<&str>, date: Option<&str>) -> CalendarEntry {
        CalendarEntry {
            symbol: symbol.map(str::to_string),
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn keeps_dates_strictly_after_cutoff_without_upper_bound() {
        let today = d("2024-06-01");
        // cutoff = 2024-03-03
        let entries = vec![
            entry(Some("OLD"), Some("2024-03-03")),
            entry(Some("EDGE"), Some("2024-03-04")),
            entry(Some("NOW"), Some("2024-06-01")),
            entry(Some("FUT"), Some("2025-01-15")),
        ];

        let kept = retain_recent(entries, today);
        let symbols: Vec<&str> = kept.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EDGE", "NOW", "FUT"]);
        assert!(kept.iter().all(|r| r.release_date > today - Duration::days(90)));
    }

    #[test]
    fn drops_entries_without_parseable_date_or_symbol() {
        let today = d("2024-06-01");
        let entries = vec![
            entry(Some("NODATE"), None),
            entry(Some("BAD"), Some("06/01/2024")),
            entry(None, Some("2024-05-30")),
            entry(Some("OK"), Some("2024-05-30")),
        ];

        let kept = retain_recent(entries, today);
        assert_eq!(
            kept,
            vec![EarningsRecord {
                symbol: "OK".into(),
                release_date: d("2024-05-30"),
            }]
        );
    }

    #[test]
    fn parses_calendar_and_tolerates_missing_key() {
        let body = br#"{"earningsCalendar":[{"symbol":"ABC","date":"2024-03-15","hour":"amc","epsEstimate":1.2}]}"#;
        let entries = parse_calendar(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbol.as_deref(), Some("ABC"));

        assert!(parse_calendar(b"{}").unwrap().is_empty());
        assert!(parse_calendar(br#"{"earningsCalendar":null}"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_calendar_is_feed_unavailable() {
        let err = parse_calendar(b"<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, FinanceServiceError::FeedUnavailable(_)));

        let err = parse_calendar(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, FinanceServiceError::FeedUnavailable(_)));
    }

    #[test]
    fn find_release_takes_first_exact_match() {
        let records = vec![
            EarningsRecord {
                symbol: "ABC".into(),
                release_date: d("2024-03-15"),
            },
            EarningsRecord {
                symbol: "ABC".into(),
                release_date: d("2024-06-15"),
            },
        ];
        assert_eq!(
            find_release(&records, "ABC").map(|r| r.release_date),
            Some(d("2024-03-15"))
        );
        assert!(find_release(&records, "abc").is_none());
        assert!(find_release(&records, "ZZZZ").is_none());
    }
}
