use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use finance_query_core::{
    utils::financials_constants::INCOME_STATEMENT_FIELDS, YahooError, YahooFinanceClient,
};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::models::{EpsFigure, EpsLineItem, EpsSample};
use crate::service::finance::growth::growth_pct;
use crate::service::finance::retry::with_retry;
use crate::service::finance::{FinanceServiceError, FundamentalsSource};

/// Lookback for quarterly statements; two years covers the last eight quarters.
pub const QUARTERLY_LOOKBACK_YEARS: i64 = 2;

const DILUTED_EPS_FIELD: &str = "DilutedEPS";
const QUARTERLY_PREFIX: &str = "quarterly";

/// Fetch the quarterly income statement timeseries for a symbol.
///
/// Requests every income-statement line item so the returned quarter columns
/// reflect the whole statement, not just the diluted EPS row.
pub async fn fetch_quarterly_income_statement(
    client: &YahooFinanceClient,
    symbol: &str,
    years_back: i64,
) -> Result<Value, YahooError> {
    let now = Utc::now().timestamp();
    let start = now - Duration::days(365 * years_back).num_seconds();

    let mut fields: Vec<String> = INCOME_STATEMENT_FIELDS
        .iter()
        .map(|field| format!("{QUARTERLY_PREFIX}{field}"))
        .collect();
    if !INCOME_STATEMENT_FIELDS.contains(&DILUTED_EPS_FIELD) {
        fields.push(format!("{QUARTERLY_PREFIX}{DILUTED_EPS_FIELD}"));
    }
    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();

    client
        .get_fundamentals_timeseries(symbol, start, now, &refs)
        .await
}

/// Pull the two most recent quarters of diluted EPS out of a raw timeseries payload.
///
/// Quarter columns are every `asOfDate` seen on any quarterly line item. With
/// fewer than two columns the sample is absent. A missing diluted EPS row or
/// cell is substituted with zero and flagged as [`EpsLineItem::Missing`].
pub fn extract_eps_sample(data: &Value) -> EpsSample {
    let empty = Vec::new();
    let results = data
        .get("timeseries")
        .and_then(|t| t.get("result"))
        .and_then(|r| r.as_array())
        .unwrap_or(&empty);

    let mut columns: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut diluted: HashMap<NaiveDate, f64> = HashMap::new();

    for entry in results {
        let object = match entry.as_object() {
            Some(o) => o,
            None => continue,
        };

        for (field, value) in object {
            let base_field = match field.strip_prefix(QUARTERLY_PREFIX) {
                Some(rest) => rest,
                None => continue,
            };
            let items = match value.as_array() {
                Some(items) => items,
                None => continue,
            };

            for item in items {
                let Some(date) = item
                    .get("asOfDate")
                    .and_then(|d| d.as_str())
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                else {
                    continue;
                };
                columns.insert(date);

                if base_field == DILUTED_EPS_FIELD {
                    if let Some(raw) = reported_raw(item) {
                        diluted.insert(date, raw);
                    }
                }
            }
        }
    }

    let mut recent = columns.iter().rev();
    let (latest, prior) = match (recent.next(), recent.next()) {
        (Some(latest), Some(prior)) => (*latest, *prior),
        _ => return EpsSample::absent(),
    };

    let cell = |date: NaiveDate| {
        diluted
            .get(&date)
            .map_or(EpsFigure::Missing, |v| EpsFigure::Reported(*v))
    };

    eps_sample_from(cell(latest), cell(prior))
}

/// Build a sample from the latest/prior figures, zero-substituting missing ones.
pub fn eps_sample_from(latest: EpsFigure, prior: EpsFigure) -> EpsSample {
    let latest_eps = latest.value_or_zero();
    let prior_eps = prior.value_or_zero();
    let line_item = if latest.is_reported() && prior.is_reported() {
        EpsLineItem::Reported
    } else {
        EpsLineItem::Missing
    };

    EpsSample {
        latest_eps: Some(latest_eps),
        prior_eps: Some(prior_eps),
        growth_pct: Some(growth_pct(latest_eps, prior_eps)),
        line_item,
    }
}

fn reported_raw(item: &Value) -> Option<f64> {
    item.get("reportedValue")
        .and_then(|rv| rv.get("raw"))
        .and_then(|r| r.as_f64())
        .or_else(|| item.get("raw").and_then(|r| r.as_f64()))
}

/// Diluted EPS growth backed by Yahoo Finance fundamentals.
pub struct YahooFundamentals {
    client: Arc<YahooFinanceClient>,
    timeout: StdDuration,
    retry: RetryPolicy,
}

impl YahooFundamentals {
    pub fn new(client: Arc<YahooFinanceClient>, timeout: StdDuration, retry: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            retry,
        }
    }

    /// Like [`FundamentalsSource::fetch_eps_growth`] but surfaces provider failures.
    pub async fn try_fetch_eps_growth(&self, symbol: &str) -> Result<EpsSample, FinanceServiceError> {
        let data = with_retry(self.retry, "fundamentals request", || async {
            match timeout(
                self.timeout,
                fetch_quarterly_income_statement(
                    self.client.as_ref(),
                    symbol,
                    QUARTERLY_LOOKBACK_YEARS,
                ),
            )
            .await
            {
                Ok(Ok(data)) => Ok(data),
                Ok(Err(e)) => Err(FinanceServiceError::from(e)),
                Err(_) => Err(FinanceServiceError::FundamentalsUnavailable(format!(
                    "timed out after {:?}",
                    self.timeout
                ))),
            }
        })
        .await?;

        Ok(extract_eps_sample(&data))
    }
}

#[async_trait]
impl FundamentalsSource for YahooFundamentals {
    async fn fetch_eps_growth(&self, symbol: &str) -> EpsSample {
        match self.try_fetch_eps_growth(symbol).await {
            Ok(sample) => {
                info!(
                    "EPS sample for {}: latest={:?} prior={:?} growth={:?} ({:?})",
                    symbol,
                    sample.latest_eps,
                    sample.prior_eps,
                    sample.growth_pct,
                    sample.line_item
                );
                sample
            }
            Err(e) => {
                warn!("Fundamentals unavailable for {}: {}", symbol, e);
                EpsSample::absent()
            }
        }
    }
}
