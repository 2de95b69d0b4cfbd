use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A company's earnings release as reported by the earnings calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub symbol: String,
    pub release_date: NaiveDate,
}
