use serde::{Deserialize, Serialize};

/// A single diluted EPS cell from the income statement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EpsFigure {
    Reported(f64),
    Missing,
}

impl EpsFigure {
    /// Missing cells count as zero in the published growth figure.
    pub fn value_or_zero(self) -> f64 {
        match self {
            EpsFigure::Reported(v) => v,
            EpsFigure::Missing => 0.0,
        }
    }

    pub fn is_reported(self) -> bool {
        matches!(self, EpsFigure::Reported(_))
    }
}

/// Where the figures of an [`EpsSample`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpsLineItem {
    /// Both quarters carried a reported diluted EPS value.
    Reported,
    /// The diluted EPS line (or one of its cells) was missing; zeros were substituted.
    Missing,
    /// No usable statement: provider failure or fewer than two quarters.
    Unavailable,
}

/// Latest/prior diluted EPS and the quarter-over-quarter growth between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsSample {
    pub latest_eps: Option<f64>,
    pub prior_eps: Option<f64>,
    pub growth_pct: Option<f64>,
    pub line_item: EpsLineItem,
}

impl EpsSample {
    pub fn absent() -> Self {
        Self {
            latest_eps: None,
            prior_eps: None,
            growth_pct: None,
            line_item: EpsLineItem::Unavailable,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.latest_eps.is_none() && self.prior_eps.is_none() && self.growth_pct.is_none()
    }
}

impl Default for EpsSample {
    fn default() -> Self {
        Self::absent()
    }
}
