pub mod analysis;
pub mod earnings;
pub mod fundamentals;
pub mod news;
pub mod prices;

pub use analysis::{EarningsRow, QuarterlyAnalysisResult};
pub use earnings::EarningsRecord;
pub use fundamentals::{EpsFigure, EpsLineItem, EpsSample};
pub use news::NewsItem;
pub use prices::{PriceBar, PriceWindow};
