use serenity::all::CreateAttachment;

use crate::service::finance::news::DEFAULT_NEWS_ITEMS;
use crate::service::finance::FinanceService;

use super::{news, quarterly};

pub const CHART_FILENAME: &str = "quarterly-chart.png";

pub struct MentionResponse {
    pub content: String,
    pub attachment: Option<CreateAttachment>,
}

/// A mention command after the bot prefix has been stripped.
#[derive(Debug, PartialEq, Eq)]
pub enum MentionCommand<'a> {
    Quarterly { ticker: &'a str },
    News { ticker: &'a str, limit: usize },
}

pub fn parse(text: &str) -> Result<MentionCommand<'_>, String> {
    let mut parts = text.split_whitespace();
    let cmd = parts
        .next()
        .ok_or_else(|| "No command provided. Try: ".to_string() + help_text())?
        .to_ascii_lowercase();

    match cmd.as_str() {
        "quarterly" => {
            let ticker = parts.next().ok_or("ticker required, e.g., quarterly AAPL")?;
            Ok(MentionCommand::Quarterly { ticker })
        }
        "news" => {
            let ticker = parts.next().ok_or("ticker required, e.g., news AAPL 3")?;
            let limit = parts
                .next()
                .map(|raw| raw.parse::<usize>())
                .transpose()
                .map_err(|e| format!("invalid limit: {e}"))?
                .unwrap_or(DEFAULT_NEWS_ITEMS);
            Ok(MentionCommand::News { ticker, limit })
        }
        _ => Err(format!("Unknown command: {}. {}", cmd, help_text())),
    }
}

pub async fn handle(text: &str, finance: &FinanceService) -> Result<MentionResponse, String> {
    match parse(text)? {
        MentionCommand::Quarterly { ticker } => {
            let resp = quarterly::handle_text(finance, ticker).await?;
            Ok(MentionResponse {
                content: resp.content,
                attachment: resp
                    .image
                    .map(|bytes| CreateAttachment::bytes(bytes, CHART_FILENAME)),
            })
        }
        MentionCommand::News { ticker, limit } => {
            let content = news::handle_text(finance, ticker, limit).await?;
            Ok(MentionResponse {
                content,
                attachment: None,
            })
        }
    }
}

pub fn help_text() -> &'static str {
    "Usage: @Bot quarterly TICKER | news TICKER [LIMIT]"
}
