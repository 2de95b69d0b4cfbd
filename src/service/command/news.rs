use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};

use crate::models::NewsItem;
use crate::service::finance::news::{DEFAULT_NEWS_ITEMS, MAX_NEWS_ITEMS, NEWS_LOOKBACK_DAYS};
use crate::service::finance::FinanceService;

use super::{get_int_opt, get_str_opt, normalize_ticker};

pub fn register_command() -> CreateCommand {
    CreateCommand::new("news")
        .description("Latest company news for a ticker")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "ticker",
                "Ticker symbol, e.g., AAPL",
            )
            .required(true),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "limit",
                "How many headlines (1-10, default 5)",
            )
            .min_int_value(1)
            .max_int_value(MAX_NEWS_ITEMS as u64),
        )
}

pub async fn handle(
    command: &CommandInteraction,
    finance: &FinanceService,
) -> Result<String, String> {
    let ticker = get_str_opt(command, "ticker").ok_or("ticker is required")?;
    let limit = get_int_opt(command, "limit")
        .map(|l| l.clamp(1, MAX_NEWS_ITEMS as i64) as usize)
        .unwrap_or(DEFAULT_NEWS_ITEMS);

    handle_text(finance, ticker, limit).await
}

pub async fn handle_text(
    finance: &FinanceService,
    ticker: &str,
    limit: usize,
) -> Result<String, String> {
    let ticker = normalize_ticker(ticker).ok_or("ticker is required")?;

    let news = finance
        .get_news(&ticker, limit)
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    Ok(format_news(&ticker, &news))
}

pub fn format_news(ticker: &str, news: &[NewsItem]) -> String {
    if news.is_empty() {
        return format!(
            "No news found for {} in the last {} days.",
            ticker, NEWS_LOOKBACK_DAYS
        );
    }

    let mut lines = vec![format!("📰 Latest news for {}", ticker)];
    for item in news {
        let date = item
            .published
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "date n/a".to_string());
        lines.push(format!("• [{}]({}) ({})", item.headline, item.url, date));
        lines.push(format!("  {}", item.summary));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn formats_headlines_with_dates() {
        let news = vec![
            NewsItem {
                headline: "ABC beats estimates".into(),
                url: "https://example.com/abc".into(),
                published: NaiveDate::from_ymd_opt(2024, 3, 15),
                summary: "Quarterly results topped forecasts.".into(),
            },
            NewsItem {
                headline: "No title".into(),
                url: "#".into(),
                published: None,
                summary: "No summary available.".into(),
            },
        ];

        let out = format_news("ABC", &news);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "📰 Latest news for ABC");
        assert_eq!(
            lines[1],
            "• [ABC beats estimates](https://example.com/abc) (2024-03-15)"
        );
        assert_eq!(lines[2], "  Quarterly results topped forecasts.");
        assert_eq!(lines[3], "• [No title](#) (date n/a)");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn empty_news_is_a_plain_reply() {
        assert_eq!(
            format_news("ABC", &[]),
            "No news found for ABC in the last 240 days."
        );
    }
}
