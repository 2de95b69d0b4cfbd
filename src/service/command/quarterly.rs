use chrono::NaiveDate;
use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};
use tracing::{info, warn};

use crate::models::{EarningsRow, EpsLineItem, PriceBar, QuarterlyAnalysisResult};
use crate::service::chart::render_candlestick;
use crate::service::finance::FinanceService;

use super::{get_str_opt, normalize_ticker};

/// Response payload for the /quarterly command.
pub struct QuarterlyResponse {
    pub content: String,
    pub image: Option<Vec<u8>>,
}

pub fn register_command() -> CreateCommand {
    CreateCommand::new("quarterly")
        .description("Latest earnings release, EPS growth and price action around it")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "ticker",
                "Ticker symbol, e.g., AAPL",
            )
            .required(true),
        )
}

pub async fn handle(
    command: &CommandInteraction,
    finance: &FinanceService,
) -> Result<QuarterlyResponse, String> {
    let ticker = get_str_opt(command, "ticker").ok_or("ticker is required")?;
    build_response(finance, ticker).await
}

pub async fn handle_text(finance: &FinanceService, ticker: &str) -> Result<QuarterlyResponse, String> {
    build_response(finance, ticker).await
}

async fn build_response(finance: &FinanceService, raw_ticker: &str) -> Result<QuarterlyResponse, String> {
    let ticker = normalize_ticker(raw_ticker).ok_or("ticker is required")?;
    info!("Running quarterly analysis for {}", ticker);

    let result = finance.analyze_quarter(&ticker).await;

    let image = match result.release_date {
        Some(release_date) => render_chart(&result.symbol, release_date, &result.price_bars).await,
        None => None,
    };

    Ok(QuarterlyResponse {
        content: format_output(&result, image.is_some()),
        image,
    })
}

/// Render the candlestick PNG on the blocking pool; failures only drop the chart.
async fn render_chart(symbol: &str, release_date: NaiveDate, bars: &[PriceBar]) -> Option<Vec<u8>> {
    if bars.is_empty() {
        return None;
    }

    let owned_symbol = symbol.to_string();
    let owned_bars = bars.to_vec();
    let rendered = tokio::task::spawn_blocking(move || {
        render_candlestick(&owned_symbol, release_date, &owned_bars)
    })
    .await;

    match rendered {
        Ok(Ok(image)) => image,
        Ok(Err(e)) => {
            warn!("Candlestick render failed for {}: {}", symbol, e);
            None
        }
        Err(e) => {
            warn!("Candlestick render task failed for {}: {}", symbol, e);
            None
        }
    }
}

/// Text body: the one-row earnings table plus notes about missing pieces.
pub fn format_output(result: &QuarterlyAnalysisResult, has_chart: bool) -> String {
    let Some(row) = result.table_row() else {
        return format!(
            "No earnings release for {} in the last 90 days.",
            result.symbol
        );
    };

    let mut lines = vec![
        format!("📊 **Quarterly Earnings Report: {}**", row.symbol),
        format_table(&row),
    ];

    match result.eps_sample.line_item {
        EpsLineItem::Reported => {}
        EpsLineItem::Missing => lines.push(
            "⚠️ Diluted EPS was not reported for both quarters; missing values count as 0."
                .to_string(),
        ),
        EpsLineItem::Unavailable => {
            lines.push("⚠️ EPS data unavailable for the last two quarters.".to_string())
        }
    }

    if !has_chart {
        lines.push(format!(
            "No price data for {} around {}.",
            row.symbol,
            row.release_date.format("%Y-%m-%d")
        ));
    }

    lines.join("\n")
}

pub fn format_table(row: &EarningsRow) -> String {
    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".into());

    let headers = ["Stock Symbol", "Release Date", "Latest EPS", "EPS Growth (%)"];
    let values = [
        row.symbol.clone(),
        row.release_date.format("%Y-%m-%d").to_string(),
        fmt(row.latest_eps),
        fmt(row.eps_growth_pct),
    ];
    let widths: Vec<usize> = headers
        .iter()
        .zip(values.iter())
        .map(|(h, v)| h.len().max(v.len()))
        .collect();

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{c:<width$}", width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    format!(
        "```\n{}\n{}\n```",
        line(headers.to_vec()),
        line(values.iter().map(String::as_str).collect())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EpsSample;

    fn result_with(eps: EpsSample, bars: Vec<PriceBar>) -> QuarterlyAnalysisResult {
        QuarterlyAnalysisResult {
            symbol: "ABC".into(),
            release_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            eps_sample: eps,
            price_bars: bars,
        }
    }

    #[test]
    fn empty_result_says_no_release() {
        let out = format_output(&QuarterlyAnalysisResult::empty("ZZZZ"), false);
        assert_eq!(out, "No earnings release for ZZZZ in the last 90 days.");
    }

    #[test]
    fn table_has_one_row_with_two_decimals() {
        let eps = EpsSample {
            latest_eps: Some(2.0),
            prior_eps: Some(1.5),
            growth_pct: Some(100.0 / 3.0),
            line_item: EpsLineItem::Reported,
        };
        let out = format_output(&result_with(eps, Vec::new()), true);
        assert!(out.contains("Stock Symbol | Release Date | Latest EPS | EPS Growth (%)"));
        assert!(out.contains("ABC          | 2024-03-15   | 2.00       | 33.33"));
        assert!(!out.contains("⚠️"));
        assert!(!out.contains("No price data"));
    }

    #[tokio::test]
    async fn renders_chart_off_the_async_worker() {
        let release = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let bars = vec![PriceBar {
            date: release,
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
        }];

        let png = render_chart("ABC", release, &bars).await.unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(render_chart("ABC", release, &[]).await.is_none());
    }

    #[test]
    fn notes_missing_pieces() {
        let out = format_output(&result_with(EpsSample::absent(), Vec::new()), false);
        assert!(out.contains("n/a"));
        assert!(out.contains("EPS data unavailable"));
        assert!(out.contains("No price data for ABC around 2024-03-15."));
    }
}
