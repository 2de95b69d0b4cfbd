use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::Barrier;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quarterly_bot::config::RetryPolicy;
use quarterly_bot::models::{
    EarningsRecord, EpsFigure, EpsLineItem, EpsSample, PriceBar, PriceWindow,
    QuarterlyAnalysisResult,
};
use quarterly_bot::service::analysis::{AnalysisContext, QuarterlyAnalyzer};
use quarterly_bot::service::finance::fundamentals::eps_sample_from;
use quarterly_bot::service::finance::{
    EarningsFeed, FinanceServiceError, FinnhubClient, FundamentalsSource, PriceHistorySource,
    YahooPriceHistory,
};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

struct StaticFeed(Result<Vec<EarningsRecord>, String>);

#[async_trait]
impl EarningsFeed for StaticFeed {
    async fn fetch_recent_earnings_as_of(
        &self,
        _today: NaiveDate,
    ) -> Result<Vec<EarningsRecord>, FinanceServiceError> {
        self.0
            .clone()
            .map_err(FinanceServiceError::FeedUnavailable)
    }
}

#[derive(Default)]
struct FixedEps {
    sample: EpsSample,
    calls: AtomicUsize,
    barrier: Option<Arc<Barrier>>,
}

#[async_trait]
impl FundamentalsSource for FixedEps {
    async fn fetch_eps_growth(&self, _symbol: &str) -> EpsSample {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        self.sample
    }
}

/// Serves one synthetic bar per day of the requested window.
#[derive(Default)]
struct DailyBars {
    calls: AtomicUsize,
    barrier: Option<Arc<Barrier>>,
}

#[async_trait]
impl PriceHistorySource for DailyBars {
    async fn fetch_price_window(&self, _symbol: &str, release_date: NaiveDate) -> Vec<PriceBar> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        let window = PriceWindow::around(release_date);
        window
            .start
            .iter_days()
            .take_while(|day| *day <= window.end)
            .map(|date| PriceBar {
                date,
                open: 10.0,
                high: 11.0,
                low: 9.5,
                close: 10.5,
            })
            .collect()
    }
}

fn abc_feed() -> Arc<StaticFeed> {
    Arc::new(StaticFeed(Ok(vec![
        EarningsRecord {
            symbol: "XYZ".into(),
            release_date: d("2024-02-20"),
        },
        EarningsRecord {
            symbol: "ABC".into(),
            release_date: d("2024-03-15"),
        },
    ])))
}

#[tokio::test]
async fn joins_release_eps_and_price_window() {
    let fundamentals = Arc::new(FixedEps {
        sample: eps_sample_from(EpsFigure::Reported(2.0), EpsFigure::Reported(1.5)),
        ..Default::default()
    });
    let prices = Arc::new(DailyBars::default());
    let analyzer = QuarterlyAnalyzer::new(abc_feed(), fundamentals.clone(), prices.clone());

    let result = analyzer
        .analyze_in(&AnalysisContext::on(d("2024-04-01")), "ABC")
        .await;

    assert_eq!(result.symbol, "ABC");
    assert_eq!(result.release_date, Some(d("2024-03-15")));
    assert_eq!(result.eps_sample.latest_eps, Some(2.0));
    assert_eq!(result.eps_sample.line_item, EpsLineItem::Reported);
    let growth = result.eps_sample.growth_pct.unwrap();
    assert!((growth - 100.0 / 3.0).abs() < 1e-9, "growth {growth}");

    assert_eq!(result.price_bars.first().map(|b| b.date), Some(d("2024-02-14")));
    assert_eq!(result.price_bars.last().map(|b| b.date), Some(d("2024-04-14")));
    assert!(result.price_bars.windows(2).all(|w| w[0].date < w[1].date));

    let row = result.table_row().unwrap();
    assert_eq!(row.latest_eps, Some(2.0));
    assert_eq!(fundamentals.calls.load(Ordering::SeqCst), 1);
    assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_prior_eps_grows_by_latest_times_hundred() {
    let fundamentals = Arc::new(FixedEps {
        sample: eps_sample_from(EpsFigure::Reported(-1.0), EpsFigure::Reported(0.0)),
        ..Default::default()
    });
    let analyzer = QuarterlyAnalyzer::new(abc_feed(), fundamentals, Arc::new(DailyBars::default()));

    let result = analyzer
        .analyze_in(&AnalysisContext::on(d("2024-04-01")), "ABC")
        .await;
    assert_eq!(result.eps_sample.growth_pct, Some(-100.0));
}

#[tokio::test]
async fn ticker_without_release_is_empty_and_skips_providers() {
    let fundamentals = Arc::new(FixedEps::default());
    let prices = Arc::new(DailyBars::default());
    let analyzer = QuarterlyAnalyzer::new(abc_feed(), fundamentals.clone(), prices.clone());

    let result = analyzer
        .analyze_in(&AnalysisContext::on(d("2024-04-01")), "ZZZZ")
        .await;

    assert_eq!(result, QuarterlyAnalysisResult::empty("ZZZZ"));
    assert!(result.is_empty());
    assert_eq!(fundamentals.calls.load(Ordering::SeqCst), 0);
    assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn feed_failure_reads_as_no_release() {
    let feed = Arc::new(StaticFeed(Err("calendar down".into())));
    let analyzer = QuarterlyAnalyzer::new(
        feed,
        Arc::new(FixedEps::default()),
        Arc::new(DailyBars::default()),
    );

    let result = analyzer
        .analyze_in(&AnalysisContext::on(d("2024-04-01")), "ABC")
        .await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn eps_and_prices_are_fetched_concurrently() {
    // Each source blocks until the other has started; sequential calls would hang.
    let barrier = Arc::new(Barrier::new(2));
    let fundamentals = Arc::new(FixedEps {
        sample: eps_sample_from(EpsFigure::Reported(1.0), EpsFigure::Reported(1.0)),
        barrier: Some(barrier.clone()),
        ..Default::default()
    });
    let prices = Arc::new(DailyBars {
        barrier: Some(barrier),
        ..Default::default()
    });
    let analyzer = QuarterlyAnalyzer::new(abc_feed(), fundamentals, prices);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        analyzer.analyze_in(&AnalysisContext::on(d("2024-04-01")), "ABC"),
    )
    .await
    .expect("fetches should run concurrently");

    assert_eq!(result.eps_sample.growth_pct, Some(0.0));
    assert!(!result.price_bars.is_empty());
}

#[tokio::test]
async fn end_to_end_with_http_providers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/earnings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "earningsCalendar": [
                {"symbol": "OLD", "date": "2023-11-01"},
                {"symbol": "ABC", "date": "2024-03-15"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "ABC", "gmtoffset": -14400},
                    "timestamp": [1_710_509_400],
                    "indicators": {"quote": [{
                        "open": [10.0], "high": [12.0], "low": [9.0], "close": [11.0]
                    }]}
                }],
                "error": null
            }
        })))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let feed = Arc::new(FinnhubClient::new(
        http.clone(),
        &server.uri(),
        "test-key",
        RetryPolicy::single_shot(),
    ));
    let prices = Arc::new(YahooPriceHistory::new(
        http,
        &format!("{}/v8/finance/chart", server.uri()),
        RetryPolicy::single_shot(),
    ));
    let fundamentals = Arc::new(FixedEps {
        sample: eps_sample_from(EpsFigure::Reported(2.0), EpsFigure::Reported(1.5)),
        ..Default::default()
    });
    let analyzer = QuarterlyAnalyzer::new(feed, fundamentals, prices);
    let ctx = AnalysisContext::on(d("2024-04-01"));

    let abc = analyzer.analyze_in(&ctx, "ABC").await;
    assert_eq!(abc.release_date, Some(d("2024-03-15")));
    assert_eq!(abc.price_bars.len(), 1);
    assert_eq!(abc.price_bars[0].date, d("2024-03-15"));

    // Released more than 90 days before `today`.
    let old = analyzer.analyze_in(&ctx, "OLD").await;
    assert!(old.is_empty());
}
