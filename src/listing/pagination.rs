//! ページ送りの制御

use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::RenderedPageSource;

use super::extract::{PageExtraction, RecordExtractor};
use super::scroll::{pause, ScrollController};
use super::types::{PaginationOutcome, StopReason};

/// 1ページ処理の結果
enum PageStep {
    Extracted(PageExtraction),
    Stop(StopReason),
}

pub struct PaginationDriver {
    config: ScraperConfig,
    scroll: ScrollController,
    extractor: RecordExtractor,
}

impl PaginationDriver {
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        config.validate()?;
        let scroll = ScrollController::new(&config);
        let extractor = RecordExtractor::new(&config.marker_selector)?;
        Ok(Self {
            config,
            scroll,
            extractor,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// 1..=max_pages を順に処理する。ページ単位の失敗は早期終了として扱い、エラーは返さない
    pub async fn run<S>(&self, source: &mut S, cancel: &CancellationToken) -> PaginationOutcome
    where
        S: RenderedPageSource + ?Sized,
    {
        let mut records = Vec::new();
        let mut pages_visited = 0;
        let mut stop_reason = StopReason::MaxPagesReached;

        for page in 1..=self.config.max_pages {
            if cancel.is_cancelled() {
                info!("Cancelled before page {}", page);
                stop_reason = StopReason::Cancelled { page };
                break;
            }

            match self.scrape_page(source, page, cancel).await {
                PageStep::Extracted(extraction) => {
                    pages_visited += 1;
                    info!(
                        "{} listings scraped from page {} ({} rows skipped)",
                        extraction.records.len(),
                        page,
                        extraction.skipped.len()
                    );

                    if extraction.records.is_empty() {
                        info!("No more data found on page {}, stopping", page);
                        stop_reason = StopReason::EmptyPage {
                            page,
                            table_found: extraction.table_found,
                        };
                        break;
                    }
                    records.extend(extraction.records);
                }
                PageStep::Stop(reason) => {
                    stop_reason = reason;
                    break;
                }
            }
        }

        info!(
            "Finished scraping {} listings from {} page(s): {:?}",
            records.len(),
            pages_visited,
            stop_reason
        );

        PaginationOutcome {
            records,
            pages_visited,
            stop_reason,
        }
    }

    async fn scrape_page<S>(&self, source: &mut S, page: u32, cancel: &CancellationToken) -> PageStep
    where
        S: RenderedPageSource + ?Sized,
    {
        let result = self.materialize_page(source, page, cancel).await;

        match result {
            Ok(html) => PageStep::Extracted(self.extractor.extract(&html)),
            Err(ScraperError::Cancelled) => {
                info!("Cancelled while loading page {}", page);
                PageStep::Stop(StopReason::Cancelled { page })
            }
            Err(ScraperError::LoadTimeout(message)) => {
                warn!("Timeout waiting for page {}: {}", page, message);
                self.dump_screenshot(source, page).await;
                PageStep::Stop(StopReason::LoadTimeout { page })
            }
            Err(e) => {
                warn!("Page {} failed, keeping partial result: {}", page, e);
                PageStep::Stop(StopReason::PageFailed {
                    page,
                    message: e.to_string(),
                })
            }
        }
    }

    /// 遷移 → マーカー待ち → スイープ → HTML取得
    async fn materialize_page<S>(
        &self,
        source: &mut S,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<String, ScraperError>
    where
        S: RenderedPageSource + ?Sized,
    {
        let url = self.config.page_url(page)?;
        info!("Navigating to {}", url);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScraperError::Cancelled),
            result = source.open(&url) => result?,
        }

        pause(self.config.navigation_settle, cancel).await?;

        self.scroll.wait_for_marker(source, cancel).await?;
        let report = self.scroll.materialize(source, cancel).await?;
        debug!("Page {} sweep report: {:?}", page, report);

        source.content().await
    }

    async fn dump_screenshot<S>(&self, source: &mut S, page: u32)
    where
        S: RenderedPageSource + ?Sized,
    {
        if !self.config.debug {
            return;
        }
        match source.screenshot().await {
            Ok(Some(png)) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
                debug!("Timeout screenshot (page {}): data:image/png;base64,{}", page, encoded);
            }
            Ok(None) => {}
            Err(e) => debug!("Failed to capture screenshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::listing::testing::{FakePage, FakePageSource};

    fn page_html(first_rank: u32, count: u32) -> String {
        let rows: String = (first_rank..first_rank + count)
            .map(|rank| {
                format!(
                    "<tr><td></td><td>{rank}</td><td>Coin{rank}</td><td>$1</td><td>1%</td>\
                     <td>2%</td><td>3%</td><td>$9</td><td>$8</td><td>7 C</td></tr>"
                )
            })
            .collect();
        format!(
            "<table class=\"cmc-table\"><tr><th>#</th></tr>{}</table>",
            rows
        )
    }

    fn driver(max_pages: u32) -> PaginationDriver {
        let config = ScraperConfig::new("https://example.com/")
            .with_max_pages(max_pages)
            .with_scroll(300, Duration::ZERO, 2)
            .with_settle_pause(Duration::ZERO)
            .with_marker_timeout(Duration::from_secs(1))
            .with_navigation_settle(Duration::ZERO);
        PaginationDriver::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_all_pages_concatenated_in_order() {
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 3)),
            FakePage::with_html(page_html(4, 2)),
        ]);
        let outcome = driver(2).run(&mut source, &CancellationToken::new()).await;

        let ranks: Vec<_> = outcome.records.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        assert_eq!(outcome.pages_visited, 2);
        assert_eq!(outcome.stop_reason, StopReason::MaxPagesReached);
        assert_eq!(
            source.opened,
            vec!["https://example.com/?page=1", "https://example.com/?page=2"]
        );
    }

    #[tokio::test]
    async fn test_empty_page_stops_early() {
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 2)),
            FakePage::with_html(page_html(3, 2)),
            FakePage::with_html(page_html(5, 0)),
            FakePage::with_html(page_html(5, 2)),
            FakePage::with_html(page_html(7, 2)),
        ]);
        let outcome = driver(5).run(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.records.last().unwrap().rank, Some(4));
        assert_eq!(outcome.pages_visited, 3);
        assert_eq!(
            outcome.stop_reason,
            StopReason::EmptyPage {
                page: 3,
                table_found: true
            }
        );
        assert_eq!(source.opened.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_table_is_treated_as_end_of_data() {
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 2)),
            FakePage::with_html("<html><body>no table</body></html>"),
        ]);
        let outcome = driver(3).run(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(
            outcome.stop_reason,
            StopReason::EmptyPage {
                page: 2,
                table_found: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_first_page() {
        let mut source = FakePageSource::new(vec![FakePage::never_loads()]);
        let outcome = driver(5).run(&mut source, &CancellationToken::new()).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.pages_visited, 0);
        assert_eq!(outcome.stop_reason, StopReason::LoadTimeout { page: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_earlier_pages() {
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 2)),
            FakePage::never_loads(),
        ]);
        let outcome = driver(5).run(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.pages_visited, 1);
        assert_eq!(outcome.stop_reason, StopReason::LoadTimeout { page: 2 });
    }

    #[tokio::test]
    async fn test_navigation_error_is_early_stop() {
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 2)),
            FakePage::failing_open(),
        ]);
        let outcome = driver(5).run(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome.records.len(), 2);
        assert!(matches!(
            outcome.stop_reason,
            StopReason::PageFailed { page: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = FakePageSource::new(vec![FakePage::with_html(page_html(1, 2))]);
        let outcome = driver(5).run(&mut source, &cancel).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stop_reason, StopReason::Cancelled { page: 1 });
        assert!(source.opened.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_gathered_records() {
        let cancel = CancellationToken::new();
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 3)),
            FakePage::with_html(page_html(4, 3)),
        ])
        .cancel_when_opening(2, cancel.clone());
        let outcome = driver(5).run(&mut source, &cancel).await;

        let ranks: Vec<_> = outcome.records.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(outcome.pages_visited, 1);
        assert_eq!(outcome.stop_reason, StopReason::Cancelled { page: 2 });
        assert_eq!(source.opened.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_slow_navigation() {
        let cancel = CancellationToken::new();
        let mut source = FakePageSource::new(vec![
            FakePage::with_html(page_html(1, 2)).slow_open(Duration::from_secs(60)),
        ]);

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let start = tokio::time::Instant::now();
        let outcome = driver(3).run(&mut source, &cancel).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stop_reason, StopReason::Cancelled { page: 1 });
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ScraperConfig::default().with_max_pages(0);
        assert!(matches!(
            PaginationDriver::new(config),
            Err(ScraperError::Config(_))
        ));
    }
}
