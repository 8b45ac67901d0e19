//! テスト用のスクリプト駆動ページソース

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::traits::RenderedPageSource;

/// 1ページ分の振る舞い
#[derive(Debug, Clone)]
pub struct FakePage {
    /// 何回目の確認でマーカーが見えるか（None なら現れない）
    pub marker_after: Option<usize>,
    /// current_height の返却列（末尾を繰り返す）
    pub heights: Vec<u64>,
    pub html: String,
    pub fail_open: bool,
    /// open が戻るまでの遅延
    pub open_delay: Option<Duration>,
}

impl FakePage {
    pub fn with_html(html: impl Into<String>) -> Self {
        Self {
            marker_after: Some(0),
            heights: vec![1000],
            html: html.into(),
            fail_open: false,
            open_delay: None,
        }
    }

    pub fn never_loads() -> Self {
        Self {
            marker_after: None,
            ..Self::with_html("")
        }
    }

    pub fn heights(mut self, heights: Vec<u64>) -> Self {
        self.heights = heights;
        self
    }

    pub fn slow_open(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::with_html("")
        }
    }
}

#[derive(Debug, Default)]
pub struct FakePageSource {
    pages: VecDeque<FakePage>,
    current: Option<FakePage>,
    marker_checks: usize,
    height_reads: usize,
    cancel_on_open: Option<(usize, CancellationToken)>,
    pub opened: Vec<String>,
    pub scroll_offsets: Vec<u64>,
    pub close_calls: usize,
}

impl FakePageSource {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages: pages.into(),
            ..Default::default()
        }
    }

    /// 指定ページだけを開いた状態で作成
    pub fn opened_with(page: FakePage) -> Self {
        Self {
            current: Some(page),
            ..Default::default()
        }
    }

    /// nth 回目の open でトークンをキャンセルする（ページ自体は通常どおり読み込む）
    pub fn cancel_when_opening(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_open = Some((nth, token));
        self
    }
}

#[async_trait]
impl RenderedPageSource for FakePageSource {
    async fn open(&mut self, url: &str) -> Result<(), ScraperError> {
        self.opened.push(url.to_string());
        if let Some((nth, token)) = &self.cancel_on_open {
            if self.opened.len() == *nth {
                token.cancel();
            }
        }
        let page = self.pages.pop_front().unwrap_or_else(FakePage::never_loads);
        if let Some(delay) = page.open_delay {
            tokio::time::sleep(delay).await;
        }
        if page.fail_open {
            return Err(ScraperError::Navigation(format!("connection reset: {}", url)));
        }
        self.current = Some(page);
        self.marker_checks = 0;
        self.height_reads = 0;
        Ok(())
    }

    async fn has_marker(&mut self, _selector: &str) -> Result<bool, ScraperError> {
        let checks = self.marker_checks;
        self.marker_checks += 1;
        Ok(self
            .current
            .as_ref()
            .and_then(|p| p.marker_after)
            .map(|after| checks >= after)
            .unwrap_or(false))
    }

    async fn current_height(&mut self) -> Result<u64, ScraperError> {
        let page = self
            .current
            .as_ref()
            .ok_or_else(|| ScraperError::Navigation("no page".into()))?;
        let index = self.height_reads.min(page.heights.len().saturating_sub(1));
        self.height_reads += 1;
        Ok(page.heights.get(index).copied().unwrap_or(0))
    }

    async fn trigger_scroll(&mut self, offset: u64) -> Result<(), ScraperError> {
        self.scroll_offsets.push(offset);
        Ok(())
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        Ok(self
            .current
            .as_ref()
            .map(|p| p.html.clone())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.close_calls += 1;
        Ok(())
    }
}
