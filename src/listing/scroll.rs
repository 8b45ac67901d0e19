//! スクロールによる遅延読み込みコンテンツの描画
//!
//! AwaitingMarker → LoadTimeout | Growing → Growing | Stable | AttemptsExhausted

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::RenderedPageSource;

/// スイープの終了状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// 高さが変わらなくなった
    Stable,
    /// 試行上限に到達（呼び出し側では Stable と同じ扱い）
    AttemptsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub outcome: ScrollOutcome,
    pub sweeps: u32,
    pub final_height: u64,
}

#[derive(Debug, Clone)]
pub struct ScrollController {
    step: u64,
    pause: Duration,
    settle: Duration,
    max_attempts: u32,
    marker_selector: String,
    marker_timeout: Duration,
    poll_interval: Duration,
}

impl ScrollController {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            step: config.scroll_step.max(1),
            pause: config.scroll_pause,
            settle: config.settle_pause,
            max_attempts: config.max_scroll_attempts,
            marker_selector: config.marker_selector.clone(),
            marker_timeout: config.marker_timeout,
            poll_interval: config.marker_poll_interval,
        }
    }

    /// マーカー要素（一覧テーブル）の出現を上限付きで待機
    pub async fn wait_for_marker<S>(
        &self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<(), ScraperError>
    where
        S: RenderedPageSource + ?Sized,
    {
        let start = Instant::now();
        let deadline = start + self.marker_timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }

            match source.has_marker(&self.marker_selector).await {
                Ok(true) => {
                    info!("Marker '{}' found after {:?}", self.marker_selector, start.elapsed());
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => debug!("Marker check error: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Marker '{}' not found within {:?}",
                    self.marker_selector, self.marker_timeout
                );
                return Err(ScraperError::LoadTimeout(format!(
                    "'{}' が{:?}以内に表示されませんでした",
                    self.marker_selector, self.marker_timeout
                )));
            }

            pause(self.poll_interval.min(deadline - now), cancel).await?;
        }
    }

    /// 高さが安定するか試行上限に達するまでスイープを繰り返す
    pub async fn materialize<S>(
        &self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, ScraperError>
    where
        S: RenderedPageSource + ?Sized,
    {
        let mut last_height = source.current_height().await?;
        let mut sweeps = 0;

        info!("Starting page scrolling (height={})", last_height);

        while sweeps < self.max_attempts {
            self.sweep(source, last_height, cancel).await?;
            sweeps += 1;

            // 追加コンテンツの描画待ち
            pause(self.settle, cancel).await?;

            let new_height = source.current_height().await?;
            if new_height == last_height {
                info!("Content stable after {} sweep(s) (height={})", sweeps, new_height);
                return Ok(SweepReport {
                    outcome: ScrollOutcome::Stable,
                    sweeps,
                    final_height: new_height,
                });
            }

            debug!(
                "Scroll attempt {}/{}: height {} -> {}",
                sweeps, self.max_attempts, last_height, new_height
            );
            last_height = new_height;
        }

        info!("Scroll attempts exhausted ({}), using current content", sweeps);
        Ok(SweepReport {
            outcome: ScrollOutcome::AttemptsExhausted,
            sweeps,
            final_height: last_height,
        })
    }

    /// 0 から height まで step 刻みでスクロール
    async fn sweep<S>(
        &self,
        source: &mut S,
        height: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ScraperError>
    where
        S: RenderedPageSource + ?Sized,
    {
        let mut offset = 0;
        while offset < height {
            if cancel.is_cancelled() {
                return Err(ScraperError::Cancelled);
            }
            source.trigger_scroll(offset).await?;
            pause(self.pause, cancel).await?;
            offset += self.step;
        }
        Ok(())
    }
}

/// キャンセル可能な待機
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), ScraperError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScraperError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
