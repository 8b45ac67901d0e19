//! セッション単位でのパイプライン実行

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::RenderedPageSource;

use super::browser::ChromiumPageSource;
use super::pagination::PaginationDriver;
use super::types::Batch;

pub struct ListingPipeline {
    driver: PaginationDriver,
}

impl ListingPipeline {
    /// 設定を検証してパイプラインを作成
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        Ok(Self {
            driver: PaginationDriver::new(config)?,
        })
    }

    /// ブラウザを起動して全ページを取得する
    ///
    /// セッションが起動できない場合のみ `ScraperError::SessionStart` を返す。
    /// それ以外の失敗は部分的なバッチとして返る。
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Batch, ScraperError> {
        let mut source = ChromiumPageSource::launch(self.driver.config()).await?;
        Ok(self.run_with_source(&mut source, cancel).await)
    }

    /// 既存のページソースで実行し、終了時に必ず close する
    pub async fn run_with_source<S>(&self, source: &mut S, cancel: &CancellationToken) -> Batch
    where
        S: RenderedPageSource + ?Sized,
    {
        let outcome = self.driver.run(source, cancel).await;

        if let Err(e) = source.close().await {
            warn!("Failed to close page source: {}", e);
        }

        let batch = Batch::new(outcome);
        info!(
            "Batch captured at {}: {} listings, {} page(s), stop={:?}",
            batch.captured_at,
            batch.len(),
            batch.pages_visited,
            batch.stop_reason
        );
        batch
    }
}
