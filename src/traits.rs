use async_trait::async_trait;

use crate::error::ScraperError;
use crate::listing::Batch;

/// 描画済みページの供給元（1つのブラウザセッションを全ページで使い回す）
#[async_trait]
pub trait RenderedPageSource: Send {
    /// 同じセッションで指定URLへ遷移
    async fn open(&mut self, url: &str) -> Result<(), ScraperError>;

    /// マーカー要素が現在のドキュメントに存在するか
    async fn has_marker(&mut self, selector: &str) -> Result<bool, ScraperError>;

    /// ドキュメント全体の高さ
    async fn current_height(&mut self) -> Result<u64, ScraperError>;

    async fn trigger_scroll(&mut self, offset: u64) -> Result<(), ScraperError>;

    /// 現時点で描画されているHTML
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// デバッグ用スクリーンショット（PNG）。対応しない実装は None
    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, ScraperError> {
        Ok(None)
    }

    /// セッション解放
    async fn close(&mut self) -> Result<(), ScraperError>;
}

/// スナップショットの永続化先
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn ensure_schema(&self) -> Result<(), ScraperError>;

    /// バッチ全体を1トランザクションで保存し、挿入件数を返す
    async fn append_batch(&self, batch: &Batch) -> Result<u64, ScraperError>;
}
