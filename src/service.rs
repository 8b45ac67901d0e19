use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::export;
use crate::listing::{Batch, ListingPipeline};
use crate::traits::SnapshotStore;

/// スナップショット取得リクエスト
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub config: ScraperConfig,
    pub cancel: CancellationToken,
    pub export_dir: Option<PathBuf>,
}

impl SnapshotRequest {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            export_dir: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }
}

/// スナップショット取得結果
#[derive(Debug)]
pub struct SnapshotResult {
    pub batch: Batch,
    pub inserted: u64,
    pub export_path: Option<PathBuf>,
}

/// tower::Serviceを実装したスナップショットサービス
#[derive(Debug)]
pub struct SnapshotService<S> {
    store: Arc<S>,
}

impl<S> Clone for SnapshotService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SnapshotStore + 'static> SnapshotService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// バッチを保存し、必要ならJSONも書き出す
pub async fn persist<S>(
    store: &S,
    batch: Batch,
    export_dir: Option<PathBuf>,
) -> Result<SnapshotResult, ScraperError>
where
    S: SnapshotStore + ?Sized,
{
    if batch.is_empty() {
        warn!("Empty batch ({:?}), skipping persistence", batch.stop_reason);
        return Ok(SnapshotResult {
            batch,
            inserted: 0,
            export_path: None,
        });
    }

    store.ensure_schema().await?;
    let inserted = store.append_batch(&batch).await?;

    let export_path = match export_dir {
        Some(dir) => Some(export::write_json(&batch, dir)?),
        None => None,
    };

    Ok(SnapshotResult {
        batch,
        inserted,
        export_path,
    })
}

impl<S: SnapshotStore + 'static> Service<SnapshotRequest> for SnapshotService<S> {
    type Response = SnapshotResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SnapshotRequest) -> Self::Future {
        info!(
            "Snapshot request received: url={}, max_pages={}",
            req.config.base_url, req.config.max_pages
        );
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            let pipeline = ListingPipeline::new(req.config)?;
            let batch = pipeline.run(&req.cancel).await?;

            let result = persist(store.as_ref(), batch, req.export_dir).await?;

            info!(
                "Snapshot complete: {} listings, {} inserted",
                result.batch.len(),
                result.inserted
            );
            Ok(result)
        })
    }
}
