//! 一覧スナップショット取得ライブラリ
//!
//! - スクロール読み込み・ページ送りのある一覧ページをブラウザで描画
//! - テーブル行を検証しながら抽出し、1回の実行を1バッチとして返す
//! - バッチは共通の取得時刻付きで SQLite に保存
//!
//! # 使用例
//!
//! ```rust,ignore
//! use listing_scraper::{ScraperConfig, SnapshotRequest, SnapshotService, SqliteSnapshotStore};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SqliteSnapshotStore::connect("sqlite://listings.db").await.unwrap();
//!     let mut service = SnapshotService::new(store);
//!
//!     let request = SnapshotRequest::new(ScraperConfig::default().with_max_pages(2))
//!         .with_export_dir("./data");
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("Listings: {} ({} inserted)", result.batch.len(), result.inserted);
//! }
//! ```
//!
//! # パイプライン単体での使用例
//!
//! ```rust,ignore
//! use listing_scraper::{ListingPipeline, ScraperConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ListingPipeline::new(ScraperConfig::default()).unwrap();
//!     let batch = pipeline.run(&CancellationToken::new()).await.unwrap();
//!     println!("{} listings, stop={:?}", batch.len(), batch.stop_reason);
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod listing;
pub mod service;
pub mod store;
pub mod traits;

// 主要な型をリエクスポート
pub use config::ScraperConfig;
pub use error::ScraperError;
pub use service::{SnapshotRequest, SnapshotResult, SnapshotService};
pub use store::{SnapshotStats, SqliteSnapshotStore, StoredListing};
pub use traits::{RenderedPageSource, SnapshotStore};

pub use listing::{
    Batch, ChromiumPageSource, ListingPipeline, ListingRecord, PaginationDriver, RecordExtractor,
    ScrollController, StopReason,
};
