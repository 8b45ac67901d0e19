//! 一覧スナップショット取得モジュール
//!
//! ページ送り → テーブル待機 → スクロール → 行抽出 の順で1バッチを作る

mod browser;
mod extract;
mod pagination;
mod pipeline;
mod scroll;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::ChromiumPageSource;
pub use extract::{PageExtraction, RecordExtractor, RowOutcome, SkipReason, MIN_COLUMNS};
pub use pagination::PaginationDriver;
pub use pipeline::ListingPipeline;
pub use scroll::{ScrollController, ScrollOutcome, SweepReport};
pub use types::{Batch, ListingRecord, PaginationOutcome, StopReason};
