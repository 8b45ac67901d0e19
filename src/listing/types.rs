//! 一覧スナップショット関連の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一覧テーブルの1行（表示文字列のまま保持し、数値化は後段に任せる）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// 整数として読めない表示（広告行など）は None
    pub rank: Option<u32>,
    pub name: String,
    pub price: String,
    pub change_1h: String,
    pub change_24h: String,
    pub change_7d: String,
    pub market_cap: String,
    pub volume_24h: String,
    pub circulating_supply: String,
}

/// ページ送りが止まった理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// max_pages まで到達
    MaxPagesReached,
    /// テーブルが時間内に現れなかった
    LoadTimeout { page: u32 },
    /// レコード0件のページ（テーブル自体が無い場合も含む）
    EmptyPage { page: u32, table_found: bool },
    /// ページ処理中の想定外エラー
    PageFailed { page: u32, message: String },
    Cancelled { page: u32 },
}

impl StopReason {
    /// 早期終了かどうか
    pub fn is_early(&self) -> bool {
        !matches!(self, StopReason::MaxPagesReached)
    }
}

/// ページ送り1回分の結果
#[derive(Debug, Clone)]
pub struct PaginationOutcome {
    pub records: Vec<ListingRecord>,
    /// テーブルが現れて抽出まで進んだページ数
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

/// 1回のパイプライン実行で得たスナップショット
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub records: Vec<ListingRecord>,
    /// バッチ全体で共有する取得時刻
    pub captured_at: DateTime<Utc>,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

impl Batch {
    pub fn new(outcome: PaginationOutcome) -> Self {
        Self::captured(outcome, Utc::now())
    }

    pub fn captured(outcome: PaginationOutcome, captured_at: DateTime<Utc>) -> Self {
        Self {
            records: outcome.records,
            captured_at,
            pages_visited: outcome.pages_visited,
            stop_reason: outcome.stop_reason,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
