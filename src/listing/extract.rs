//! 描画済みHTMLから一覧レコードを抽出する

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::error::ScraperError;

use super::types::ListingRecord;

/// 1行に最低限必要なセル数
pub const MIN_COLUMNS: usize = 10;

/// 行単位の抽出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Record(ListingRecord),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooFewColumns { found: usize },
    EmptyName,
}

/// 1ページ分の抽出結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub table_found: bool,
    pub records: Vec<ListingRecord>,
    pub skipped: Vec<SkipReason>,
}

pub struct RecordExtractor {
    table: Selector,
    row: Selector,
    cell: Selector,
}

impl RecordExtractor {
    pub fn new(table_selector: &str) -> Result<Self, ScraperError> {
        let table = Selector::parse(table_selector).map_err(|e| {
            ScraperError::Config(format!("テーブルセレクタが不正です ({}): {}", table_selector, e))
        })?;
        let row = Selector::parse("tr")
            .map_err(|e| ScraperError::Config(format!("行セレクタ: {}", e)))?;
        let cell = Selector::parse("td")
            .map_err(|e| ScraperError::Config(format!("セルセレクタ: {}", e)))?;

        Ok(Self { table, row, cell })
    }

    /// ドキュメントを解析してレコード列を返す（副作用はログのみ）
    pub fn extract(&self, html: &str) -> PageExtraction {
        let document = Html::parse_document(html);

        let Some(table) = document.select(&self.table).next() else {
            warn!("Listing table not found in document");
            return PageExtraction::default();
        };

        let rows: Vec<ElementRef> = table.select(&self.row).collect();
        info!(
            "Found {} rows (excluding header)",
            rows.len().saturating_sub(1)
        );

        let mut extraction = PageExtraction {
            table_found: true,
            ..Default::default()
        };

        // 先頭はヘッダー行
        for (index, row) in rows.iter().enumerate().skip(1) {
            match self.parse_row(row) {
                RowOutcome::Record(record) => extraction.records.push(record),
                RowOutcome::Skip(reason) => {
                    debug!("Skipping row {}: {:?}", index, reason);
                    extraction.skipped.push(reason);
                }
            }
        }

        extraction
    }

    fn parse_row(&self, row: &ElementRef) -> RowOutcome {
        let cols: Vec<String> = row
            .select(&self.cell)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        if cols.len() < MIN_COLUMNS {
            return RowOutcome::Skip(SkipReason::TooFewColumns { found: cols.len() });
        }

        // 0列目はウォッチリスト用のアイコン列
        let name = cols[2].clone();
        if name.is_empty() {
            return RowOutcome::Skip(SkipReason::EmptyName);
        }

        RowOutcome::Record(ListingRecord {
            rank: parse_rank(&cols[1]),
            name,
            price: cols[3].clone(),
            change_1h: cols[4].clone(),
            change_24h: cols[5].clone(),
            change_7d: cols[6].clone(),
            market_cap: cols[7].clone(),
            volume_24h: cols[8].clone(),
            circulating_supply: cols[9].clone(),
        })
    }
}

/// 数字のみで構成された表示だけを順位として扱う
fn parse_rank(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
