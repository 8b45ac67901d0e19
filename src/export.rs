//! バッチのJSONファイル出力

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ScraperError;
use crate::listing::Batch;

/// `<dir>/listings_<YYYYmmdd_HHMMSS>.json` に書き出してパスを返す
pub fn write_json(batch: &Batch, dir: impl AsRef<Path>) -> Result<PathBuf, ScraperError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let timestamp = batch.captured_at.format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("listings_{}.json", timestamp));

    let json = serde_json::to_string_pretty(batch)?;
    std::fs::write(&path, json)?;

    info!("Saved {} listings to {:?}", batch.len(), path);
    Ok(path)
}
