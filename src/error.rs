use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("pipeline session failed to start: {0}")]
    SessionStart(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("タイムアウト: {0}")]
    LoadTimeout(String),

    #[error("キャンセルされました")]
    Cancelled,

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("引数エラー: {0}")]
    InvalidArgument(String),

    #[error("データベースエラー: {0}")]
    Store(#[from] sqlx::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("シリアライズエラー: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScraperError {
    /// 実行全体を中断させるエラーかどうか（セッション起動失敗のみ）
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScraperError::SessionStart(_))
    }
}
