use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ScraperError;

pub const DEFAULT_BASE_URL: &str = "https://coinmarketcap.com/";
pub const DEFAULT_MARKER_SELECTOR: &str = "table.cmc-table";

/// ブラウザ起動フラグのデフォルト（自動化検出の回避など、中身は不透明な外部設定として扱う）
const DEFAULT_BROWSER_ARGS: &[&str] = &[
    "--start-maximized",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
];

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// 一覧ページのURL（`?page=N` を付与してページ送りする）
    pub base_url: String,
    /// 1ステップあたりのスクロール量（px）
    pub scroll_step: u64,
    /// スクロールステップ毎の待機
    pub scroll_pause: Duration,
    /// 1スイープ完了後、追加コンテンツの描画を待つ時間
    pub settle_pause: Duration,
    /// ページ遷移直後の待機
    pub navigation_settle: Duration,
    pub max_scroll_attempts: u32,
    /// テーブル出現待ちの上限
    pub marker_timeout: Duration,
    pub marker_poll_interval: Duration,
    pub marker_selector: String,
    pub max_pages: u32,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub browser_args: Vec<String>,
    /// タイムアウト時にスクリーンショットをログ出力する
    pub debug: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            scroll_step: 300,
            scroll_pause: Duration::from_millis(500),
            settle_pause: Duration::from_secs(1),
            navigation_settle: Duration::from_secs(3),
            max_scroll_attempts: 5,
            marker_timeout: Duration::from_secs(10),
            marker_poll_interval: Duration::from_millis(250),
            marker_selector: DEFAULT_MARKER_SELECTOR.to_string(),
            max_pages: 10,
            headless: true,
            chrome_path: None,
            browser_args: DEFAULT_BROWSER_ARGS.iter().map(|s| s.to_string()).collect(),
            debug: false,
        }
    }
}

impl ScraperConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// 環境変数 (`SCRAPER_*`) で既定値を上書きした設定を作成
    pub fn from_env() -> Result<Self, ScraperError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SCRAPER_BASE_URL") {
            config.base_url = url;
        }
        if let Some(pages) = env_parse::<u32>("SCRAPER_MAX_PAGES")? {
            config.max_pages = pages;
        }
        if let Some(step) = env_parse::<u64>("SCRAPER_SCROLL_STEP")? {
            config.scroll_step = step;
        }
        if let Some(ms) = env_parse::<u64>("SCRAPER_SCROLL_PAUSE_MS")? {
            config.scroll_pause = Duration::from_millis(ms);
        }
        if let Some(attempts) = env_parse::<u32>("SCRAPER_MAX_SCROLL_ATTEMPTS")? {
            config.max_scroll_attempts = attempts;
        }
        if let Some(secs) = env_parse::<u64>("SCRAPER_MARKER_TIMEOUT_SECS")? {
            config.marker_timeout = Duration::from_secs(secs);
        }
        if let Some(headless) = env_parse::<bool>("SCRAPER_HEADLESS")? {
            config.headless = headless;
        }
        if let Some(debug) = env_parse::<bool>("SCRAPER_DEBUG")? {
            config.debug = debug;
        }
        config.chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .ok()
            .map(PathBuf::from);

        Ok(config)
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_scroll(mut self, step: u64, pause: Duration, max_attempts: u32) -> Self {
        self.scroll_step = step;
        self.scroll_pause = pause;
        self.max_scroll_attempts = max_attempts;
        self
    }

    pub fn with_settle_pause(mut self, pause: Duration) -> Self {
        self.settle_pause = pause;
        self
    }

    pub fn with_navigation_settle(mut self, pause: Duration) -> Self {
        self.navigation_settle = pause;
        self
    }

    pub fn with_marker_timeout(mut self, timeout: Duration) -> Self {
        self.marker_timeout = timeout;
        self
    }

    pub fn with_marker_selector(mut self, selector: impl Into<String>) -> Self {
        self.marker_selector = selector.into();
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_browser_arg(mut self, arg: impl Into<String>) -> Self {
        self.browser_args.push(arg.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 使用前の検証
    pub fn validate(&self) -> Result<(), ScraperError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ScraperError::Config(format!("base_url が不正です ({}): {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScraperError::Config(format!(
                "base_url のスキームが不正です: {}",
                url.scheme()
            )));
        }
        if self.scroll_step == 0 {
            return Err(ScraperError::Config("scroll_step は1以上が必要です".into()));
        }
        if self.max_pages == 0 {
            return Err(ScraperError::Config("max_pages は1以上が必要です".into()));
        }
        if self.marker_timeout.is_zero() {
            return Err(ScraperError::Config("marker_timeout が0です".into()));
        }
        if self.marker_poll_interval.is_zero() {
            return Err(ScraperError::Config("marker_poll_interval が0です".into()));
        }
        if self.marker_selector.trim().is_empty() {
            return Err(ScraperError::Config("marker_selector が空です".into()));
        }
        Ok(())
    }

    /// ページ番号付きのURLを組み立てる
    pub fn page_url(&self, page: u32) -> Result<String, ScraperError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ScraperError::Config(format!("base_url が不正です: {}", e)))?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url.into())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ScraperError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ScraperError::Config(format!("{} の値が不正です: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
