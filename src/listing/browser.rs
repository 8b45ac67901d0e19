//! chromiumoxide による描画済みページの供給

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::RenderedPageSource;

/// 1つのブラウザ・1つのタブを全ページで使い回すセッション
///
/// `close()` で明示的に解放する。途中で Future が破棄された場合でも
/// Drop でハンドラータスクを止め、ブラウザプロセスを終了させる。
pub struct ChromiumPageSource {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumPageSource {
    /// ブラウザを起動してセッションを開始
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Initializing browser session...");

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 800)
            .request_timeout(Duration::from_secs(60));

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        for arg in &config.browser_args {
            builder = builder.arg(arg.as_str());
        }
        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::SessionStart(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::SessionStart(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {:?}", e);
                }
            }
        });

        let mut source = Self {
            browser: Some(browser),
            page: None,
            handler: Some(handler),
        };

        let new_page = {
            let browser = source.browser_ref()?;
            browser.new_page("about:blank").await
        };
        let page = match new_page {
            Ok(page) => page,
            Err(e) => {
                // 起動済みのブラウザは閉じてから失敗を返す
                let _ = source.close().await;
                return Err(ScraperError::SessionStart(e.to_string()));
            }
        };
        source.page = Some(page);

        info!("Browser session initialized");
        Ok(source)
    }

    fn browser_ref(&self) -> Result<&Browser, ScraperError> {
        self.browser
            .as_ref()
            .ok_or_else(|| ScraperError::SessionStart("ブラウザが初期化されていません".into()))
    }

    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::SessionStart("ページが初期化されていません".into()))
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        self.get_page()?
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }
}

#[async_trait]
impl RenderedPageSource for ChromiumPageSource {
    async fn open(&mut self, url: &str) -> Result<(), ScraperError> {
        let page = self.get_page()?;
        page.goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        debug!("Navigation complete: {}", url);
        Ok(())
    }

    async fn has_marker(&mut self, selector: &str) -> Result<bool, ScraperError> {
        let selector = serde_json::to_string(selector)?;
        self.eval(&format!("document.querySelector({}) !== null", selector))
            .await
    }

    async fn current_height(&mut self) -> Result<u64, ScraperError> {
        self.eval("document.body.scrollHeight").await
    }

    async fn trigger_scroll(&mut self, offset: u64) -> Result<(), ScraperError> {
        self.get_page()?
            .evaluate(format!("window.scroll(0, {})", offset))
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.get_page()?
            .content()
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, ScraperError> {
        let png = self
            .get_page()?
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(Some(png))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser session...");

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        info!("Browser session closed");
        Ok(())
    }
}

impl Drop for ChromiumPageSource {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.is_some() {
            // Browser の Drop が子プロセスを kill する
            warn!("Browser session dropped without close()");
        }
    }
}
