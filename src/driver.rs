//! Browser driving, wrapped down to the operations the runner consumes.
//!
//! Everything that talks to playwright-rs lives here; the rest of the crate
//! sees paths, selectors and viewport sizes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use playwright_rs::{BrowserContextOptions, Playwright, Viewport};
use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};

use crate::config::EngineKind;

/// Default per-operation deadline, applied explicitly per operation rather
/// than as ambient driver-side state.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often selector waits re-check the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum DriverError {
    /// Anything the browser driver itself reports
    #[error("browser error: {0}")]
    Browser(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("selector {selector:?} did not appear within {timeout:?}")]
    SelectorTimeout {
        selector: String,
        timeout: Duration,
    },

    #[error("could not write screenshot {}: {source}", .path.display())]
    Screenshot {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One engine's driver: owns the Playwright handle browsers are launched
/// from. Each engine task connects its own driver, so engines share nothing.
pub struct Driver {
    playwright: Playwright,
    engine: EngineKind,
    op_timeout: Duration,
}

impl Driver {
    /// Start the Playwright driver for `engine`.
    pub async fn connect(engine: EngineKind) -> Result<Self, DriverError> {
        let playwright = Playwright::launch().await.map_err(as_browser_err)?;
        Ok(Self {
            playwright,
            engine,
            op_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Launch one headless browser instance and open its page in a context
    /// that tolerates TLS errors (staging deployments rarely carry real
    /// certificates).
    pub async fn open_page(&self) -> Result<PageHandle, DriverError> {
        let browser = match self.engine {
            EngineKind::Firefox => self.playwright.firefox().launch().await,
            EngineKind::Webkit => self.playwright.webkit().launch().await,
            EngineKind::Chromium => self.playwright.chromium().launch().await,
        }
        .map_err(as_browser_err)?;

        let context = browser
            .new_context_with_options(BrowserContextOptions {
                ignore_https_errors: Some(true),
                ..Default::default()
            })
            .await
            .map_err(as_browser_err)?;
        let page = context.new_page().await.map_err(as_browser_err)?;

        Ok(PageHandle {
            browser,
            _context: context,
            page,
            op_timeout: self.op_timeout,
        })
    }
}

/// A launched browser plus the single page driven inside it.
pub struct PageHandle {
    browser: playwright_rs::Browser,
    // Held so the TLS-tolerant context outlives every page operation.
    _context: playwright_rs::BrowserContext,
    page: playwright_rs::Page,
    op_timeout: Duration,
}

impl PageHandle {
    /// Navigate, bounded by the operation timeout.
    pub async fn goto(&self, url: &str) -> Result<(), DriverError> {
        match timeout(self.op_timeout, self.page.goto(url, None)).await {
            Err(_) => Err(DriverError::Timeout(self.op_timeout)),
            Ok(result) => result.map(|_| ()).map_err(as_browser_err),
        }
    }

    /// Resize the viewport. Takes effect without a reload.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), DriverError> {
        self.page
            .set_viewport_size(Viewport {
                width: width as _,
                height: height as _,
            })
            .await
            .map_err(as_browser_err)
    }

    /// Wait until `selector` matches at least one element, polling under an
    /// explicit deadline.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + wait;
        loop {
            let locator = self.page.locator(selector).await;
            if let Ok(count) = locator.count().await {
                if count > 0 {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::SelectorTimeout {
                    selector: selector.to_string(),
                    timeout: wait,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Capture the first element matching `selector` as a PNG at `path`.
    pub async fn screenshot_element(
        &self,
        selector: &str,
        path: &Path,
    ) -> Result<(), DriverError> {
        let locator = self.page.locator(selector).await;
        let bytes = match timeout(self.op_timeout, locator.screenshot(None)).await {
            Err(_) => return Err(DriverError::Timeout(self.op_timeout)),
            Ok(result) => result.map_err(as_browser_err)?,
        };
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| DriverError::Screenshot {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Shut the browser instance down, releasing its processes.
    pub async fn close(self) -> Result<(), DriverError> {
        self.browser.close().await.map_err(as_browser_err)
    }
}

fn as_browser_err(err: impl std::fmt::Display) -> DriverError {
    DriverError::Browser(err.to_string())
}

/// Run `op`, retrying exactly once on failure. The second failure
/// propagates untouched.
pub async fn with_single_retry<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(_) => op().await,
    }
}
