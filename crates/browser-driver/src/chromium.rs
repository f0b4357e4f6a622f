use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::scripts;
use crate::{BrowserDriver, WaitState};

const WAIT_POLL: Duration = Duration::from_millis(100);

/// One browser process with one page, owned by a single pipeline run.
pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl ChromiumDriver {
    /// Launches a browser with a fresh profile directory under
    /// `config.user_data_dir` and opens a blank page.
    pub async fn launch(config: &DriverConfig) -> Result<Self, DriverError> {
        let profile_dir = config
            .user_data_dir
            .join(format!("run-{}", uuid::Uuid::new_v4().simple()));
        let browser_config = browser_config(config, &profile_dir)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "driver", ?err, "devtools handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| DriverError::Launch(format!("failed to open page: {err}")))?;
        info!(
            target: "driver",
            headless = config.headless,
            profile = %profile_dir.display(),
            "browser launched"
        );
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
            profile_dir,
        })
    }

    async fn eval_value(&self, script: String) -> Result<Value, DriverError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(DriverError::script)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|err| DriverError::script(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn eval_bool(&self, script: String, selector: &str) -> Result<bool, DriverError> {
        match self.eval_value(script).await? {
            Value::Bool(flag) => Ok(flag),
            Value::Null => Err(DriverError::not_found(selector)),
            other => Err(DriverError::script(format!(
                "expected boolean for `{selector}`, got {other}"
            ))),
        }
    }
}

fn browser_config(config: &DriverConfig, profile_dir: &Path) -> Result<BrowserConfig, DriverError> {
    std::fs::create_dir_all(profile_dir).map_err(|err| {
        DriverError::Launch(format!(
            "failed to create profile dir {}: {err}",
            profile_dir.display()
        ))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(config.request_timeout_ms))
        .launch_timeout(Duration::from_secs(20))
        .window_size(config.window_width, config.window_height)
        .user_data_dir(profile_dir);
    if !config.headless {
        builder = builder.with_head();
    }
    if config.no_sandbox {
        builder = builder.no_sandbox();
    }
    if !config.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(config.executable.clone());
    }
    builder = builder.args(vec![
        "--disable-background-networking",
        "--disable-default-apps",
        "--disable-dev-shm-usage",
        "--disable-popup-blocking",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
    ]);
    builder
        .build()
        .map_err(|err| DriverError::Launch(format!("browser config error: {err}")))
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| DriverError::Navigation(format!("{url}: {err}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|err| DriverError::Navigation(format!("{url}: {err}")))?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let value = self.eval_value(scripts::count(selector)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn count_with_text(&self, selector: &str, text: &str) -> Result<usize, DriverError> {
        let value = self
            .eval_value(scripts::count_with_text(selector, text))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self
            .eval_value(scripts::is_visible(selector))
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        match self.page.find_element(selector).await {
            Ok(element) => {
                if element.click().await.is_ok() {
                    return Ok(());
                }
                debug!(target: "driver", selector, "native click failed; using script click");
            }
            Err(err) => {
                debug!(target: "driver", selector, %err, "element lookup failed; using script click");
            }
        }
        if self.eval_bool(scripts::click(selector), selector).await? {
            Ok(())
        } else {
            Err(DriverError::not_found(selector))
        }
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        if self.eval_bool(scripts::fill(selector, text), selector).await? {
            Ok(())
        } else {
            Err(DriverError::not_found(selector))
        }
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), DriverError> {
        if !self.eval_bool(scripts::focus(selector), selector).await? {
            return Err(DriverError::not_found(selector));
        }
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::not_found(selector))?;
        let mut buffer = [0u8; 4];
        for ch in text.chars() {
            element
                .type_str(ch.encode_utf8(&mut buffer))
                .await
                .map_err(|err| DriverError::protocol(err.to_string()))?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval_bool(scripts::is_checked(selector), selector).await
    }

    async fn check(&self, selector: &str) -> Result<(), DriverError> {
        if self.eval_bool(scripts::check(selector), selector).await? {
            Ok(())
        } else {
            Err(DriverError::script(format!("`{selector}` did not become checked")))
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, DriverError> {
        self.eval_value(script.to_string()).await
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(full_page).build())
            .await
            .map_err(|err| DriverError::protocol(format!("screenshot failed: {err}")))
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.eval_value(scripts::element_state(selector)).await?;
            let reached = match (state, current.as_str()) {
                (WaitState::Attached, Some(found)) => found != "missing",
                (WaitState::Visible, Some(found)) => found == "visible",
                (WaitState::Hidden, Some(found)) => found != "visible",
                (_, None) => false,
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(format!(
                    "`{selector}` did not reach {state:?} within {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(err) = browser.close().await {
                warn!(target: "driver", %err, "browser close failed");
            }
            if let Err(err) = browser.wait().await {
                warn!(target: "driver", %err, "browser wait failed");
            }
        }
        self.handler.abort();
        if let Err(err) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(target: "driver", %err, profile = %self.profile_dir.display(), "profile cleanup skipped");
        }
        Ok(())
    }
}
