use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::DriverError;
use crate::profile::{EngineProfile, Viewport};
use crate::session::{Driver, Session};

/// Chrome DevTools Protocol backed driver.
///
/// Every session launches its own browser process so that attempts are fully
/// isolated from each other, matching the retry-with-fresh-state contract.
#[derive(Debug, Default)]
pub struct ChromeDriver {
    executable: Option<PathBuf>,
}

impl ChromeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific chrome/chromium binary instead of auto-detection.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn new_session(
        &self,
        profile: &EngineProfile,
    ) -> Result<Box<dyn Session>, DriverError> {
        let launch_error = |message: String| DriverError::Launch {
            engine: profile.name.clone(),
            message,
        };

        let mut builder = BrowserConfig::builder()
            .window_size(profile.viewport.width, profile.viewport.height)
            .no_sandbox();
        if !profile.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(launch_error)?;

        log::debug!("Launching browser for engine '{}'", profile.name);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| launch_error(e.to_string()))?;

        // The handler drives all CDP traffic and must be polled for the
        // lifetime of the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| launch_error(e.to_string()))?;

        if let Some(user_agent) = &profile.user_agent {
            page.set_user_agent(user_agent)
                .await
                .map_err(|e| launch_error(e.to_string()))?;
        }

        let mut session = ChromeSession {
            browser,
            page,
            handler_task,
            closed: false,
        };
        // Window size alone does not pin the layout viewport, so apply the
        // profile viewport through device metrics emulation as well.
        session.set_viewport(profile.viewport).await?;

        Ok(Box::new(session))
    }
}

struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    closed: bool,
}

impl ChromeSession {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let navigation_error = |message: String| DriverError::Navigation {
            url: url.to_string(),
            message,
        };

        self.page
            .goto(url)
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        self.ensure_open()?;
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Evaluation {
                message: e.to_string(),
            })?;
        // `undefined` carries no value; report it as null rather than failing.
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn hover(&mut self, selector: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let interaction_error = |message: String| DriverError::Interaction {
            action: format!("hover '{selector}'"),
            message,
        };

        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| interaction_error(e.to_string()))?;
        element
            .hover()
            .await
            .map_err(|e| interaction_error(e.to_string()))?;
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), DriverError> {
        self.ensure_open()?;
        let interaction_error = |message: String| DriverError::Interaction {
            action: format!("set viewport {}x{}", viewport.width, viewport.height),
            message,
        };

        let params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(interaction_error)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| interaction_error(e.to_string()))?;
        Ok(())
    }

    async fn block_urls(&mut self, patterns: &[String]) -> Result<(), DriverError> {
        self.ensure_open()?;
        let interaction_error = |message: String| DriverError::Interaction {
            action: format!("block urls {patterns:?}"),
            message,
        };

        self.page
            .execute(network::EnableParams::default())
            .await
            .map_err(|e| interaction_error(e.to_string()))?;
        let params = network::SetBlockedUrLsParams::new(patterns.to_vec());
        self.page
            .execute(params)
            .await
            .map_err(|e| interaction_error(e.to_string()))?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.ensure_open()?;
        let screenshot_error = |message: String| DriverError::Screenshot { message };

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| screenshot_error(e.to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(&response.data)
            .map_err(|e| screenshot_error(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        log::debug!("Closing browser session");
        let result = self.browser.close().await;
        self.handler_task.abort();
        result.map(|_| ()).map_err(|e| DriverError::Interaction {
            action: "close session".to_string(),
            message: e.to_string(),
        })
    }
}
