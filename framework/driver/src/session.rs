use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverError;
use crate::profile::{EngineProfile, Viewport};

/// One isolated browser session.
///
/// A session is created fresh for every case attempt and released on every
/// exit path, so no page state leaks between attempts or between cases.
#[async_trait]
pub trait Session: Send {
    /// Navigate and wait for the page load to settle.
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    /// Evaluate a script in the page and return its JSON value.
    ///
    /// Scripts that evaluate to `undefined` return [Value::Null].
    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError>;

    /// Move the pointer over the first element matching a CSS selector.
    async fn hover(&mut self, selector: &str) -> Result<(), DriverError>;

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), DriverError>;

    /// Block network requests whose URLs match any of the given patterns.
    async fn block_urls(&mut self, patterns: &[String]) -> Result<(), DriverError>;

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Release the session and its browser resources.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Factory for isolated sessions, one implementation per automation backend.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn new_session(&self, profile: &EngineProfile)
        -> Result<Box<dyn Session>, DriverError>;
}
