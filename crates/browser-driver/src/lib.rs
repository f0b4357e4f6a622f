//! Browser driver capability used by the screening pipeline.
//!
//! The pipeline only talks to [`BrowserDriver`]; [`ChromiumDriver`] is the
//! production implementation over the DevTools protocol.

pub mod chromium;
pub mod config;
pub mod error;
pub mod scripts;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use chromium::ChromiumDriver;
pub use config::DriverConfig;
pub use error::DriverError;

/// Element state awaited by [`BrowserDriver::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Attached,
    Visible,
    Hidden,
}

/// Page interaction surface. Selectors are CSS selectors; element
/// operations act on the first match.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn count(&self, selector: &str) -> Result<usize, DriverError>;

    /// Number of matches whose normalized text contains `text`.
    async fn count_with_text(&self, selector: &str, text: &str) -> Result<usize, DriverError>;

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Replaces the element's value in one step.
    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// Types `text` key by key, pausing `delay` between keys.
    async fn type_text(&self, selector: &str, text: &str, delay: Duration)
        -> Result<(), DriverError>;

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError>;

    /// Checks a checkbox-like input, even when it is visually hidden.
    async fn check(&self, selector: &str) -> Result<(), DriverError>;

    /// Evaluates a script expression in the page; promises are awaited and
    /// the result is returned by value.
    async fn evaluate(&self, script: &str) -> Result<Value, DriverError>;

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError>;

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&self) -> Result<(), DriverError>;
}
