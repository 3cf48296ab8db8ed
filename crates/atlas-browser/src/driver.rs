//! High-level page driver wrapping the CDP client.
//!
//! Provides the small set of page operations the collection pipeline needs:
//! connecting to a target, navigating, and waiting for the load event that
//! closes an instrumentation window. The driver owns an `Arc<CdpClient>` so
//! collectors can share the same session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cdp::{CdpClient, CdpEvent};
use crate::error::SessionError;

/// High-level driver for one page target.
///
/// # Example (conceptual)
///
/// ```ignore
/// let mut driver = BrowserDriver::connect("ws://localhost:9222/devtools/page/ABC").await?;
/// driver.navigate("https://example.com").await?;
/// driver.wait_for_load(Duration::from_secs(30)).await?;
/// ```
pub struct BrowserDriver {
    client: Arc<CdpClient>,
    /// Load events, subscribed at connect time so none are missed between
    /// navigation and the wait call.
    load_events: mpsc::UnboundedReceiver<CdpEvent>,
}

impl BrowserDriver {
    /// Connect to a Chrome DevTools page target.
    ///
    /// Enables the Page and Runtime CDP domains and pre-subscribes to
    /// `Page.loadEventFired`.
    pub async fn connect(ws_url: &str) -> Result<Self, SessionError> {
        let client = Arc::new(CdpClient::connect(ws_url).await?);
        Self::from_client(client).await
    }

    /// Build a driver over an existing CDP client (e.g. one with a custom
    /// command timeout). Enables the Page and Runtime CDP domains and
    /// pre-subscribes to `Page.loadEventFired`.
    pub async fn from_client(client: Arc<CdpClient>) -> Result<Self, SessionError> {
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;
        let load_events = client.subscribe("Page.loadEventFired");

        Ok(Self {
            client,
            load_events,
        })
    }

    /// Return a shared handle to the underlying CDP client.
    pub fn client(&self) -> Arc<CdpClient> {
        Arc::clone(&self.client)
    }

    /// Navigate to a URL.
    ///
    /// Sends `Page.navigate`. If navigation returns an error (e.g.
    /// net::ERR_NAME_NOT_RESOLVED), it is surfaced as
    /// `SessionError::NavigationFailed`. Completion of the load is observed
    /// separately via [`BrowserDriver::wait_for_load`].
    pub async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let result = self
            .client
            .send_command("Page.navigate", serde_json::json!({ "url": url }))
            .await?;

        // Check for navigation-level errors (errorText field in response).
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(SessionError::NavigationFailed {
                reason: error_text.to_string(),
            });
        }

        Ok(())
    }

    /// Wait for the page load event with a timeout.
    ///
    /// Consumes the next `Page.loadEventFired` from the subscription opened
    /// at connect time. If the event does not arrive within `timeout`,
    /// returns `SessionError::PageLoadTimeout`.
    pub async fn wait_for_load(&mut self, timeout: Duration) -> Result<(), SessionError> {
        match tokio::time::timeout(timeout, self.load_events.recv()).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(SessionError::Protocol {
                detail: "WebSocket closed while waiting for page load".to_string(),
            }),
            Err(_) => Err(SessionError::PageLoadTimeout { duration: timeout }),
        }
    }
}
