//! The [`PageSession`] trait: the seam between protocol transport and
//! higher-level collectors.
//!
//! A page session exposes exactly two capabilities: subscribing to a named
//! protocol event (returning a channel handle fed in arrival order) and
//! sending a named command that resolves with a structured result. Artifact
//! collectors are written against this trait so they can run over a live
//! [`CdpClient`] or a scripted mock in tests.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cdp::{CdpClient, CdpEvent};
use crate::error::SessionError;

/// A live session against one page target of a remote debugging protocol.
#[async_trait]
pub trait PageSession: Send + Sync + 'static {
    /// Subscribe to a protocol event by method name.
    ///
    /// Events are delivered on the returned channel in the order the session
    /// emits them. The channel closes when the session ends.
    fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<CdpEvent>;

    /// Send a command and wait for its structured result.
    async fn command(&self, method: &str, params: Value) -> Result<Value, SessionError>;

    /// Enable a protocol domain so its events begin flowing.
    async fn enable_domain(&self, domain: &str) -> Result<(), SessionError> {
        self.command(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Disable a protocol domain, stopping its event flow.
    async fn disable_domain(&self, domain: &str) -> Result<(), SessionError> {
        self.command(&format!("{domain}.disable"), serde_json::json!({}))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PageSession for CdpClient {
    fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<CdpEvent> {
        CdpClient::subscribe(self, method)
    }

    async fn command(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.send_command(method, params).await
    }
}
