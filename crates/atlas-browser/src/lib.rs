//! Atlas CDP session layer for Chrome DevTools Protocol instrumentation.
//!
//! This crate provides the protocol plumbing that atlas artifact collectors
//! run on top of:
//!
//! - Connect to a running Chrome/Chromium instance via WebSocket
//! - Correlate JSON-RPC 2.0 commands with their responses
//! - Route protocol events to method-keyed subscription channels
//! - Enable/disable CDP domains
//! - Navigate and wait for page load (`Page.navigate`, `Page.loadEventFired`)
//!
//! # Architecture
//!
//! The crate is split into three layers:
//!
//! - **`cdp`**: Low-level WebSocket client with command/response correlation
//!   and event subscriptions.
//! - **`session`**: The [`PageSession`] trait collectors are written
//!   against, implemented by [`CdpClient`] and by test mocks.
//! - **`driver`**: A thin [`BrowserDriver`] for spanning an instrumentation
//!   window across one page load.
//!
//! # Chrome Setup
//!
//! Chrome must be running with the `--remote-debugging-port` flag:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! Query `http://localhost:9222/json` for available page targets.

pub mod cdp;
pub mod driver;
pub mod error;
pub mod session;

// Re-export key types at the crate root for convenience.
pub use cdp::{CdpClient, CdpEvent};
pub use driver::BrowserDriver;
pub use error::SessionError;
pub use session::PageSession;
