//! Source map artifact collector for instrumented page-load sessions.
//!
//! For every script the page loads while the collection window is open, this
//! crate observes the CDP `Debugger.scriptParsed` notification, acquires the
//! referenced source map (decoding inline `data:` references locally,
//! fetching remote references in the page context), and produces one result
//! record per script in notification arrival order. Downstream analysis
//! (unmapped bytes, bundle visualization) consumes the record list.
//!
//! # Usage
//!
//! ```ignore
//! let mut collector = SourceMapCollector::new(driver.client());
//! collector.start().await?;           // before navigation
//! driver.navigate(url).await?;
//! driver.wait_for_load(timeout).await?;
//! let results = collector.stop().await?;
//! ```
//!
//! Acquisition failures never abort a run; each failure is localized to its
//! record's `errorMessage`. Only contract violations (start/stop out of
//! order) and domain enable/disable failures propagate as [`CollectError`].

pub mod acquire;
pub mod collector;
pub mod error;
pub mod reference;

// Re-export key types at the crate root for convenience.
pub use acquire::AcquisitionOutcome;
pub use collector::{MapAccumulator, SourceMapCollector, SourceMapResult};
pub use error::CollectError;
pub use reference::MapReference;
