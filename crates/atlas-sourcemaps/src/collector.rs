//! The stateful core: map accumulator and collection lifecycle.
//!
//! [`MapAccumulator`] subscribes to `Debugger.scriptParsed` notifications
//! during the active window, starts one acquisition per notification without
//! blocking delivery, and assembles the ordered result list at finalization.
//! [`SourceMapCollector`] wraps it with the domain enable/disable handshake
//! that bounds the window.
//!
//! Ordering: acquisitions race freely, but join handles are pushed onto the
//! in-flight list in notification arrival order and awaited in that order,
//! so the result list order is arrival order regardless of which fetch
//! completes first.

use std::sync::{Arc, Mutex};

use atlas_browser::{CdpEvent, PageSession};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::acquire::{acquire, AcquisitionOutcome};
use crate::error::CollectError;
use crate::reference::MapReference;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One script's source map result, as handed to downstream analysis.
///
/// Exactly one of `map`/`error_message` is populated. A record exists only
/// for notifications that carried a non-empty map reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapResult {
    /// URL of the script the map belongs to.
    pub script_url: String,
    /// The parsed map object, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<Value>,
    /// The fetch or parse failure message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One in-flight acquisition, pushed in notification arrival order.
struct PendingAcquisition {
    script_url: String,
    handle: JoinHandle<AcquisitionOutcome>,
}

// ---------------------------------------------------------------------------
// MapAccumulator
// ---------------------------------------------------------------------------

/// Accumulates source map acquisitions over one collection run.
///
/// Strict sequence: [`MapAccumulator::arm`], passive collection while the
/// window is open, then [`MapAccumulator::finalize`]. One arm and one
/// finalize per run; start a new accumulator for a new run.
pub struct MapAccumulator<S: PageSession> {
    session: Arc<S>,
    /// In-flight acquisitions in notification arrival order. Written by the
    /// pump task, drained by `finalize`; the mutex serializes the two.
    inflight: Arc<Mutex<Vec<PendingAcquisition>>>,
    stop_tx: Option<oneshot::Sender<()>>,
    pump: Option<JoinHandle<()>>,
    armed: bool,
}

impl<S: PageSession> MapAccumulator<S> {
    /// Create an accumulator for one run over the given session.
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            inflight: Arc::new(Mutex::new(Vec::new())),
            stop_tx: None,
            pump: None,
            armed: false,
        }
    }

    /// Register for script-parsed notifications and start collecting.
    ///
    /// Spawns the event pump task that reads the subscription channel and
    /// starts one acquisition per notification with a non-empty reference.
    pub fn arm(&mut self) -> Result<(), CollectError> {
        if self.armed {
            return Err(CollectError::AlreadyArmed);
        }
        self.armed = true;

        let mut events = self.session.subscribe("Debugger.scriptParsed");
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let session = Arc::clone(&self.session);
        let inflight = Arc::clone(&self.inflight);

        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = events.recv() => match event {
                        Some(event) => handle_notification(&session, &inflight, event),
                        // Session ended; the window is over.
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        // Notifications already delivered before the stop
                        // signal still count; anything later is ignored.
                        while let Ok(event) = events.try_recv() {
                            handle_notification(&session, &inflight, event);
                        }
                        break;
                    }
                }
            }
        });

        self.stop_tx = Some(stop_tx);
        self.pump = Some(pump);
        tracing::debug!("map accumulator armed");
        Ok(())
    }

    /// Stop accepting notifications, await all in-flight acquisitions, and
    /// return the ordered result list.
    ///
    /// Tolerates zero notifications (empty list). An acquisition failure
    /// becomes that record's `error_message`, never a run failure.
    pub async fn finalize(&mut self) -> Result<Vec<SourceMapResult>, CollectError> {
        let pump = self.pump.take().ok_or(CollectError::NotArmed)?;

        if let Some(stop_tx) = self.stop_tx.take() {
            // The pump may already be gone if the session ended.
            let _ = stop_tx.send(());
        }
        pump.await.map_err(|e| CollectError::Pump(e.to_string()))?;

        let pending: Vec<PendingAcquisition> = {
            let mut inflight = self.inflight.lock().expect("in-flight lock poisoned");
            inflight.drain(..).collect()
        };

        let mut results = Vec::with_capacity(pending.len());
        for pending_acquisition in pending {
            let outcome = match pending_acquisition.handle.await {
                Ok(outcome) => outcome,
                Err(e) => AcquisitionOutcome::Failed(format!("acquisition task failed: {e}")),
            };
            results.push(match outcome {
                AcquisitionOutcome::Map(map) => SourceMapResult {
                    script_url: pending_acquisition.script_url,
                    map: Some(map),
                    error_message: None,
                },
                AcquisitionOutcome::Failed(message) => SourceMapResult {
                    script_url: pending_acquisition.script_url,
                    map: None,
                    error_message: Some(message),
                },
            });
        }

        tracing::debug!(records = results.len(), "map accumulator finalized");
        Ok(results)
    }
}

/// Handle one script-parsed notification: classify the reference and, if it
/// is non-empty, start its acquisition without blocking event delivery.
fn handle_notification<S: PageSession>(
    session: &Arc<S>,
    inflight: &Arc<Mutex<Vec<PendingAcquisition>>>,
    event: CdpEvent,
) {
    let script_url = event
        .params
        .get("url")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let raw_reference = event
        .params
        .get("sourceMapURL")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let Some(reference) = MapReference::parse(raw_reference) else {
        tracing::debug!(script = %script_url, "script carries no source map reference");
        return;
    };

    tracing::debug!(script = %script_url, "starting source map acquisition");
    let session = Arc::clone(session);
    let url = script_url.clone();
    let handle = tokio::spawn(async move { acquire(session.as_ref(), &url, &reference).await });

    inflight
        .lock()
        .expect("in-flight lock poisoned")
        .push(PendingAcquisition { script_url, handle });
}

// ---------------------------------------------------------------------------
// SourceMapCollector
// ---------------------------------------------------------------------------

/// Lifecycle wrapper bounding one collection window.
///
/// `start` must run before any navigation that could emit script-parsed
/// notifications; events fired earlier are lost, not queued.
pub struct SourceMapCollector<S: PageSession> {
    session: Arc<S>,
    accumulator: MapAccumulator<S>,
}

impl<S: PageSession> SourceMapCollector<S> {
    /// Create a collector for one window over the given session.
    pub fn new(session: Arc<S>) -> Self {
        Self {
            accumulator: MapAccumulator::new(Arc::clone(&session)),
            session,
        }
    }

    /// Open the collection window.
    ///
    /// Arms the accumulator before enabling the Debugger domain, so no
    /// notification can slip between the two.
    pub async fn start(&mut self) -> Result<(), CollectError> {
        self.accumulator.arm()?;
        self.session.enable_domain("Debugger").await?;
        tracing::info!("source map collection window opened");
        Ok(())
    }

    /// Close the collection window and return the ordered result list.
    pub async fn stop(&mut self) -> Result<Vec<SourceMapResult>, CollectError> {
        let results = self.accumulator.finalize().await?;
        self.session.disable_domain("Debugger").await?;
        tracing::info!(records = results.len(), "source map collection window closed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_map_only() {
        let result = SourceMapResult {
            script_url: "https://example.com/app.js".to_string(),
            map: Some(serde_json::json!({ "version": 3 })),
            error_message: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scriptUrl"], "https://example.com/app.js");
        assert_eq!(json["map"]["version"], 3);
        assert!(json.get("errorMessage").is_none());
    }

    #[test]
    fn test_result_serializes_error_only() {
        let result = SourceMapResult {
            script_url: "https://example.com/app.js".to_string(),
            map: None,
            error_message: Some("TypeError: Failed to fetch".to_string()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errorMessage"], "TypeError: Failed to fetch");
        assert!(json.get("map").is_none());
    }
}
