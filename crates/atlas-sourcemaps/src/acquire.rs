//! Acquisition of raw source map payloads, one per script notification.
//!
//! Inline references are decoded synchronously with no protocol round-trip.
//! Remote references issue exactly one `Runtime.evaluate` command that
//! fetches the map in the page context, so the fetch observes the page's own
//! cookies and CORS position. There are no retries: a single failure is
//! terminal for that notification's record.

use atlas_browser::PageSession;
use serde_json::Value;

use crate::reference::{decode_inline, MapReference};

/// The outcome of acquiring one script's source map.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    /// The parsed JSON map object. Its fields (version, file, sourceRoot,
    /// sources, names, mappings) are opaque to the collector.
    Map(Value),
    /// The failure message: a fetch error reported by the page, verbatim, or
    /// the JSON parser's own diagnostic text.
    Failed(String),
}

/// Acquire the source map for one script notification.
///
/// `reference` has already been classified as non-empty; empty references
/// are filtered out before acquisition is attempted.
pub async fn acquire<S: PageSession>(
    session: &S,
    script_url: &str,
    reference: &MapReference,
) -> AcquisitionOutcome {
    match reference {
        MapReference::Inline(data_url) => match decode_inline(data_url) {
            Ok(text) => parse_map_text(&text),
            Err(message) => AcquisitionOutcome::Failed(message),
        },
        MapReference::Remote(map_url) => fetch_remote(session, script_url, map_url).await,
    }
}

/// Fetch a remote map by evaluating a fetch expression in the page context.
async fn fetch_remote<S: PageSession>(
    session: &S,
    script_url: &str,
    map_url: &str,
) -> AcquisitionOutcome {
    let expression = build_fetch_expression(script_url, map_url);

    let result = match session
        .command("Runtime.evaluate", build_evaluate_params(&expression))
        .await
    {
        Ok(result) => result,
        // Command rejection (transport error, CDP error) is an acquisition
        // failure for this record, never a run failure.
        Err(e) => return AcquisitionOutcome::Failed(e.to_string()),
    };

    if let Some(details) = result.get("exceptionDetails") {
        let message = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(|d| d.as_str())
            .or_else(|| details.get("text").and_then(|t| t.as_str()))
            .unwrap_or("unknown exception");
        return AcquisitionOutcome::Failed(message.to_string());
    }

    let value = result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null);

    match value {
        Value::String(text) => parse_map_text(&text),
        Value::Object(ref obj) => match obj.get("errorMessage").and_then(|m| m.as_str()) {
            // The in-page fetch failed; pass the reported message through
            // unaltered.
            Some(message) => AcquisitionOutcome::Failed(message.to_string()),
            None => AcquisitionOutcome::Failed(format!("unexpected fetch result: {value}")),
        },
        other => AcquisitionOutcome::Failed(format!("unexpected fetch result: {other}")),
    }
}

/// JSON-parse raw map text into the map object.
fn parse_map_text(text: &str) -> AcquisitionOutcome {
    match serde_json::from_str::<Value>(text) {
        Ok(map) => AcquisitionOutcome::Map(map),
        // serde_json's diagnostic includes the line/column offset of the
        // failure; it is surfaced verbatim in the record.
        Err(e) => AcquisitionOutcome::Failed(e.to_string()),
    }
}

/// Build the in-page expression that fetches the map and returns its text.
///
/// The map URL is resolved against the script URL inside the expression, so
/// relative references work. Fetch errors are caught in-page and returned as
/// `{ errorMessage }` rather than rejecting the evaluation.
pub fn build_fetch_expression(script_url: &str, map_url: &str) -> String {
    // JSON string literals are valid JS string literals, which takes care of
    // quoting and escaping.
    let script = Value::String(script_url.to_string()).to_string();
    let map = Value::String(map_url.to_string()).to_string();
    format!(
        "(async () => {{ \
           try {{ \
             const response = await fetch(new URL({map}, {script}).href); \
             return await response.text(); \
           }} catch (err) {{ \
             return {{ errorMessage: err.toString() }}; \
           }} \
         }})()"
    )
}

/// Build CDP `Runtime.evaluate` parameters for the fetch expression.
pub fn build_evaluate_params(expression: &str) -> Value {
    serde_json::json!({
        "expression": expression,
        "returnByValue": true,
        "awaitPromise": true,
    })
}
