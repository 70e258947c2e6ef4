//! Request and response shapes exchanged with the transport.
//!
//! These mirror the tool-call envelope of the remote server without owning
//! its wire encoding; the transport collaborator maps them onto the
//! protocol.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// Default timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A named remote operation and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Operation name, e.g. `mint_badge`.
    pub name: String,
    /// Argument mapping, passed through untouched.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with the given name and arguments.
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self { name: name.into(), arguments }
    }
}

/// One block of unstructured result content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Content kind (`text`, `image`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text body for `text` content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Content {
    /// Text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: "text".to_string(), text: Some(text.into()) }
    }
}

/// Response envelope of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Unstructured content blocks.
    #[serde(default)]
    pub content: Vec<Content>,
    /// Structured result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Set when the server reports the call itself as failed.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result carrying only structured content.
    pub fn structured(value: Value) -> Self {
        Self { content: Vec::new(), structured_content: Some(value), is_error: false }
    }

    /// Failed result with a text explanation.
    pub fn error(message: impl Into<String>) -> Self {
        Self { content: vec![Content::text(message)], structured_content: None, is_error: true }
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(|c| c.text.as_deref()).collect::<Vec<_>>().join("\n")
    }
}

/// Progress notification emitted by the server while a call runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Progress so far.
    pub progress: f64,
    /// Total, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Human readable status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Where a transport reports progress for one request.
#[derive(Debug, Clone)]
pub struct ProgressSink(mpsc::UnboundedSender<Progress>);

impl ProgressSink {
    /// Wrap a channel sender.
    pub fn new(sender: mpsc::UnboundedSender<Progress>) -> Self {
        Self(sender)
    }

    /// Report progress. Returns false once the caller stopped listening.
    pub fn notify(&self, progress: Progress) -> bool {
        self.0.send(progress).is_ok()
    }
}

/// Per-request options handed to [`crate::Transport::send_request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Progress channel for this request.
    pub progress: Option<ProgressSink>,
    /// Timeout measured from the last progress (or from dispatch).
    pub timeout: Duration,
    /// Whether progress restarts the timeout clock.
    pub reset_timeout_on_progress: bool,
    /// Hard cap on total duration regardless of progress.
    pub max_total_timeout: Option<Duration>,
    /// Payment method identifiers the client can handle.
    pub pmis: Vec<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            progress: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            reset_timeout_on_progress: false,
            max_total_timeout: None,
            pmis: Vec::new(),
        }
    }
}
