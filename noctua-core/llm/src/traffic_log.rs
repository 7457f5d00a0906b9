//! Traffic logging for inference calls
//!
//! Summaries go to the `traffic` tracing target. Content is truncated so
//! transcripts do not end up in logs verbatim.

use serde::Serialize;

/// Maximum characters to log for content
const MAX_CONTENT_LOG_CHARS: usize = 200;

/// Truncate a string for logging, adding a marker if truncated
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

fn summarize(value: &impl Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "<serialization error>".to_string());
    truncate_for_log(&json, MAX_CONTENT_LOG_CHARS)
}

pub fn log_request(model: &str, request: &impl Serialize) {
    tracing::debug!(target: "traffic", model, "REQUEST {}", summarize(request));
}

pub fn log_response(model: &str, response: &impl Serialize) {
    tracing::debug!(target: "traffic", model, "RESPONSE {}", summarize(response));
}

pub fn log_error(model: &str, error: &str) {
    tracing::warn!(target: "traffic", model, "ERROR {}", truncate_for_log(error, MAX_CONTENT_LOG_CHARS));
}
