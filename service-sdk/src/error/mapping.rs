//! Error mapping for upstream HTTP answers
//!
//! Converts a non-2xx response into a normalized [`ServiceError`], pulling
//! the most useful message out of whatever error body the service returned.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ServiceError};
use crate::util::truncate_string;

const MAX_BODY_IN_MESSAGE: usize = 100;

/// Map a non-2xx HTTP answer to a ServiceError carrying the status code
pub fn map_http_error(service: &str, status: StatusCode, body: &str) -> ServiceError {
    let message = extract_message(body).unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, truncate_string(body, MAX_BODY_IN_MESSAGE))
        }
    });

    let mut context = ErrorContext::for_service(service);
    context.add("category", classify_http_error(status));

    ServiceError::http(status.as_u16(), message).with_context(context)
}

/// Pull a message out of the usual JSON error envelopes
///
/// Collaborators answer with `{"message": ...}`, `{"error": ...}`,
/// `{"detail": ...}` or `{"error": {"message": ...}}`.
fn extract_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;

    let nested = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str);

    nested
        .or_else(|| json.get("message").and_then(Value::as_str))
        .or_else(|| json.get("error").and_then(Value::as_str))
        .or_else(|| json.get("detail").and_then(Value::as_str))
        .map(str::to_string)
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_message_extracted_from_json_body() {
        let err = map_http_error(
            "knowledge_graph",
            StatusCode::NOT_FOUND,
            r#"{"success": false, "message": "材料不存在"}"#,
        );

        assert_eq!(err.kind(), ErrorKind::Http(404));
        assert!(err.to_string().contains("材料不存在"));
        let context = err.context().expect("context attached");
        assert_eq!(context.service.as_deref(), Some("knowledge_graph"));
        assert_eq!(context.data.get("category").map(String::as_str), Some("not_found"));
    }

    #[test]
    fn test_plain_text_body_is_truncated() {
        let body = "x".repeat(500);
        let err = map_http_error("rag", StatusCode::INTERNAL_SERVER_ERROR, &body);

        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().len() < 200);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(408));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }
}
