//! Mapping of HTTP failures onto [`SyncError`].

use reqwest::StatusCode;

use farmlink_types::error::SyncError;

use super::wire::ErrorBody;

/// Longest raw body echoed into an error message.
const MAX_BODY_IN_MESSAGE: usize = 200;

/// Map a transport-level reqwest error.
pub fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_decode() {
        SyncError::DecodeFailed(err.to_string())
    } else {
        // Timeouts, DNS, refused and reset connections.
        SyncError::NetworkUnavailable(err.to_string())
    }
}

/// Map a non-success status and its body.
pub fn status_error(status: StatusCode, body: &str) -> SyncError {
    let message = server_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    });

    match status.as_u16() {
        401 | 403 => SyncError::AuthExpired,
        code @ 400..=499 => SyncError::ServerRejected {
            status: code,
            message,
        },
        code => SyncError::ServerFault {
            status: code,
            message,
        },
    }
}

/// Human-readable message from an error body: `{"message": ..}`,
/// `{"error": ..}`, or the raw text.
fn server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return Some(message);
        }
    }
    Some(body.chars().take(MAX_BODY_IN_MESSAGE).collect())
}
