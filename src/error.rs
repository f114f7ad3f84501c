use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Light classification of payment-provider errors unwrapped from the
/// backend's nested `details` payload. Used for user guidance only; the
/// provider message itself is always shown verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Auth,
    Declined,
    ServiceUnavailable,
    Other,
}

impl GatewayErrorKind {
    pub fn classify(message: &str) -> Self {
        let m = message.to_lowercase();
        if m.contains("auth") || m.contains("token") || m.contains("credential") {
            GatewayErrorKind::Auth
        } else if m.contains("declin") || m.contains("insufficient") || m.contains("reject") {
            GatewayErrorKind::Declined
        } else if m.contains("unavailable") || m.contains("timeout") || m.contains("maintenance") {
            GatewayErrorKind::ServiceUnavailable
        } else {
            GatewayErrorKind::Other
        }
    }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GatewayErrorKind::Auth => "authorization",
            GatewayErrorKind::Declined => "declined",
            GatewayErrorKind::ServiceUnavailable => "service unavailable",
            GatewayErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("not signed in; a session token is required before booking")]
    NotAuthenticated,

    /// Input problems caught before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx from the clinic backend with a decoded `{error|details}` body.
    #[error("{message}")]
    Backend { status: u16, message: String },

    /// Payment provider error surfaced through the backend's `details` field.
    #[error("payment gateway error ({kind}): {message}")]
    Gateway {
        kind: GatewayErrorKind,
        message: String,
    },

    #[error("reservation expired before payment completed; pick a new slot")]
    ReservationExpired,

    /// Distinct from outright failure: the booking may still have succeeded
    /// server-side after the client gave up watching.
    #[error(
        "payment status check timed out after {attempts} attempts; \
         the booking may still have gone through — check your appointments list"
    )]
    PollTimeout { attempts: u32 },

    #[error("a booking is already in progress; cancel it before starting another")]
    BookingInProgress,

    /// Programmer-facing: an operation was invoked in a state that does not
    /// accept it (e.g. opening checkout before a reservation exists).
    #[error("operation not valid while the booking flow is in `{state}`")]
    IllegalTransition { state: &'static str },
}

/// Decode a non-2xx backend body into the right error variant.
///
/// The backend wraps provider failures as `{"details": ...}` and its own
/// failures as `{"error": ...}`. Anything undecodable falls back to the raw
/// body (trimmed) so the user still sees something actionable.
pub fn decode_error_body(status: u16, body: &str) -> BookingError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(details) = value.get("details") {
            let message = flatten_payload(details);
            return BookingError::Gateway {
                kind: GatewayErrorKind::classify(&message),
                message,
            };
        }
        if let Some(error) = value.get("error") {
            return BookingError::Backend {
                status,
                message: flatten_payload(error),
            };
        }
    }

    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        format!("request failed with status {status}")
    } else {
        trimmed.to_string()
    };
    BookingError::Backend { status, message }
}

fn flatten_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
