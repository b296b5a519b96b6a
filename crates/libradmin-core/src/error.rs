//! Client error taxonomy.
//!
//! Every failure of a library operation ends up as one of three kinds:
//! field validation, a request the server rejected with a 4xx status, or
//! anything else (transport, 5xx, unreadable response, local storage).
//! Only the first two carry a message meant for the user; the rest collapse
//! into [`GENERIC_ERROR_MESSAGE`].

use std::fmt;

use libradmin_types::ApiErrorBody;

use crate::validation::FieldError;

/// Fixed message shown for every failure that is not a 4xx rejection.
pub const GENERIC_ERROR_MESSAGE: &str = "Error interno, intenta más tarde!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// One or more form fields failed validation; nothing was sent.
    Validation(Vec<FieldError>),
    /// The server answered with a status in 400..=499.
    Rejected { status: u16, message: String },
    /// Transport failure, 5xx, unexpected payload or local I/O failure.
    /// `detail` is for logs only.
    Internal { detail: String },
}

impl ClientError {
    /// Classifies an HTTP error response.
    pub fn from_status(status: u16, body: &str) -> Self {
        if (400..=499).contains(&status) {
            let message = serde_json::from_str::<ApiErrorBody>(body)
                .ok()
                .and_then(|b| b.text().map(str::to_string))
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
            ClientError::Rejected { status, message }
        } else {
            ClientError::Internal {
                detail: format!("HTTP {status}: {body}"),
            }
        }
    }

    /// Classifies a failure that produced no response object.
    pub fn transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_decode() {
            "decode"
        } else {
            "request"
        };
        ClientError::Internal {
            detail: format!("{kind}: {err}"),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ClientError::Internal {
            detail: detail.into(),
        }
    }

    /// Text surfaced to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            ClientError::Rejected { message, .. } => message.clone(),
            ClientError::Internal { .. } => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ClientError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for ClientError {}

impl From<anyhow::Error> for ClientError {
    fn from(err: anyhow::Error) -> Self {
        ClientError::internal(format!("{err:#}"))
    }
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
