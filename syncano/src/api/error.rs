//! Error taxonomy for the Syncano client
//!
//! Validation errors are raised locally before any request is sent. Request
//! errors wrap a non-2xx response. `DoesNotExist` is the translated form of a
//! 404 on single-object paths (`get`, `update`, `delete`).

use serde_json::Value;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by connections, managers and records
#[derive(Debug)]
pub enum Error {
    /// Invalid argument detected before any network call
    Validation(String),
    /// Backend answered with a non-2xx status
    Request {
        status: u16,
        /// Decoded body, or a generic message for 5xx responses
        body: Value,
    },
    /// Single-object lookup returned 404
    DoesNotExist { model: String },
    /// Connection refused, timeout, DNS failure and friends
    Transport(anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn request(status: u16, body: Value) -> Self {
        Error::Request { status, body }
    }

    /// HTTP status carried by a request error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a raw 404 request error or its translated `DoesNotExist` form
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DoesNotExist { .. }) || self.status_code() == Some(404)
    }

    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, Error::DoesNotExist { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(message) => write!(f, "{}", message),
            Error::Request { status, body } => match body {
                Value::String(text) => write!(f, "{} {}", status, text),
                other => write!(f, "{} {}", status, other),
            },
            Error::DoesNotExist { model } => write!(f, "{} matching query does not exist.", model),
            Error::Transport(err) => write!(f, "transport error: {:#}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Transport(err)
    }
}
