//! Error type shared by every operation in the crate.
//!
//! Each [`Error`] carries a machine-readable [`ErrorCode`], a human message, a
//! map of contextual key/value pairs and, when there was one, the lower-level
//! error that caused it.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No observation exists across the requested window.
    NoData,
    /// A provider call failed or answered with a non-success status.
    ApiError,
    InvalidInput,
    Timeout,
    RateLimit,
    CacheError,
    NetworkError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoData => "NO_DATA",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::CacheError => "CACHE_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}{}", .source.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub context: BTreeMap<String, String>,
    #[source]
    pub source: Option<BoxError>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    /// Wraps `source` so it stays reachable through [`std::error::Error::source`].
    pub fn wrap<E>(code: ErrorCode, message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            source: Some(source.into()),
            ..Self::new(code, message)
        }
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoData, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiError, message)
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Nests `self` under a new message, keeping its code.
    pub fn wrapped(self, message: impl Into<String>) -> Self {
        Self::wrap(self.code, message, self)
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn is_no_data(&self) -> bool {
        self.code == ErrorCode::NoData
    }

    pub fn is_api_error(&self) -> bool {
        self.code == ErrorCode::ApiError
    }

    pub fn is_network_error(&self) -> bool {
        self.code == ErrorCode::NetworkError
    }

    /// Finds the innermost crate error in a chain of wrapped errors.
    ///
    /// Operations wrap provider failures with their own context, so the code
    /// of the original failure can sit a few levels down.
    pub fn root_code(&self) -> ErrorCode {
        let mut code = self.code;
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            self.source.as_deref().map(|e| e as _);
        while let Some(err) = current {
            if let Some(inner) = err.downcast_ref::<Error>() {
                code = inner.code;
            }
            current = err.source();
        }
        code
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::wrap(ErrorCode::Timeout, "request timed out", err)
        } else if err.is_decode() {
            Error::wrap(ErrorCode::ApiError, "failed to decode response", err)
        } else {
            Error::wrap(ErrorCode::NetworkError, "request failed", err)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::wrap(ErrorCode::ApiError, "failed to parse response", err)
    }
}
