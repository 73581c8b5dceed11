//! Outbound result envelope
//!
//! Every provider operation returns an [`Outcome`]: either
//! `{"ok": true, "action": ..., "data": ...}` or
//! `{"ok": false, "error": {"code": ..., "message": ..., "details": ...}}`.
//! Expected failures never surface as panics or bare `Err`s past this layer.

use std::fmt::{self, Display, Formatter};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Closed set of outbound error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Transport failed before a response arrived
    Network,
    /// Non-2xx or malformed remote payload
    Provider,
    /// Bad caller input, state mismatch, or missing scope
    Validation,
    /// No usable credential
    AuthRequired,
    /// Missing or invalid configuration
    Config,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Network => "network",
            ErrorCode::Provider => "provider",
            ErrorCode::Validation => "validation",
            ErrorCode::AuthRequired => "auth-required",
            ErrorCode::Config => "config",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried by a failed [`Outcome`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Provider, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    /// Replaces the details object
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = if details.is_empty() {
            None
        } else {
            Some(Value::Object(details))
        };
        self
    }

    /// Looks up one field of the details object
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Discriminated result of a provider operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success { action: String, data: T },
    Failure { error: ApiError },
}

impl<T> Outcome<T> {
    pub fn success(action: impl Into<String>, data: T) -> Self {
        Outcome::Success {
            action: action.into(),
            data,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Outcome::Failure { error }
    }

    /// Wraps a `Result`, tagging the success with `action`
    pub fn from_result<E: Into<ApiError>>(action: impl Into<String>, result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Outcome::success(action, data),
            Err(err) => Outcome::failure(err.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Success { data, .. } => Some(data),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Outcome::Success { data, .. } => Ok(data),
            Outcome::Failure { error } => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Success { action, data } => {
                let mut state = serializer.serialize_struct("Outcome", 3)?;
                state.serialize_field("ok", &true)?;
                state.serialize_field("action", action)?;
                state.serialize_field("data", data)?;
                state.end()
            }
            Outcome::Failure { error } => {
                let mut state = serializer.serialize_struct("Outcome", 2)?;
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", error)?;
                state.end()
            }
        }
    }
}
