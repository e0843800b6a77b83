//! Engine error kinds and the structured failure body handed to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::iso_millis;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed input shape or selector; nothing was computed.
    #[error("{0}")]
    Usage(String),

    /// An upstream collaborator failed. Callers substitute a neutral default.
    #[error("{source_name}: {message}")]
    Upstream { source_name: String, message: String },

    /// Caller contract violation discovered during computation.
    #[error("{0}")]
    Computation(String),
}

impl EngineError {
    pub fn usage(msg: impl Into<String>) -> Self {
        EngineError::Usage(msg.into())
    }

    pub fn upstream(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Upstream {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        EngineError::Computation(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Usage(_) => "usage",
            EngineError::Upstream { .. } => "upstream",
            EngineError::Computation(_) => "computation",
        }
    }

    /// Render as the user-visible failure object.
    pub fn to_body(&self, at: DateTime<Utc>) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            timestamp: iso_millis(at),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    pub timestamp: String,
}
