//! Structured error types for tandem.
//!
//! `TandemError` covers setup-time failures. `DispatchError` is the
//! discriminated per-dispatch result: every variant leaves the engine usable
//! and the committed state untouched.
//!
//! # The Error Boundary Rule
//!
//! Handlers may use `anyhow` internally. An `anyhow::Error` only leaves the
//! engine wrapped in [`DispatchError::HandlerFailed`].

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::digest::StateDigest;

/// Setup-time and construction errors.
#[derive(Debug, Error)]
pub enum TandemError {
    /// An action with this tag is already registered on the system.
    ///
    /// Raised at registration, never during dispatch.
    #[error("message type {type_tag} is already in use")]
    DuplicateAction { type_tag: String },

    /// A payload or state could not be converted to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a dispatch was rejected.
///
/// `UnknownActionType` and `PayloadValidation` are raised before any
/// bookkeeping happens. `HandlerFailed` is raised after expired ledger entries
/// were pruned but before anything is committed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No action is registered for the event's type tag.
    #[error("unknown action type: {type_tag}")]
    UnknownActionType { type_tag: String },

    /// The payload was rejected by the action's validator.
    #[error("invalid payload for {type_tag}: {source}")]
    PayloadValidation {
        type_tag: String,
        #[source]
        source: ValidationError,
    },

    /// The handler returned an error; the draft it worked on was discarded.
    #[error("handler for {type_tag} failed: {source}")]
    HandlerFailed {
        type_tag: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// The type tag of the rejected event.
    pub fn type_tag(&self) -> &str {
        match self {
            DispatchError::UnknownActionType { type_tag }
            | DispatchError::PayloadValidation { type_tag, .. }
            | DispatchError::HandlerFailed { type_tag, .. } => type_tag,
        }
    }

    /// Whether this is an unknown-type rejection.
    ///
    /// Protocol boundaries typically ignore these silently.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, DispatchError::UnknownActionType { .. })
    }

    /// The validator's error, if the payload was rejected.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            DispatchError::PayloadValidation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A structured payload rejection.
///
/// `constraint` names the rule that failed (`"type"`, `"min"`, `"absent"`,
/// ...) and `path` points into the payload (`"$"` for the root).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message} ({constraint})")]
pub struct ValidationError {
    pub path: String,
    pub constraint: Cow<'static, str>,
    pub message: String,
}

impl ValidationError {
    /// A rejection at the payload root.
    pub fn new(constraint: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            path: "$".to_string(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    /// Point the rejection at a path inside the payload.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// The source state digest computed locally disagrees with the authority's.
///
/// tandem never raises this on its own; hosts obtain it from
/// [`System::verify_source_digest`](crate::System::verify_source_digest) and
/// typically respond with `reset()` and a full re-sync.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct IntegrityMismatch {
    pub expected: StateDigest,
    pub actual: StateDigest,
}

impl fmt::Display for IntegrityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source state diverged from authority (expected {}, computed {})",
            self.expected, self.actual
        )
    }
}
