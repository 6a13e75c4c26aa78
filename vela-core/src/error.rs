//! Error taxonomy for the reconcile engine
//!
//! Runtime errors cross the Reconciler boundary by value inside
//! `ReconcileResult`, never as panics. Construction-time contract violations
//! (a malformed field map) are a separate class, surfaced when the map is
//! built rather than when data flows through it.

use thiserror::Error;

/// A read against the provider failed for a reason other than "not found"
///
/// "Doesn't exist" and "couldn't check" must never be conflated: the
/// create-vs-update decision depends on the distinction.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The provider rejected or failed the read call
    #[error("Provider read failed: {message}")]
    Provider {
        code: Option<String>,
        message: String,
    },

    /// The provider answered, but the response could not be interpreted
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(self, code: impl Into<String>) -> Self {
        match self {
            Self::Provider { message, .. } => Self::Provider {
                code: Some(code.into()),
                message,
            },
            other => other,
        }
    }
}

/// The desired state violates a structural precondition
///
/// Detected before any provider call is made; always fatal to the
/// invocation and never partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Fields '{a}' and '{b}' are mutually exclusive")]
    MutuallyExclusive { a: String, b: String },

    #[error("Required field '{0}' is missing")]
    MissingRequired(String),
}

/// A create/update/delete call was rejected by the provider
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MutationError {
    pub code: Option<String>,
    pub message: String,
}

impl MutationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A field map declaration is malformed
///
/// These are programming errors in the per-resource specifications, not
/// runtime data problems, so they are reported when the map is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldMapError {
    #[error("Duplicate field declaration: {0}")]
    DuplicateField(String),

    #[error("Conflict references unknown field: {0}")]
    UnknownConflictField(String),

    #[error("Field '{0}' cannot conflict with itself")]
    SelfConflict(String),
}

/// An error observed while polling a status operation
///
/// Carries the provider's error code so waiter acceptors can match on it
/// (a delete waiter treats "not found" as success, for example).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderFault {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}
