//! Provider client boundary
//!
//! The Reconciler treats the provider as an opaque capability set: one
//! read, three mutations, and a status poll. Resource-specific request and
//! response shapes stay behind this trait, in the field map and the
//! provider's normalization code.

use async_trait::async_trait;
use serde_json::Value;

use crate::differ::ChangeSet;
use crate::error::{FetchError, MutationError, ProviderFault};
use crate::state::Snapshot;
use crate::waiter::PollResult;

/// Result of an accepted mutation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOutput {
    /// Normalized provider response for the mutation call, if one was
    /// returned (the Cloud Control client stores the progress document here)
    pub ret: Option<Value>,
    /// Identifier the provider assigned, when known at call time
    pub identifier: Option<String>,
    /// Handle for polling the operation's progress (e.g. a request token)
    pub handle: Option<String>,
    /// Provider-supplied remarks, surfaced verbatim to the caller
    pub comment: Vec<String>,
}

impl CallOutput {
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

/// Capability set a provider exposes for one resource type
///
/// `describe` distinguishes "doesn't exist" (`Snapshot::Absent`) from
/// "couldn't check" (`FetchError`); implementations must never coerce one
/// into the other.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch and normalize the current state of a resource
    async fn describe(&self, identifier: &str) -> Result<Snapshot, FetchError>;

    /// Create the resource from a whole-resource change set
    async fn create(&self, changes: &ChangeSet) -> Result<CallOutput, MutationError>;

    /// Apply a partial change set to an existing resource
    async fn update(&self, identifier: &str, changes: &ChangeSet)
    -> Result<CallOutput, MutationError>;

    /// Delete the resource
    async fn delete(&self, identifier: &str) -> Result<CallOutput, MutationError>;

    /// Poll the progress of a mutation by its handle
    ///
    /// Implementations normalize the observation into a document with
    /// `status`, `identifier`, and `message` keys so waiter acceptors can
    /// match on them.
    async fn poll(&self, handle: &str) -> PollResult {
        let _ = handle;
        Err(ProviderFault::new("polling not supported by this client"))
    }
}
