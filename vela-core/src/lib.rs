//! Vela Core
//!
//! Core library for a reconcile engine that converges declarative resource
//! state: fetch the current snapshot, diff it against the desired state,
//! apply the minimal mutation, and wait for the provider to report stability.

pub mod client;
pub mod comment;
pub mod differ;
pub mod error;
pub mod fields;
pub mod reconciler;
pub mod state;
pub mod waiter;
