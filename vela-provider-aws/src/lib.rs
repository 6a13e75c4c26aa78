//! AWS provider for the Vela reconcile engine
//!
//! Implements the provider client boundary on top of the AWS Cloud Control
//! API, which exposes every supported resource family through one uniform
//! get/create/update/delete surface keyed by CloudFormation type name.
//! Per-resource knowledge lives in static specifications: a type name, a
//! field map, and a waiter set.

pub mod provider;
pub mod resources;
pub mod tags;

pub use provider::CloudControl;

use vela_core::reconciler::Reconciler;

/// Build a ready-to-use reconciler for a resource definition
pub async fn reconciler(
    region: &str,
    def: &resources::ResourceDef,
) -> Reconciler<CloudControl> {
    let client = CloudControl::connect(region, def.type_name, (def.field_map)()).await;
    Reconciler::new(client, def.label, (def.field_map)()).with_waiters((def.waiters)())
}
