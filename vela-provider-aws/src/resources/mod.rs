//! Static per-resource specifications
//!
//! Each module declares the CloudFormation type name, the field map, and
//! the waiter budget for one resource family. These are data, not logic:
//! the reconcile behavior is identical across families.

pub mod autoscaling;
pub mod cloudfront;
pub mod eventbridge;
pub mod launch_template;
pub mod rds;
pub mod waf;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

/// Definition of one supported resource family
#[derive(Debug, Clone, Copy)]
pub struct ResourceDef {
    /// Logical label used in declarations (e.g. "aws.autoscaling.group")
    pub label: &'static str,
    /// CloudFormation type name (e.g. "AWS::AutoScaling::AutoScalingGroup")
    pub type_name: &'static str,
    pub field_map: fn() -> FieldMap,
    pub waiters: fn() -> WaiterSet,
}

/// All supported resource families
pub fn all() -> Vec<ResourceDef> {
    vec![
        ResourceDef {
            label: autoscaling::LABEL,
            type_name: autoscaling::TYPE_NAME,
            field_map: autoscaling::field_map,
            waiters: autoscaling::waiters,
        },
        ResourceDef {
            label: cloudfront::LABEL,
            type_name: cloudfront::TYPE_NAME,
            field_map: cloudfront::field_map,
            waiters: cloudfront::waiters,
        },
        ResourceDef {
            label: eventbridge::LABEL,
            type_name: eventbridge::TYPE_NAME,
            field_map: eventbridge::field_map,
            waiters: eventbridge::waiters,
        },
        ResourceDef {
            label: launch_template::LABEL,
            type_name: launch_template::TYPE_NAME,
            field_map: launch_template::field_map,
            waiters: launch_template::waiters,
        },
        ResourceDef {
            label: rds::LABEL,
            type_name: rds::TYPE_NAME,
            field_map: rds::field_map,
            waiters: rds::waiters,
        },
        ResourceDef {
            label: waf::LABEL,
            type_name: waf::TYPE_NAME,
            field_map: waf::field_map,
            waiters: waf::waiters,
        },
    ]
}

/// Look up a resource family by its logical label
pub fn lookup(label: &str) -> Option<ResourceDef> {
    all().into_iter().find(|def| def.label == label)
}
