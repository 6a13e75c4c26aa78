//! Auto Scaling group specification
//!
//! MinSize and MaxSize are declared before DesiredCapacity so capacity is
//! bounded before it is set. A group launches from either a launch
//! configuration or a launch template, never both.

use std::time::Duration;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

use crate::provider;

pub const LABEL: &str = "aws.autoscaling.group";
pub const TYPE_NAME: &str = "AWS::AutoScaling::AutoScalingGroup";

pub fn field_map() -> FieldMap {
    FieldMap::builder()
        .required_scalar("AutoScalingGroupName", "name")
        .required_scalar("MinSize", "min_size")
        .required_scalar("MaxSize", "max_size")
        .scalar("DesiredCapacity", "desired_capacity")
        .scalar("LaunchConfigurationName", "launch_configuration_name")
        .scalar("LaunchTemplate", "launch_template")
        .scalar("MixedInstancesPolicy", "mixed_instances_policy")
        .scalar("HealthCheckType", "health_check_type")
        .scalar("HealthCheckGracePeriod", "health_check_grace_period")
        .scalar("Cooldown", "default_cooldown")
        .unordered_set("AvailabilityZones", "availability_zones")
        .unordered_set("VPCZoneIdentifier", "vpc_zone_identifier")
        .ordered_list("TerminationPolicies", "termination_policies")
        .unordered_set("Tags", "tags")
        .conflict("launch_configuration_name", "launch_template")
        .build()
        .expect("auto scaling group field map")
}

pub fn waiters() -> WaiterSet {
    provider::operation_waiters(Duration::from_secs(15), 40)
}
