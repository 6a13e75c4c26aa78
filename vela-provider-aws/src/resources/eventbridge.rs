//! EventBridge rule specification
//!
//! A rule fires on either a schedule expression or an event pattern.

use std::time::Duration;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

use crate::provider;

pub const LABEL: &str = "aws.events.rule";
pub const TYPE_NAME: &str = "AWS::Events::Rule";

pub fn field_map() -> FieldMap {
    FieldMap::builder()
        .required_scalar("Name", "name")
        .scalar("EventBusName", "event_bus_name")
        .scalar("ScheduleExpression", "schedule_expression")
        .scalar("EventPattern", "event_pattern")
        .scalar("State", "state")
        .scalar("Description", "description")
        .scalar("RoleArn", "role_arn")
        .unordered_set("Targets", "targets")
        .conflict("schedule_expression", "event_pattern")
        .build()
        .expect("eventbridge rule field map")
}

pub fn waiters() -> WaiterSet {
    provider::operation_waiters(Duration::from_secs(5), 36)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::state::DesiredState;

    #[test]
    fn schedule_and_pattern_are_mutually_exclusive() {
        let desired = DesiredState::new()
            .with_field("name", "nightly")
            .with_field("schedule_expression", "rate(1 day)")
            .with_field("event_pattern", serde_json::json!({"source": ["aws.ec2"]}));

        assert!(field_map().validate(&desired).is_err());
    }
}
