//! EC2 launch template specification

use std::time::Duration;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

use crate::provider;

pub const LABEL: &str = "aws.ec2.launch_template";
pub const TYPE_NAME: &str = "AWS::EC2::LaunchTemplate";

pub fn field_map() -> FieldMap {
    FieldMap::builder()
        .required_scalar("LaunchTemplateName", "name")
        .required_scalar("LaunchTemplateData", "launch_template_data")
        .scalar("VersionDescription", "version_description")
        .unordered_set("TagSpecifications", "tag_specifications")
        .build()
        .expect("launch template field map")
}

pub fn waiters() -> WaiterSet {
    provider::operation_waiters(Duration::from_secs(5), 36)
}
