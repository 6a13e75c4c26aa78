//! CloudFront distribution specification
//!
//! The distribution config is one composite document; CloudFront treats it
//! as a unit, so it diffs as a single scalar. Distributions deploy slowly,
//! hence the long waiter budget.

use std::time::Duration;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

use crate::provider;

pub const LABEL: &str = "aws.cloudfront.distribution";
pub const TYPE_NAME: &str = "AWS::CloudFront::Distribution";

pub fn field_map() -> FieldMap {
    FieldMap::builder()
        .required_scalar("DistributionConfig", "distribution_config")
        .unordered_set("Tags", "tags")
        .build()
        .expect("cloudfront distribution field map")
}

pub fn waiters() -> WaiterSet {
    provider::operation_waiters(Duration::from_secs(30), 60)
}
