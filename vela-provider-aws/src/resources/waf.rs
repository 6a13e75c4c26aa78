//! WAFv2 web ACL specification
//!
//! Rules carry explicit priorities and WAF evaluates them in order, so the
//! rule list diffs order-sensitively.

use std::time::Duration;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

use crate::provider;

pub const LABEL: &str = "aws.wafv2.web_acl";
pub const TYPE_NAME: &str = "AWS::WAFv2::WebACL";

pub fn field_map() -> FieldMap {
    FieldMap::builder()
        .required_scalar("Name", "name")
        .required_scalar("Scope", "scope")
        .required_scalar("DefaultAction", "default_action")
        .required_scalar("VisibilityConfig", "visibility_config")
        .scalar("Description", "description")
        .ordered_list("Rules", "rules")
        .unordered_set("Tags", "tags")
        .build()
        .expect("wafv2 web acl field map")
}

pub fn waiters() -> WaiterSet {
    provider::operation_waiters(Duration::from_secs(5), 36)
}
