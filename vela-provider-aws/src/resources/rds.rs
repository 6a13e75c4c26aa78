//! RDS DB cluster specification
//!
//! Cluster transitions are the slowest of the supported families; the
//! waiter budget allows an hour of convergence.

use std::time::Duration;

use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;

use crate::provider;

pub const LABEL: &str = "aws.rds.db_cluster";
pub const TYPE_NAME: &str = "AWS::RDS::DBCluster";

pub fn field_map() -> FieldMap {
    FieldMap::builder()
        .required_scalar("DBClusterIdentifier", "db_cluster_identifier")
        .required_scalar("Engine", "engine")
        .scalar("EngineVersion", "engine_version")
        .scalar("EngineMode", "engine_mode")
        .scalar("MasterUsername", "master_username")
        .scalar("DatabaseName", "database_name")
        .scalar("DBSubnetGroupName", "db_subnet_group_name")
        .scalar("BackupRetentionPeriod", "backup_retention_period")
        .scalar("PreferredBackupWindow", "preferred_backup_window")
        .scalar("PreferredMaintenanceWindow", "preferred_maintenance_window")
        .scalar("StorageEncrypted", "storage_encrypted")
        .scalar("DeletionProtection", "deletion_protection")
        .unordered_set("VpcSecurityGroupIds", "vpc_security_group_ids")
        .unordered_set("EnableCloudwatchLogsExports", "enable_cloudwatch_logs_exports")
        .unordered_set("Tags", "tags")
        .build()
        .expect("rds db cluster field map")
}

pub fn waiters() -> WaiterSet {
    provider::operation_waiters(Duration::from_secs(30), 120)
}
