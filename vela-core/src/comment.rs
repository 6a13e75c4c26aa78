//! Human-readable comment vocabulary for reconcile results
//!
//! Callers render these verbatim, so the wording is part of the contract:
//! dry-run comments say "Would ...", converged comments state what happened,
//! and timeout comments are distinguishable so callers know a retry is safe.

pub fn created(resource_type: &str, name: &str) -> String {
    format!("Created {resource_type} '{name}'")
}

pub fn would_create(resource_type: &str, name: &str) -> String {
    format!("Would create {resource_type} '{name}'")
}

pub fn updated(resource_type: &str, name: &str) -> String {
    format!("Updated {resource_type} '{name}'")
}

pub fn would_update(resource_type: &str, name: &str) -> String {
    format!("Would update {resource_type} '{name}'")
}

pub fn deleted(resource_type: &str, name: &str) -> String {
    format!("Deleted {resource_type} '{name}'")
}

pub fn would_delete(resource_type: &str, name: &str) -> String {
    format!("Would delete {resource_type} '{name}'")
}

pub fn already_present(resource_type: &str, name: &str) -> String {
    format!("{resource_type} '{name}' is already in the desired state")
}

pub fn already_absent(resource_type: &str, name: &str) -> String {
    format!("{resource_type} '{name}' already absent")
}

pub fn convergence_timeout(resource_type: &str, name: &str) -> String {
    format!("Timed out waiting for {resource_type} '{name}' to converge; the resource may still be transitioning, re-run to verify")
}

pub fn convergence_failure(resource_type: &str, name: &str, reason: &str) -> String {
    format!("{resource_type} '{name}' failed to converge: {reason}")
}

pub fn cancelled(resource_type: &str, name: &str) -> String {
    format!("Cancelled while waiting for {resource_type} '{name}'; re-fetch to learn the resource's actual state")
}

pub fn still_present(resource_type: &str, name: &str) -> String {
    format!("{resource_type} '{name}' still present after delete")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_comments_use_conditional_wording() {
        assert_eq!(
            would_create("aws.autoscaling.group", "web"),
            "Would create aws.autoscaling.group 'web'"
        );
        assert_eq!(
            would_delete("aws.events.rule", "nightly"),
            "Would delete aws.events.rule 'nightly'"
        );
    }

    #[test]
    fn timeout_comment_is_distinguishable() {
        let comment = convergence_timeout("aws.rds.db_cluster", "main");
        assert!(comment.contains("Timed out"));
        assert!(comment.contains("re-run"));
    }
}
