//! Field maps - declarative mapping between provider and logical fields
//!
//! A `FieldMap` declares, per resource type, which provider (PascalCase)
//! field corresponds to which logical (snake_case) field, how composite
//! values compare, and which fields are only legal on update. Declaration
//! order is preserved and carries through to change sets, because some
//! mutation calls require certain fields to be set before others.

use crate::error::{FieldMapError, ValidationError};
use crate::state::DesiredState;

/// How values of a field compare during a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
    /// Deep equality (scalars and nested objects)
    #[default]
    Scalar,
    /// Element order is significant (e.g. termination policies)
    OrderedList,
    /// Element order is not significant (e.g. tag sets, subnet lists)
    UnorderedSet,
}

/// A single field declaration
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name in the provider's request/response shape (e.g. "MaxSize")
    pub provider_name: String,
    /// Field name in the logical vocabulary (e.g. "max_size")
    pub logical_name: String,
    pub kind: FieldKind,
    /// Only legal on update; never enters a create change set
    pub update_only: bool,
    /// Must be present and non-null in the desired state
    pub required: bool,
}

/// Ordered field declarations plus structural preconditions
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: Vec<FieldSpec>,
    conflicts: Vec<(String, String)>,
}

impl FieldMap {
    pub fn builder() -> FieldMapBuilder {
        FieldMapBuilder::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, logical_name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.logical_name == logical_name)
    }

    /// Check structural preconditions on a desired state
    ///
    /// Runs before any provider call; a failure here is fatal to the
    /// invocation and nothing is partially applied.
    pub fn validate(&self, desired: &DesiredState) -> Result<(), ValidationError> {
        for spec in &self.fields {
            if spec.required && !desired.is_managed(&spec.logical_name) {
                return Err(ValidationError::MissingRequired(spec.logical_name.clone()));
            }
        }
        for (a, b) in &self.conflicts {
            if desired.is_managed(a) && desired.is_managed(b) {
                return Err(ValidationError::MutuallyExclusive {
                    a: a.clone(),
                    b: b.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for `FieldMap`
///
/// `build` fails on malformed declarations (duplicates, conflicts naming
/// unknown fields) so that per-resource specifications break loudly at
/// construction time.
#[derive(Debug, Default)]
pub struct FieldMapBuilder {
    fields: Vec<FieldSpec>,
    conflicts: Vec<(String, String)>,
}

impl FieldMapBuilder {
    fn push(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn scalar(self, provider_name: impl Into<String>, logical_name: impl Into<String>) -> Self {
        self.push(FieldSpec {
            provider_name: provider_name.into(),
            logical_name: logical_name.into(),
            kind: FieldKind::Scalar,
            update_only: false,
            required: false,
        })
    }

    pub fn required_scalar(
        self,
        provider_name: impl Into<String>,
        logical_name: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec {
            provider_name: provider_name.into(),
            logical_name: logical_name.into(),
            kind: FieldKind::Scalar,
            update_only: false,
            required: true,
        })
    }

    pub fn update_only_scalar(
        self,
        provider_name: impl Into<String>,
        logical_name: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec {
            provider_name: provider_name.into(),
            logical_name: logical_name.into(),
            kind: FieldKind::Scalar,
            update_only: true,
            required: false,
        })
    }

    pub fn ordered_list(
        self,
        provider_name: impl Into<String>,
        logical_name: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec {
            provider_name: provider_name.into(),
            logical_name: logical_name.into(),
            kind: FieldKind::OrderedList,
            update_only: false,
            required: false,
        })
    }

    pub fn unordered_set(
        self,
        provider_name: impl Into<String>,
        logical_name: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec {
            provider_name: provider_name.into(),
            logical_name: logical_name.into(),
            kind: FieldKind::UnorderedSet,
            update_only: false,
            required: false,
        })
    }

    /// Declare two logical fields as mutually exclusive
    pub fn conflict(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.conflicts.push((a.into(), b.into()));
        self
    }

    pub fn build(self) -> Result<FieldMap, FieldMapError> {
        for (i, spec) in self.fields.iter().enumerate() {
            for other in &self.fields[i + 1..] {
                if spec.logical_name == other.logical_name
                    || spec.provider_name == other.provider_name
                {
                    return Err(FieldMapError::DuplicateField(spec.logical_name.clone()));
                }
            }
        }
        for (a, b) in &self.conflicts {
            if a == b {
                return Err(FieldMapError::SelfConflict(a.clone()));
            }
            for name in [a, b] {
                if !self.fields.iter().any(|f| &f.logical_name == name) {
                    return Err(FieldMapError::UnknownConflictField(name.clone()));
                }
            }
        }
        Ok(FieldMap {
            fields: self.fields,
            conflicts: self.conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn asg_map() -> FieldMap {
        FieldMap::builder()
            .required_scalar("MinSize", "min_size")
            .required_scalar("MaxSize", "max_size")
            .scalar("LaunchConfigurationName", "launch_configuration_name")
            .scalar("LaunchTemplate", "launch_template")
            .conflict("launch_configuration_name", "launch_template")
            .build()
            .unwrap()
    }

    #[test]
    fn build_rejects_duplicate_fields() {
        let result = FieldMap::builder()
            .scalar("MinSize", "min_size")
            .scalar("MinSize", "minimum_size")
            .build();
        assert_eq!(
            result.unwrap_err(),
            FieldMapError::DuplicateField("min_size".to_string())
        );
    }

    #[test]
    fn build_rejects_unknown_conflict_field() {
        let result = FieldMap::builder()
            .scalar("MinSize", "min_size")
            .conflict("min_size", "max_size")
            .build();
        assert_eq!(
            result.unwrap_err(),
            FieldMapError::UnknownConflictField("max_size".to_string())
        );
    }

    #[test]
    fn build_rejects_self_conflict() {
        let result = FieldMap::builder()
            .scalar("MinSize", "min_size")
            .conflict("min_size", "min_size")
            .build();
        assert_eq!(
            result.unwrap_err(),
            FieldMapError::SelfConflict("min_size".to_string())
        );
    }

    #[test]
    fn validate_rejects_mutually_exclusive_fields() {
        let desired = DesiredState::new()
            .with_field("min_size", 1)
            .with_field("max_size", 2)
            .with_field("launch_configuration_name", "lc-1")
            .with_field("launch_template", serde_json::json!({"id": "lt-1"}));

        let error = asg_map().validate(&desired).unwrap_err();
        assert!(matches!(error, ValidationError::MutuallyExclusive { .. }));
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let desired = DesiredState::new().with_field("min_size", 1);
        assert_eq!(
            asg_map().validate(&desired).unwrap_err(),
            ValidationError::MissingRequired("max_size".to_string())
        );
    }

    #[test]
    fn validate_treats_null_required_field_as_missing() {
        let desired = DesiredState::new()
            .with_field("min_size", 1)
            .with_field("max_size", Value::Null);
        assert!(asg_map().validate(&desired).is_err());
    }

    #[test]
    fn validate_accepts_one_of_conflicting_pair() {
        let desired = DesiredState::new()
            .with_field("min_size", 1)
            .with_field("max_size", 2)
            .with_field("launch_configuration_name", "lc-1");
        assert!(asg_map().validate(&desired).is_ok());
    }
}
