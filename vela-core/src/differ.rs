//! Differ - compare desired state with current state to produce a ChangeSet
//!
//! Compares the desired state supplied by the caller with the current state
//! fetched from the provider, field by field along a `FieldMap`, and
//! produces the minimal set of provider fields that must change.

use serde_json::Value;

use crate::fields::{FieldKind, FieldMap};
use crate::state::{DesiredState, Snapshot, StateDoc};

/// A single field to mutate, carrying both naming vocabularies
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub provider_field: String,
    pub logical_field: String,
    pub value: Value,
}

/// Ordered minimal set of fields to mutate
///
/// Order follows the field map declaration order, preserved because some
/// composite mutation calls require certain fields before others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<ChangeEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChangeEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Logical names of the fields being changed
    pub fn changed_fields(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.logical_field.as_str()).collect()
    }

    /// Render as a provider-keyed document (e.g. a create request body)
    pub fn to_provider_doc(&self) -> StateDoc {
        let mut doc = StateDoc::new();
        for entry in &self.entries {
            doc.insert(entry.provider_field.clone(), entry.value.clone());
        }
        doc
    }
}

/// Result of a diff operation
///
/// A whole-resource create is distinct from a partial update, which is
/// distinct from an empty change set.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist; the change set is the full create payload
    Create(ChangeSet),
    /// Resource exists with differences in the listed fields
    Update(ChangeSet),
    /// Resource exists and matches the desired state
    NoChange,
}

impl Diff {
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange)
    }

    pub fn change_set(&self) -> Option<&ChangeSet> {
        match self {
            Diff::Create(cs) | Diff::Update(cs) => Some(cs),
            Diff::NoChange => None,
        }
    }
}

/// Compare desired state with a snapshot to compute a Diff
///
/// Fields the caller left absent or null are skipped entirely. Update-only
/// fields never enter a create change set.
pub fn diff(current: &Snapshot, desired: &DesiredState, map: &FieldMap) -> Diff {
    match current {
        Snapshot::Absent => {
            let mut changes = ChangeSet::new();
            for spec in map.fields() {
                if spec.update_only {
                    continue;
                }
                if let Some(value) = desired.get_managed(&spec.logical_name) {
                    changes.push(ChangeEntry {
                        provider_field: spec.provider_name.clone(),
                        logical_field: spec.logical_name.clone(),
                        value: value.clone(),
                    });
                }
            }
            Diff::Create(changes)
        }
        Snapshot::Present(state) => {
            let mut changes = ChangeSet::new();
            for spec in map.fields() {
                let Some(want) = desired.get_managed(&spec.logical_name) else {
                    continue;
                };
                if !values_equal(spec.kind, want, state.get(&spec.logical_name)) {
                    changes.push(ChangeEntry {
                        provider_field: spec.provider_name.clone(),
                        logical_field: spec.logical_name.clone(),
                        value: want.clone(),
                    });
                }
            }
            if changes.is_empty() {
                Diff::NoChange
            } else {
                Diff::Update(changes)
            }
        }
    }
}

fn values_equal(kind: FieldKind, want: &Value, have: Option<&Value>) -> bool {
    let Some(have) = have else {
        return false;
    };
    match kind {
        FieldKind::Scalar | FieldKind::OrderedList => want == have,
        FieldKind::UnorderedSet => set_equal(want, have),
    }
}

/// Order-insensitive equality for set-like values
///
/// Arrays compare as multisets; anything else falls back to deep equality
/// (tag maps are plain objects and compare directly).
fn set_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut a_keys: Vec<String> = a.iter().map(|v| v.to_string()).collect();
            let mut b_keys: Vec<String> = b.iter().map(|v| v.to_string()).collect();
            a_keys.sort();
            b_keys.sort();
            a_keys == b_keys
        }
        _ => a == b,
    }
}
