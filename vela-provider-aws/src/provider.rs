//! Cloud Control implementation of the provider client boundary
//!
//! All six resource families go through the same four Cloud Control calls.
//! Mutations are asynchronous: each returns a request token, which becomes
//! the waiter handle polled via `get_resource_request_status`.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::types::ProgressEvent;
use serde_json::{Value, json};

use vela_core::client::{CallOutput, ResourceClient};
use vela_core::differ::ChangeSet;
use vela_core::error::{FetchError, MutationError, ProviderFault};
use vela_core::fields::FieldMap;
use vela_core::reconciler::WaiterSet;
use vela_core::state::{CurrentState, Snapshot, StateDoc};
use vela_core::waiter::{Acceptor, PollResult, WaitState, WaiterSpec};

/// Default polling schedule for Cloud Control operations
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Waiter for one asynchronous Cloud Control operation
pub fn operation_waiter(delay: Duration, max_attempts: u32) -> WaiterSpec {
    WaiterSpec::new("cloudcontrol-operation", delay, max_attempts)
        .with_acceptor(Acceptor::status(WaitState::Failure, "status", "FAILED"))
        .with_acceptor(Acceptor::status(WaitState::Failure, "status", "CANCEL_COMPLETE"))
        .with_acceptor(Acceptor::status(WaitState::Success, "status", "SUCCESS"))
        .with_acceptor(Acceptor::status(WaitState::Retry, "status", "PENDING"))
        .with_acceptor(Acceptor::status(WaitState::Retry, "status", "IN_PROGRESS"))
        .with_acceptor(Acceptor::status(WaitState::Retry, "status", "CANCEL_IN_PROGRESS"))
}

/// The same operation waiter for create, update, and delete
pub fn operation_waiters(delay: Duration, max_attempts: u32) -> WaiterSet {
    WaiterSet::uniform(operation_waiter(delay, max_attempts))
}

/// Cloud Control client bound to one resource type
pub struct CloudControl {
    client: CloudControlClient,
    type_name: String,
    field_map: FieldMap,
}

impl CloudControl {
    /// Connect to a region with the ambient credential chain
    pub async fn connect(region: &str, type_name: &str, field_map: FieldMap) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::from_client(CloudControlClient::new(&config), type_name, field_map)
    }

    pub fn from_client(
        client: CloudControlClient,
        type_name: impl Into<String>,
        field_map: FieldMap,
    ) -> Self {
        Self {
            client,
            type_name: type_name.into(),
            field_map,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

#[async_trait]
impl ResourceClient for CloudControl {
    async fn describe(&self, identifier: &str) -> Result<Snapshot, FetchError> {
        let result = self
            .client
            .get_resource()
            .type_name(&self.type_name)
            .identifier(identifier)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err_str = format!("{:?}", e);
                // "Doesn't exist" is a value; anything else must surface
                if err_str.contains("ResourceNotFound") {
                    return Ok(Snapshot::Absent);
                }
                let mut error = FetchError::provider(err_str.clone());
                if let Some(code) = error_code(&err_str) {
                    error = error.with_code(code);
                }
                return Err(error);
            }
        };

        let Some(props_str) = response
            .resource_description()
            .and_then(|desc| desc.properties())
        else {
            return Ok(Snapshot::Absent);
        };

        let props: Value = serde_json::from_str(props_str)
            .map_err(|e| FetchError::Malformed(format!("properties are not valid JSON: {e}")))?;

        Ok(Snapshot::Present(normalize(
            &self.field_map,
            identifier,
            &props,
        )))
    }

    async fn create(&self, changes: &ChangeSet) -> Result<CallOutput, MutationError> {
        let desired_state = Value::Object(request_doc(changes));
        tracing::debug!(type_name = %self.type_name, "issuing cloud control create");

        let result = self
            .client
            .create_resource()
            .type_name(&self.type_name)
            .desired_state(desired_state.to_string())
            .send()
            .await
            .map_err(|e| mutation_error(format!("Failed to create resource: {:?}", e)))?;

        let Some(progress) = result.progress_event() else {
            return Err(MutationError::new("No progress event returned for create"));
        };

        let mut output = CallOutput::default();
        output.ret = Some(progress_doc(progress));
        if let Some(token) = progress.request_token() {
            output = output.with_handle(token);
        }
        if let Some(identifier) = progress.identifier() {
            output = output.with_identifier(identifier);
        }
        Ok(output)
    }

    async fn update(
        &self,
        identifier: &str,
        changes: &ChangeSet,
    ) -> Result<CallOutput, MutationError> {
        if changes.is_empty() {
            return Ok(CallOutput::default());
        }

        // A single RFC-6902 patch applies the whole change set in one call,
        // so there is no partial tags-vs-attributes state to report
        let patch_document = serde_json::to_string(&patch_ops(changes))
            .map_err(|e| MutationError::new(format!("Failed to build patch: {e}")))?;
        tracing::debug!(
            type_name = %self.type_name,
            fields = ?changes.changed_fields(),
            "issuing cloud control update"
        );

        let result = self
            .client
            .update_resource()
            .type_name(&self.type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(|e| mutation_error(format!("Failed to update resource: {:?}", e)))?;

        let mut output = CallOutput::default().with_identifier(identifier);
        if let Some(progress) = result.progress_event() {
            output.ret = Some(progress_doc(progress));
            if let Some(token) = progress.request_token() {
                output = output.with_handle(token);
            }
        }
        Ok(output)
    }

    async fn delete(&self, identifier: &str) -> Result<CallOutput, MutationError> {
        tracing::debug!(type_name = %self.type_name, identifier, "issuing cloud control delete");

        let result = self
            .client
            .delete_resource()
            .type_name(&self.type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(|e| mutation_error(format!("Failed to delete resource: {:?}", e)))?;

        let mut output = CallOutput::default();
        if let Some(progress) = result.progress_event() {
            output.ret = Some(progress_doc(progress));
            if let Some(token) = progress.request_token() {
                output = output.with_handle(token);
            }
        }
        Ok(output)
    }

    /// Poll an operation by request token, normalized to the waiter vocabulary
    async fn poll(&self, handle: &str) -> PollResult {
        let status = self
            .client
            .get_resource_request_status()
            .request_token(handle)
            .send()
            .await
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                let mut fault = ProviderFault::new(err_str.clone());
                if let Some(code) = error_code(&err_str) {
                    fault = fault.with_code(code);
                }
                fault
            })?;

        let Some(progress) = status.progress_event() else {
            return Err(ProviderFault::new("No progress event in status response"));
        };
        Ok(progress_doc(progress))
    }
}

/// Normalize a progress event into the `{status, identifier, message}`
/// document the waiter vocabulary matches on
fn progress_doc(progress: &ProgressEvent) -> Value {
    let mut doc = serde_json::Map::new();
    if let Some(operation_status) = progress.operation_status() {
        doc.insert("status".to_string(), json!(operation_status.as_str()));
    }
    if let Some(identifier) = progress.identifier() {
        doc.insert("identifier".to_string(), json!(identifier));
    }
    if let Some(message) = progress.status_message() {
        doc.insert("message".to_string(), json!(message));
    }
    Value::Object(doc)
}

/// Map raw Cloud Control properties into the logical field vocabulary
fn normalize(field_map: &FieldMap, identifier: &str, props: &Value) -> CurrentState {
    let mut attributes = StateDoc::new();
    for spec in field_map.fields() {
        let Some(value) = props.get(&spec.provider_name) else {
            continue;
        };
        let value = if spec.provider_name == "Tags" {
            crate::tags::to_map(value)
        } else {
            value.clone()
        };
        attributes.insert(spec.logical_name.clone(), value);
    }
    CurrentState::new(attributes).with_identifier(identifier)
}

/// Render a change set as a Cloud Control desired-state document
fn request_doc(changes: &ChangeSet) -> serde_json::Map<String, Value> {
    let mut doc = serde_json::Map::new();
    for entry in changes.entries() {
        let value = if entry.provider_field == "Tags" {
            crate::tags::to_aws(&entry.value)
        } else {
            entry.value.clone()
        };
        doc.insert(entry.provider_field.clone(), value);
    }
    doc
}

/// Render a change set as RFC-6902 replace operations
fn patch_ops(changes: &ChangeSet) -> Vec<Value> {
    changes
        .entries()
        .iter()
        .map(|entry| {
            let value = if entry.provider_field == "Tags" {
                crate::tags::to_aws(&entry.value)
            } else {
                entry.value.clone()
            };
            json!({
                "op": "replace",
                "path": format!("/{}", entry.provider_field),
                "value": value,
            })
        })
        .collect()
}

fn mutation_error(message: String) -> MutationError {
    match error_code(&message) {
        Some(code) => MutationError::new(message).with_code(code),
        None => MutationError::new(message),
    }
}

/// Best-effort extraction of a known AWS error code from debug output
fn error_code(err: &str) -> Option<String> {
    const KNOWN: [&str; 5] = [
        "ResourceNotFoundException",
        "AlreadyExistsException",
        "ThrottlingException",
        "AccessDeniedException",
        "InvalidRequestException",
    ];
    KNOWN
        .into_iter()
        .find(|code| err.contains(code))
        .map(str::to_string)
}
