//! Reconciler - tie fetch, diff, mutate, and wait into one convergence run
//!
//! Each invocation runs to completion on a single task; the only suspension
//! point besides provider calls is the waiter's sleep. Errors are returned
//! by value inside `ReconcileResult` so the caller can render failures
//! uniformly, without per-resource error handling.

use serde_json::Value;
use tokio::sync::watch;

use crate::client::{CallOutput, ResourceClient};
use crate::comment;
use crate::differ::{self, ChangeSet, Diff};
use crate::error::FetchError;
use crate::fields::FieldMap;
use crate::state::{CurrentState, DesiredState, Snapshot};
use crate::waiter::{self, Outcome, WaiterSpec};

/// Waiter specifications per mutation kind
///
/// A missing spec means the mutation is treated as synchronous.
#[derive(Debug, Clone, Default)]
pub struct WaiterSet {
    pub create: Option<WaiterSpec>,
    pub update: Option<WaiterSpec>,
    pub delete: Option<WaiterSpec>,
}

impl WaiterSet {
    /// Use the same spec for create, update, and delete
    pub fn uniform(spec: WaiterSpec) -> Self {
        Self {
            create: Some(spec.clone()),
            update: Some(spec.clone()),
            delete: Some(spec),
        }
    }
}

/// Per-invocation options supplied by the orchestration host
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Compute and report, but never call create/update/delete
    pub dry_run: bool,
    /// External cancellation signal, observed during waiter sleeps
    pub cancel: Option<watch::Receiver<bool>>,
}

/// Uniform result record for one reconcile invocation
///
/// When `result` is false, `new_state` mirrors `old_state` rather than
/// claiming authority; the comments say what actually happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    pub old_state: Option<CurrentState>,
    pub new_state: Option<CurrentState>,
    pub result: bool,
    pub comment: Vec<String>,
}

impl ReconcileResult {
    fn new() -> Self {
        Self {
            old_state: None,
            new_state: None,
            result: true,
            comment: Vec::new(),
        }
    }

    fn fail(&mut self, comment: impl Into<String>) {
        self.result = false;
        self.new_state = self.old_state.clone();
        self.comment.push(comment.into());
    }
}

/// Orchestrates fetch -> diff -> mutate -> wait -> re-fetch for one resource
pub struct Reconciler<C: ResourceClient> {
    client: C,
    resource_type: String,
    field_map: FieldMap,
    waiters: WaiterSet,
}

impl<C: ResourceClient> Reconciler<C> {
    pub fn new(client: C, resource_type: impl Into<String>, field_map: FieldMap) -> Self {
        Self {
            client,
            resource_type: resource_type.into(),
            field_map,
            waiters: WaiterSet::default(),
        }
    }

    pub fn with_waiters(mut self, waiters: WaiterSet) -> Self {
        self.waiters = waiters;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// Read-only snapshot of the resource
    pub async fn describe(&self, identifier: &str) -> Result<Snapshot, FetchError> {
        self.client.describe(identifier).await
    }

    /// Converge the resource toward the desired state (the `present` contract)
    pub async fn apply(
        &self,
        identifier: &str,
        desired: &DesiredState,
        opts: &ReconcileOptions,
    ) -> ReconcileResult {
        let mut result = ReconcileResult::new();

        if let Err(error) = self.field_map.validate(desired) {
            result.fail(error.to_string());
            return result;
        }

        let current = match self.client.describe(identifier).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                result.fail(error.to_string());
                return result;
            }
        };
        result.old_state = current.present().cloned();

        match differ::diff(&current, desired, &self.field_map) {
            Diff::NoChange => {
                tracing::debug!(resource = %self.resource_type, name = %identifier, "no changes");
                result
                    .comment
                    .push(comment::already_present(&self.resource_type, identifier));
                // Copy, not alias: downstream mutation of new_state must not
                // reach old_state
                result.new_state = result.old_state.clone();
                result
            }
            Diff::Create(changes) => {
                if opts.dry_run {
                    result
                        .comment
                        .push(comment::would_create(&self.resource_type, identifier));
                    result.new_state = Some(project(None, &changes));
                    return result;
                }
                self.converge_create(identifier, &changes, opts, result).await
            }
            Diff::Update(changes) => {
                if opts.dry_run {
                    result
                        .comment
                        .push(comment::would_update(&self.resource_type, identifier));
                    result.new_state = Some(project(result.old_state.as_ref(), &changes));
                    return result;
                }
                self.converge_update(identifier, &changes, opts, result).await
            }
        }
    }

    /// Remove the resource (the `absent` contract)
    pub async fn destroy(&self, identifier: &str, opts: &ReconcileOptions) -> ReconcileResult {
        let mut result = ReconcileResult::new();

        let current = match self.client.describe(identifier).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                result.fail(error.to_string());
                return result;
            }
        };
        let Some(state) = current.into_present() else {
            result
                .comment
                .push(comment::already_absent(&self.resource_type, identifier));
            return result;
        };
        result.old_state = Some(state);

        if opts.dry_run {
            result
                .comment
                .push(comment::would_delete(&self.resource_type, identifier));
            return result;
        }

        let output = match self.client.delete(identifier).await {
            Ok(output) => output,
            Err(error) => {
                result.fail(error.to_string());
                return result;
            }
        };
        result.comment.extend(output.comment.clone());

        let mut assigned = identifier.to_string();
        if !self
            .converge(
                self.waiters.delete.as_ref(),
                &output,
                &mut assigned,
                identifier,
                opts,
                &mut result,
            )
            .await
        {
            return result;
        }

        match self.client.describe(identifier).await {
            Ok(Snapshot::Absent) => {
                result
                    .comment
                    .push(comment::deleted(&self.resource_type, identifier));
                result.new_state = None;
            }
            Ok(Snapshot::Present(_)) => {
                result.fail(comment::still_present(&self.resource_type, identifier));
            }
            Err(error) => {
                result.fail(error.to_string());
            }
        }
        result
    }

    async fn converge_create(
        &self,
        identifier: &str,
        changes: &ChangeSet,
        opts: &ReconcileOptions,
        mut result: ReconcileResult,
    ) -> ReconcileResult {
        let output = match self.client.create(changes).await {
            Ok(output) => output,
            Err(error) => {
                result.fail(error.to_string());
                return result;
            }
        };
        result.comment.extend(output.comment.clone());
        tracing::info!(resource = %self.resource_type, name = %identifier, "issued create");

        let mut assigned = output
            .identifier
            .clone()
            .unwrap_or_else(|| identifier.to_string());
        if !self
            .converge(
                self.waiters.create.as_ref(),
                &output,
                &mut assigned,
                identifier,
                opts,
                &mut result,
            )
            .await
        {
            // The resource may exist in a bad state; surface the identifier
            // rather than hiding it
            result
                .comment
                .push(format!("resource may exist under identifier '{assigned}'"));
            return result;
        }

        result
            .comment
            .push(comment::created(&self.resource_type, identifier));
        self.refresh(&assigned, result).await
    }

    async fn converge_update(
        &self,
        identifier: &str,
        changes: &ChangeSet,
        opts: &ReconcileOptions,
        mut result: ReconcileResult,
    ) -> ReconcileResult {
        let output = match self.client.update(identifier, changes).await {
            Ok(output) => output,
            Err(error) => {
                result.fail(error.to_string());
                return result;
            }
        };
        result.comment.extend(output.comment.clone());
        tracing::info!(
            resource = %self.resource_type,
            name = %identifier,
            fields = ?changes.changed_fields(),
            "issued update"
        );

        let mut assigned = identifier.to_string();
        if !self
            .converge(
                self.waiters.update.as_ref(),
                &output,
                &mut assigned,
                identifier,
                opts,
                &mut result,
            )
            .await
        {
            return result;
        }

        result
            .comment
            .push(comment::updated(&self.resource_type, identifier));
        self.refresh(&assigned, result).await
    }

    /// Run the waiter for a mutation; returns true once converged
    ///
    /// A success observation may carry the identifier the provider finally
    /// assigned (create operations often only learn it here).
    async fn converge(
        &self,
        spec: Option<&WaiterSpec>,
        output: &CallOutput,
        assigned: &mut String,
        identifier: &str,
        opts: &ReconcileOptions,
        result: &mut ReconcileResult,
    ) -> bool {
        let (Some(spec), Some(handle)) = (spec, output.handle.as_deref()) else {
            return true;
        };

        let client = &self.client;
        let outcome = match opts.cancel.clone() {
            Some(cancel) => waiter::wait_with_cancel(spec, || client.poll(handle), cancel).await,
            None => waiter::wait(spec, || client.poll(handle)).await,
        };

        match outcome {
            Outcome::Success { observed } => {
                if let Some(id) = observed
                    .as_ref()
                    .and_then(|doc| doc.get("identifier"))
                    .and_then(Value::as_str)
                {
                    *assigned = id.to_string();
                }
                true
            }
            Outcome::Failure(reason) => {
                result.fail(comment::convergence_failure(
                    &self.resource_type,
                    identifier,
                    &reason,
                ));
                false
            }
            Outcome::Timeout => {
                result.fail(comment::convergence_timeout(&self.resource_type, identifier));
                false
            }
            Outcome::Cancelled => {
                result.fail(comment::cancelled(&self.resource_type, identifier));
                false
            }
        }
    }

    /// Final fetch to populate the authoritative new state
    async fn refresh(&self, identifier: &str, mut result: ReconcileResult) -> ReconcileResult {
        match self.client.describe(identifier).await {
            Ok(snapshot) => {
                result.new_state = snapshot.into_present();
                result
            }
            Err(error) => {
                result.fail(error.to_string());
                result
            }
        }
    }
}

/// Overlay a change set onto a base state (or an empty skeleton)
///
/// Used to synthesize the projected state a dry run reports.
fn project(base: Option<&CurrentState>, changes: &ChangeSet) -> CurrentState {
    let mut projected = base
        .cloned()
        .unwrap_or_else(|| CurrentState::new(Default::default()));
    for entry in changes.entries() {
        projected
            .attributes
            .insert(entry.logical_field.clone(), entry.value.clone());
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MutationError, ProviderFault};
    use crate::state::StateDoc;
    use crate::waiter::{Acceptor, PollResult, WaitState};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory client that applies change sets to a stored document
    #[derive(Default)]
    struct MockClient {
        stored: Mutex<Option<StateDoc>>,
        describes: AtomicUsize,
        creates: AtomicUsize,
        updates: AtomicUsize,
        deletes: AtomicUsize,
        polls: AtomicUsize,
        fetch_error: Option<FetchError>,
        mutation_error: Option<MutationError>,
        // When set, mutations return this handle and poll reports this status
        handle: Option<String>,
        poll_status: Option<String>,
    }

    impl MockClient {
        fn with_state(attrs: serde_json::Value) -> Self {
            let serde_json::Value::Object(doc) = attrs else {
                panic!("expected object");
            };
            Self {
                stored: Mutex::new(Some(doc)),
                ..Default::default()
            }
        }

        fn output(&self) -> CallOutput {
            let mut output = CallOutput::default();
            if let Some(handle) = &self.handle {
                output = output.with_handle(handle.clone());
            }
            output
        }
    }

    #[async_trait]
    impl ResourceClient for MockClient {
        async fn describe(&self, _identifier: &str) -> Result<Snapshot, FetchError> {
            self.describes.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.fetch_error {
                return Err(error.clone());
            }
            Ok(match self.stored.lock().unwrap().clone() {
                Some(doc) => Snapshot::Present(CurrentState::new(doc).with_identifier("mock-id")),
                None => Snapshot::Absent,
            })
        }

        async fn create(&self, changes: &ChangeSet) -> Result<CallOutput, MutationError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.mutation_error {
                return Err(error.clone());
            }
            let mut doc = StateDoc::new();
            for entry in changes.entries() {
                doc.insert(entry.logical_field.clone(), entry.value.clone());
            }
            *self.stored.lock().unwrap() = Some(doc);
            Ok(self.output())
        }

        async fn update(
            &self,
            _identifier: &str,
            changes: &ChangeSet,
        ) -> Result<CallOutput, MutationError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.mutation_error {
                return Err(error.clone());
            }
            let mut stored = self.stored.lock().unwrap();
            let doc = stored.as_mut().expect("update against absent resource");
            for entry in changes.entries() {
                doc.insert(entry.logical_field.clone(), entry.value.clone());
            }
            Ok(self.output())
        }

        async fn delete(&self, _identifier: &str) -> Result<CallOutput, MutationError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.mutation_error {
                return Err(error.clone());
            }
            *self.stored.lock().unwrap() = None;
            Ok(self.output())
        }

        async fn poll(&self, _handle: &str) -> PollResult {
            self.polls.fetch_add(1, Ordering::SeqCst);
            match &self.poll_status {
                Some(status) => Ok(json!({"status": status})),
                None => Err(ProviderFault::new("no poll status configured")),
            }
        }
    }

    fn field_map() -> FieldMap {
        FieldMap::builder()
            .scalar("Name", "name")
            .scalar("MinSize", "min_size")
            .scalar("MaxSize", "max_size")
            .scalar("LaunchConfigurationName", "launch_configuration_name")
            .scalar("LaunchTemplate", "launch_template")
            .conflict("launch_configuration_name", "launch_template")
            .build()
            .unwrap()
    }

    fn reconciler(client: MockClient) -> Reconciler<MockClient> {
        Reconciler::new(client, "mock.group", field_map())
    }

    fn slow_waiters() -> WaiterSet {
        WaiterSet::uniform(
            WaiterSpec::new("mock-operation", Duration::from_millis(1), 3)
                .with_acceptor(Acceptor::status(WaitState::Success, "status", "SUCCESS"))
                .with_acceptor(Acceptor::status(WaitState::Failure, "status", "FAILED"))
                .with_acceptor(Acceptor::status(WaitState::Retry, "status", "IN_PROGRESS")),
        )
    }

    #[tokio::test]
    async fn creates_when_absent() {
        let reconciler = reconciler(MockClient::default());
        let desired = DesiredState::new().with_field("name", "x").with_field("min_size", 1);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(result.result);
        assert_eq!(reconciler.client().creates.load(Ordering::SeqCst), 1);
        assert!(result.old_state.is_none());
        let new_state = result.new_state.unwrap();
        assert_eq!(new_state.get("min_size"), Some(&json!(1)));
        assert!(result.comment.iter().any(|c| c.contains("Created")));
    }

    #[tokio::test]
    async fn second_apply_is_idempotent() {
        let reconciler = reconciler(MockClient::default());
        let desired = DesiredState::new().with_field("name", "x").with_field("min_size", 1);
        let opts = ReconcileOptions::default();

        let first = reconciler.apply("x", &desired, &opts).await;
        let second = reconciler.apply("x", &desired, &opts).await;

        assert!(second.result);
        assert_eq!(reconciler.client().creates.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 0);
        assert_eq!(second.new_state, first.new_state);
        assert!(
            second
                .comment
                .iter()
                .any(|c| c.contains("already in the desired state"))
        );
    }

    #[tokio::test]
    async fn dry_run_create_never_mutates() {
        let reconciler = reconciler(MockClient::default());
        let desired = DesiredState::new().with_field("name", "x").with_field("min_size", 1);
        let opts = ReconcileOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = reconciler.apply("x", &desired, &opts).await;

        assert!(result.result);
        assert_eq!(reconciler.client().creates.load(Ordering::SeqCst), 0);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 0);
        assert!(result.old_state.is_none());
        let projected = result.new_state.unwrap();
        assert_eq!(projected.get("name"), Some(&json!("x")));
        assert_eq!(projected.get("min_size"), Some(&json!(1)));
        assert!(result.comment.iter().any(|c| c.contains("Would create")));
    }

    #[tokio::test]
    async fn dry_run_update_projects_over_current() {
        let client = MockClient::with_state(json!({"min_size": 2, "max_size": 4}));
        let reconciler = reconciler(client);
        let desired = DesiredState::new()
            .with_field("min_size", 2)
            .with_field("max_size", 6);
        let opts = ReconcileOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = reconciler.apply("x", &desired, &opts).await;

        assert!(result.result);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 0);
        assert_eq!(result.old_state.as_ref().unwrap().get("max_size"), Some(&json!(4)));
        let projected = result.new_state.unwrap();
        assert_eq!(projected.get("max_size"), Some(&json!(6)));
        assert_eq!(projected.get("min_size"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn fetch_error_blocks_create_and_update() {
        let client = MockClient {
            fetch_error: Some(FetchError::provider("throttled").with_code("Throttling")),
            ..Default::default()
        };
        let reconciler = reconciler(client);
        let desired = DesiredState::new().with_field("min_size", 1);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(!result.result);
        assert_eq!(reconciler.client().creates.load(Ordering::SeqCst), 0);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 0);
        assert!(result.comment.iter().any(|c| c.contains("throttled")));
    }

    #[tokio::test]
    async fn update_sends_only_changed_fields() {
        let client = MockClient::with_state(json!({"min_size": 2, "max_size": 4}));
        let reconciler = reconciler(client);
        let desired = DesiredState::new()
            .with_field("min_size", 2)
            .with_field("max_size", 6);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(result.result);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.new_state.as_ref().unwrap().get("max_size"),
            Some(&json!(6))
        );
        assert!(result.comment.iter().any(|c| c.contains("Updated")));
    }

    #[tokio::test]
    async fn no_change_copies_old_state() {
        let client = MockClient::with_state(json!({"min_size": 2}));
        let reconciler = reconciler(client);
        let desired = DesiredState::new().with_field("min_size", 2);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(result.result);
        assert_eq!(result.new_state, result.old_state);
        // One describe, no final re-fetch on the no-op path
        assert_eq!(reconciler.client().describes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_precedes_any_provider_call() {
        let reconciler = reconciler(MockClient::default());
        let desired = DesiredState::new()
            .with_field("launch_configuration_name", "lc-1")
            .with_field("launch_template", json!({"id": "lt-1"}));

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(!result.result);
        assert_eq!(reconciler.client().describes.load(Ordering::SeqCst), 0);
        assert!(result.comment.iter().any(|c| c.contains("mutually exclusive")));
    }

    #[tokio::test]
    async fn mutation_error_surfaced_verbatim() {
        let client = MockClient {
            mutation_error: Some(MutationError::new(
                "AccessDenied: not authorized to perform CreateAutoScalingGroup",
            )),
            ..Default::default()
        };
        let reconciler = reconciler(client);
        let desired = DesiredState::new().with_field("min_size", 1);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(!result.result);
        assert!(result.comment.iter().any(|c| c.contains("AccessDenied")));
        assert!(result.new_state.is_none());
    }

    #[tokio::test]
    async fn waiter_timeout_reported_as_failure() {
        let client = MockClient {
            stored: Mutex::new(Some(StateDoc::new())),
            handle: Some("token-1".to_string()),
            poll_status: Some("IN_PROGRESS".to_string()),
            ..Default::default()
        };
        let reconciler = reconciler(client).with_waiters(slow_waiters());
        let desired = DesiredState::new().with_field("min_size", 1);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(!result.result);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 1);
        assert!(result.comment.iter().any(|c| c.contains("Timed out")));
        // new_state mirrors old_state rather than claiming authority
        assert_eq!(result.new_state, result.old_state);
    }

    #[tokio::test]
    async fn cancellation_fails_apply_before_polling() {
        let client = MockClient {
            stored: Mutex::new(Some(StateDoc::new())),
            handle: Some("token-1".to_string()),
            poll_status: Some("IN_PROGRESS".to_string()),
            ..Default::default()
        };
        let reconciler = reconciler(client).with_waiters(slow_waiters());
        let desired = DesiredState::new().with_field("min_size", 1);
        let (tx, rx) = watch::channel(true);
        let opts = ReconcileOptions {
            cancel: Some(rx),
            ..Default::default()
        };

        let result = reconciler.apply("x", &desired, &opts).await;
        drop(tx);

        assert!(!result.result);
        assert_eq!(reconciler.client().updates.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.client().polls.load(Ordering::SeqCst), 0);
        assert!(result.comment.iter().any(|c| c.contains("Cancelled")));
        // new_state mirrors old_state rather than claiming authority
        assert_eq!(result.new_state, result.old_state);
    }

    #[tokio::test]
    async fn waiter_success_allows_final_refresh() {
        let client = MockClient {
            handle: Some("token-1".to_string()),
            poll_status: Some("SUCCESS".to_string()),
            ..Default::default()
        };
        let reconciler = reconciler(client).with_waiters(slow_waiters());
        let desired = DesiredState::new().with_field("min_size", 1);

        let result = reconciler
            .apply("x", &desired, &ReconcileOptions::default())
            .await;

        assert!(result.result);
        assert_eq!(
            result.new_state.unwrap().get("min_size"),
            Some(&json!(1))
        );
    }

    #[tokio::test]
    async fn destroy_when_present() {
        let client = MockClient::with_state(json!({"min_size": 1}));
        let reconciler = reconciler(client);

        let result = reconciler.destroy("x", &ReconcileOptions::default()).await;

        assert!(result.result);
        assert_eq!(reconciler.client().deletes.load(Ordering::SeqCst), 1);
        assert!(result.old_state.is_some());
        assert!(result.new_state.is_none());
        assert!(result.comment.iter().any(|c| c.contains("Deleted")));
    }

    #[tokio::test]
    async fn destroy_already_absent_is_noop() {
        let reconciler = reconciler(MockClient::default());

        let result = reconciler.destroy("x", &ReconcileOptions::default()).await;

        assert!(result.result);
        assert_eq!(reconciler.client().deletes.load(Ordering::SeqCst), 0);
        assert!(result.comment.iter().any(|c| c.contains("already absent")));
    }

    #[tokio::test]
    async fn destroy_dry_run_never_deletes() {
        let client = MockClient::with_state(json!({"min_size": 1}));
        let reconciler = reconciler(client);
        let opts = ReconcileOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = reconciler.destroy("x", &opts).await;

        assert!(result.result);
        assert_eq!(reconciler.client().deletes.load(Ordering::SeqCst), 0);
        assert!(result.old_state.is_some());
        assert!(result.new_state.is_none());
        assert!(result.comment.iter().any(|c| c.contains("Would delete")));
    }
}
