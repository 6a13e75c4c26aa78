//! Convergence waiter - poll a status operation until a terminal condition
//!
//! Cloud resource transitions are asynchronous; after a mutation the caller
//! must block until the provider reports a stable state or give up
//! deterministically. The waiter polls on a fixed interval (not exponential,
//! to match provider rate-limit expectations) and classifies each
//! observation against declared acceptors.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::ProviderFault;

/// One observation of the polled operation
pub type PollResult = Result<Value, ProviderFault>;

/// Classification a matched acceptor assigns to an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Success,
    Failure,
    Retry,
}

/// How an acceptor recognizes an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// A string at a dotted path in the poll document equals the expected value
    Status { path: String, expected: String },
    /// The poll failed with this provider error code
    ///
    /// A delete waiter declares the provider's "not found" code as a
    /// success acceptor: the resource being gone is the goal.
    ErrorCode(String),
}

impl Matcher {
    fn matches(&self, observed: &PollResult) -> bool {
        match (self, observed) {
            (Matcher::Status { path, expected }, Ok(doc)) => {
                lookup(doc, path).and_then(Value::as_str) == Some(expected.as_str())
            }
            (Matcher::ErrorCode(code), Err(fault)) => fault.code.as_deref() == Some(code),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptor {
    pub state: WaitState,
    pub matcher: Matcher,
}

impl Acceptor {
    pub fn status(state: WaitState, path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            state,
            matcher: Matcher::Status {
                path: path.into(),
                expected: expected.into(),
            },
        }
    }

    pub fn error_code(state: WaitState, code: impl Into<String>) -> Self {
        Self {
            state,
            matcher: Matcher::ErrorCode(code.into()),
        }
    }
}

/// Polling schedule and acceptor set for one converge operation
#[derive(Debug, Clone)]
pub struct WaiterSpec {
    pub name: String,
    pub delay: Duration,
    pub max_attempts: u32,
    pub acceptors: Vec<Acceptor>,
}

impl WaiterSpec {
    pub fn new(name: impl Into<String>, delay: Duration, max_attempts: u32) -> Self {
        Self {
            name: name.into(),
            delay,
            max_attempts,
            acceptors: Vec::new(),
        }
    }

    pub fn with_acceptor(mut self, acceptor: Acceptor) -> Self {
        self.acceptors.push(acceptor);
        self
    }
}

/// Terminal result of a wait
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A success acceptor matched; carries the final observation if the
    /// poll returned a document (an error-code success carries none)
    Success { observed: Option<Value> },
    Failure(String),
    Timeout,
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Poll until a terminal condition is reached
pub async fn wait<F, Fut>(spec: &WaiterSpec, poll: F) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult>,
{
    run(spec, poll, None).await
}

/// Poll until a terminal condition, aborting when the channel reads true
pub async fn wait_with_cancel<F, Fut>(
    spec: &WaiterSpec,
    poll: F,
    cancel: watch::Receiver<bool>,
) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult>,
{
    run(spec, poll, Some(cancel)).await
}

async fn run<F, Fut>(
    spec: &WaiterSpec,
    mut poll: F,
    mut cancel: Option<watch::Receiver<bool>>,
) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult>,
{
    for attempt in 1..=spec.max_attempts {
        if let Some(rx) = &cancel
            && *rx.borrow()
        {
            return Outcome::Cancelled;
        }

        let observed = poll().await;
        tracing::debug!(
            waiter = %spec.name,
            attempt,
            ok = observed.is_ok(),
            "polled status operation"
        );

        // Failure acceptors take priority over success, success over retry
        if matches_class(spec, WaitState::Failure, &observed) {
            return Outcome::Failure(failure_reason(&observed));
        }
        if matches_class(spec, WaitState::Success, &observed) {
            return Outcome::Success {
                observed: observed.ok(),
            };
        }
        if !matches_class(spec, WaitState::Retry, &observed) {
            // No acceptor recognized the observation; looping forever on an
            // unknown state is worse than failing
            return Outcome::Failure(format!("ambiguous state: {}", describe(&observed)));
        }

        if sleep_or_cancel(spec.delay, &mut cancel).await {
            return Outcome::Cancelled;
        }
    }

    Outcome::Timeout
}

/// Sleep for `delay`, returning true if cancelled mid-sleep
async fn sleep_or_cancel(delay: Duration, cancel: &mut Option<watch::Receiver<bool>>) -> bool {
    let Some(rx) = cancel.as_mut() else {
        tokio::time::sleep(delay).await;
        return false;
    };

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = sleep.as_mut() => return false,
            changed = rx.changed() => match changed {
                Ok(()) => {
                    if *rx.borrow_and_update() {
                        return true;
                    }
                }
                // Sender dropped: cancellation is no longer possible
                Err(_) => {
                    sleep.as_mut().await;
                    return false;
                }
            },
        }
    }
}

fn matches_class(spec: &WaiterSpec, state: WaitState, observed: &PollResult) -> bool {
    spec.acceptors
        .iter()
        .filter(|a| a.state == state)
        .any(|a| a.matcher.matches(observed))
}

fn failure_reason(observed: &PollResult) -> String {
    match observed {
        Err(fault) => fault.message.clone(),
        Ok(doc) => doc
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| describe(observed)),
    }
}

fn describe(observed: &PollResult) -> String {
    match observed {
        Ok(doc) => doc
            .get("status")
            .and_then(Value::as_str)
            .map(|s| format!("status {s}"))
            .unwrap_or_else(|| doc.to_string()),
        Err(fault) => fault.to_string(),
    }
}

fn lookup<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = doc;
    for key in path.split('.') {
        current = current.get(key)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn operation_spec(delay_ms: u64, max_attempts: u32) -> WaiterSpec {
        WaiterSpec::new("test-operation", Duration::from_millis(delay_ms), max_attempts)
            .with_acceptor(Acceptor::status(WaitState::Failure, "status", "FAILED"))
            .with_acceptor(Acceptor::status(WaitState::Success, "status", "SUCCESS"))
            .with_acceptor(Acceptor::status(WaitState::Retry, "status", "IN_PROGRESS"))
    }

    #[tokio::test]
    async fn timeout_after_max_attempts() {
        let spec = operation_spec(5, 3);
        let polls = AtomicU32::new(0);
        let started = Instant::now();

        let outcome = wait(&spec, || {
            polls.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!({"status": "IN_PROGRESS"})) }
        })
        .await;

        assert_eq!(outcome, Outcome::Timeout);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        // One fixed-interval sleep per retry
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn success_carries_final_observation() {
        let spec = operation_spec(1, 5);
        let polls = AtomicU32::new(0);

        let outcome = wait(&spec, || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok(json!({"status": "IN_PROGRESS"}))
                } else {
                    Ok(json!({"status": "SUCCESS", "identifier": "res-123"}))
                }
            }
        })
        .await;

        let Outcome::Success { observed } = outcome else {
            panic!("expected Success, got {outcome:?}");
        };
        assert_eq!(observed.unwrap()["identifier"], json!("res-123"));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_acceptor_takes_priority() {
        // An observation matching both failure and success classifies as failure
        let spec = WaiterSpec::new("priority", Duration::from_millis(1), 5)
            .with_acceptor(Acceptor::status(WaitState::Success, "status", "DONE"))
            .with_acceptor(Acceptor::status(WaitState::Failure, "status", "DONE"));

        let outcome = wait(&spec, || async {
            Ok(json!({"status": "DONE", "message": "rolled back"}))
        })
        .await;

        assert_eq!(outcome, Outcome::Failure("rolled back".to_string()));
    }

    #[tokio::test]
    async fn unmatched_observation_is_ambiguous_failure() {
        let spec = operation_spec(1, 5);

        let outcome = wait(&spec, || async { Ok(json!({"status": "GLITCHED"})) }).await;

        let Outcome::Failure(reason) = outcome else {
            panic!("expected Failure");
        };
        assert!(reason.contains("ambiguous state"));
    }

    #[tokio::test]
    async fn delete_waiter_treats_not_found_as_success() {
        let spec = WaiterSpec::new("resource-gone", Duration::from_millis(1), 5)
            .with_acceptor(Acceptor::error_code(
                WaitState::Success,
                "ResourceNotFoundException",
            ))
            .with_acceptor(Acceptor::status(WaitState::Retry, "status", "DELETING"));

        let outcome = wait(&spec, || async {
            Err(ProviderFault::new("resource does not exist")
                .with_code("ResourceNotFoundException"))
        })
        .await;

        assert_eq!(outcome, Outcome::Success { observed: None });
    }

    #[tokio::test]
    async fn poll_fault_without_acceptor_is_failure() {
        let spec = operation_spec(1, 5);

        let outcome = wait(&spec, || async {
            Err(ProviderFault::new("throttled").with_code("Throttling"))
        })
        .await;

        assert!(matches!(outcome, Outcome::Failure(_)));
    }

    #[tokio::test]
    async fn cancel_interrupts_sleep() {
        let spec = operation_spec(5_000, 10);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            wait_with_cancel(&spec, || async { Ok(json!({"status": "IN_PROGRESS"})) }, rx).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let started = Instant::now();
        tx.send(true).unwrap();

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_cancelled_returns_before_polling() {
        let spec = operation_spec(1, 5);
        let (tx, rx) = watch::channel(true);
        let polls = AtomicU32::new(0);

        let outcome = wait_with_cancel(
            &spec,
            || {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({"status": "IN_PROGRESS"})) }
            },
            rx,
        )
        .await;

        drop(tx);
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lookup_follows_dotted_paths() {
        let doc = json!({"progress": {"operation": {"status": "SUCCESS"}}});
        assert_eq!(
            lookup(&doc, "progress.operation.status"),
            Some(&json!("SUCCESS"))
        );
        assert_eq!(lookup(&doc, "progress.missing"), None);
    }
}
