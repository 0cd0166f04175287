// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow Client Gateway: hides the external durable workflow engine
//! behind a small trait so the registry, lifecycle manager, and monitor
//! can be exercised against an in-memory fake without a real engine.

use async_trait::async_trait;
use serde_json::Value;

/// Outcome of awaiting a dispatched workflow.
#[derive(Debug, Clone)]
pub enum WorkflowOutcome {
    /// The workflow completed without error.
    Success,
    /// The workflow completed with an error message.
    Failure(String),
}

/// An opaque, awaitable reference to a dispatched workflow.
#[async_trait]
pub trait WorkflowHandle: Send + Sync {
    /// Block until the workflow produces a verdict. The Gateway does not
    /// interpret the result as pass/fail/timeout.
    async fn wait(&self) -> Result<WorkflowOutcome, String>;
}

/// Hides the external workflow engine behind start/handle/cancel.
#[async_trait]
pub trait WorkflowGateway: Send + Sync {
    /// Dispatch a new workflow. Fails if the engine is unreachable.
    async fn start(
        &self,
        workflow_type: &str,
        task_queue: &str,
        input: Value,
    ) -> Result<String, String>;

    /// Return an awaitable handle for a previously-started workflow.
    fn handle(&self, workflow_id: &str) -> Box<dyn WorkflowHandle>;

    /// Best-effort cancellation.
    async fn cancel(&self, workflow_id: &str) -> Result<(), String>;
}

/// The gateway a production deployment wires in by default: a thin
/// placeholder pending a real client for the operator's chosen durable
/// workflow engine.
///
/// Every call reports the engine as unreachable rather than silently
/// pretending to dispatch work. Swapping in a concrete engine client
/// means writing a new `WorkflowGateway` impl next to this one and
/// pointing [`crate::lifecycle::LifecycleManager`] at it instead — no
/// change to the registry, lifecycle manager, or monitor is needed.
pub struct UnconfiguredWorkflowGateway;

impl UnconfiguredWorkflowGateway {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnconfiguredWorkflowGateway {
    fn default() -> Self {
        Self::new()
    }
}

struct UnconfiguredHandle;

#[async_trait]
impl WorkflowHandle for UnconfiguredHandle {
    async fn wait(&self) -> Result<WorkflowOutcome, String> {
        Err("no production workflow engine client is configured".to_string())
    }
}

#[async_trait]
impl WorkflowGateway for UnconfiguredWorkflowGateway {
    async fn start(
        &self,
        _workflow_type: &str,
        _task_queue: &str,
        _input: Value,
    ) -> Result<String, String> {
        Err("no production workflow engine client is configured".to_string())
    }

    fn handle(&self, _workflow_id: &str) -> Box<dyn WorkflowHandle> {
        Box::new(UnconfiguredHandle)
    }

    async fn cancel(&self, _workflow_id: &str) -> Result<(), String> {
        Err("no production workflow engine client is configured".to_string())
    }
}

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fake {
    //! An in-memory [`WorkflowGateway`] driven by scripted outcomes, used
    //! by component tests and the end-to-end scenario tests. Never wired
    //! into [`super::UnconfiguredWorkflowGateway`]'s production call path.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A scripted result for one workflow.
    #[derive(Debug, Clone)]
    pub enum ScriptedOutcome {
        /// Succeed after the given delay.
        SucceedAfter(Duration),
        /// Fail with the given message after the given delay.
        FailAfter(Duration, String),
        /// Never resolve (used to exercise monitor timeout handling).
        NeverResolves,
    }

    struct FakeHandle {
        outcome: ScriptedOutcome,
    }

    #[async_trait]
    impl WorkflowHandle for FakeHandle {
        async fn wait(&self) -> Result<WorkflowOutcome, String> {
            match &self.outcome {
                ScriptedOutcome::SucceedAfter(delay) => {
                    tokio::time::sleep(*delay).await;
                    Ok(WorkflowOutcome::Success)
                }
                ScriptedOutcome::FailAfter(delay, message) => {
                    tokio::time::sleep(*delay).await;
                    Ok(WorkflowOutcome::Failure(message.clone()))
                }
                ScriptedOutcome::NeverResolves => std::future::pending().await,
            }
        }
    }

    /// In-memory gateway. Tests register a scripted outcome per workflow
    /// name before dispatching; `start` assigns a fresh workflow id.
    #[derive(Default)]
    pub struct FakeWorkflowGateway {
        scripts: Mutex<HashMap<String, ScriptedOutcome>>,
        cancelled: Mutex<Vec<String>>,
        next_id: Mutex<u64>,
    }

    impl FakeWorkflowGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the outcome for the test named `test_name` (matched
        /// against the `name` field the orchestrator embeds in the start
        /// input).
        pub fn script(&self, test_name: &str, outcome: ScriptedOutcome) {
            self.scripts
                .lock()
                .unwrap()
                .insert(test_name.to_string(), outcome);
        }

        /// Workflow ids this gateway has been asked to cancel, in call order.
        pub fn cancelled_ids(&self) -> Vec<String> {
            self.cancelled.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkflowGateway for FakeWorkflowGateway {
        async fn start(
            &self,
            _workflow_type: &str,
            _task_queue: &str,
            input: Value,
        ) -> Result<String, String> {
            let test_name = input
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if test_name == "__unreachable__" {
                return Err("engine unreachable".to_string());
            }
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            Ok(format!("wf-{test_name}-{next_id}"))
        }

        fn handle(&self, workflow_id: &str) -> Box<dyn WorkflowHandle> {
            let test_name = workflow_id
                .strip_prefix("wf-")
                .and_then(|rest| rest.rsplit_once('-'))
                .map(|(name, _)| name.to_string())
                .unwrap_or_default();
            let outcome = self
                .scripts
                .lock()
                .unwrap()
                .get(&test_name)
                .cloned()
                .unwrap_or(ScriptedOutcome::SucceedAfter(Duration::from_millis(1)));
            Box::new(FakeHandle { outcome })
        }

        async fn cancel(&self, workflow_id: &str) -> Result<(), String> {
            self.cancelled.lock().unwrap().push(workflow_id.to_string());
            Ok(())
        }
    }
}
