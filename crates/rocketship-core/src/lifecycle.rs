// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run Lifecycle Manager: converts a submitted suite into N test
//! workflow starts, spawns monitors, and owns finalization/aggregation
//! and cancellation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::gateway::WorkflowGateway;
use crate::log_bus::LogBus;
use crate::model::{LogColor, LogLine, Run, RunContext, RunStatus, Suite};
use crate::monitor::spawn_monitor;
use crate::registry::RunRegistry;

/// Fixed workflow-type passed to every `WorkflowGateway::start` call.
pub const TEST_WORKFLOW_TYPE: &str = "rocketship.test_execution";

/// How long a terminal Run's log channel stays subscribable after its
/// last line, so a `StreamLogs` caller that raced the finalization still
/// observes the summary line before the channel is torn down.
const LOG_RETIRE_GRACE: Duration = Duration::from_secs(5);

/// Schedule `log_bus`'s channel for `run_id` to be retired (and every live
/// `StreamLogs` subscription closed) after the grace period elapses.
fn schedule_log_retire(log_bus: &LogBus, run_id: &str) {
    let log_bus = log_bus.clone();
    let run_id = run_id.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(LOG_RETIRE_GRACE).await;
        log_bus.retire(&run_id);
    });
}

/// Outcome of [`LifecycleManager::cancel_run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelSummary {
    pub cancelled: usize,
    pub errors: usize,
}

/// Drives Run/Test state transitions on top of the Registry, the
/// Gateway, and the Log Bus.
#[derive(Clone)]
pub struct LifecycleManager {
    registry: RunRegistry,
    log_bus: LogBus,
    gateway: Arc<dyn WorkflowGateway>,
    monitor_timeout: Duration,
    task_queue: String,
}

impl LifecycleManager {
    pub fn new(
        registry: RunRegistry,
        log_bus: LogBus,
        gateway: Arc<dyn WorkflowGateway>,
        monitor_timeout: Duration,
        task_queue: String,
    ) -> Self {
        Self {
            registry,
            log_bus,
            gateway,
            monitor_timeout,
            task_queue,
        }
    }

    /// Expand `suite` into one workflow start per test.
    #[instrument(skip(self, suite, context), fields(suite = %suite.name))]
    pub async fn create_run(
        &self,
        suite: Suite,
        context: RunContext,
    ) -> Result<String, CoreError> {
        let run_id = Uuid::new_v4().to_string();
        self.registry
            .create_run(run_id.clone(), suite.name.clone(), context.clone())
            .await;
        self.log_bus.publish(
            &run_id,
            LogLine::plain(format!("Test run: \"{}\" started", suite.name)).with_bold(true),
        );

        let mut started_ids = Vec::new();
        let mut start_failure: Option<(String, String)> = None;

        for test in &suite.tests {
            let input = json!({
                "name": test.name,
                "steps": test.steps,
                "run_id": run_id,
                "context": context,
            });

            match self
                .gateway
                .start(TEST_WORKFLOW_TYPE, &self.task_queue, input)
                .await
            {
                Ok(workflow_id) => {
                    self.registry
                        .insert_test(&run_id, workflow_id.clone(), test.name.clone())
                        .await?;
                    self.log_bus.publish(
                        &run_id,
                        LogLine::plain(format!("Test: \"{}\" started", test.name))
                            .with_color(LogColor::Purple)
                            .with_test_name(test.name.clone()),
                    );
                    started_ids.push(workflow_id.clone());
                    spawn_monitor(
                        self.gateway.clone(),
                        self.registry.clone(),
                        self.log_bus.clone(),
                        run_id.clone(),
                        workflow_id,
                        test.name.clone(),
                        self.monitor_timeout,
                    );
                }
                Err(reason) => {
                    warn!(test = %test.name, %reason, "failed to start test workflow");
                    start_failure = Some((test.name.clone(), reason));
                    break;
                }
            }
        }

        if let Some((failed_test_name, reason)) = start_failure {
            // The run fails outright and every already-started test is
            // cancelled.
            for workflow_id in &started_ids {
                let _ = self.gateway.cancel(workflow_id).await;
            }
            self.registry.force_failed(&run_id).await?;

            if started_ids.is_empty() {
                // Nothing ever started: report this as a failure to create
                // the run at all, rather than a Run that silently sits
                // Failed with no caller ever having seen the run id.
                schedule_log_retire(&self.log_bus, &run_id);
                return Err(CoreError::EngineUnavailable {
                    run_id: Some(run_id),
                    reason,
                });
            }

            self.log_bus.publish(
                &run_id,
                LogLine::plain(format!(
                    "Test: \"{failed_test_name}\" failed to start: {reason}"
                ))
                .with_bold(true)
                .with_color(LogColor::Red)
                .with_test_name(failed_test_name),
            );
        }

        if suite.tests.is_empty() {
            // No tests at all: nothing will ever transition, so finalize
            // immediately as a trivial pass (zero failed, zero timed out).
            if let Some(run) = self.registry.finalize_if_empty(&run_id).await? {
                emit_finalization_line(&self.log_bus, &run);
            }
        }

        info!(%run_id, "run created");
        Ok(run_id)
    }

    /// Cancel a Run immediately and best-effort cancel its workflows.
    #[instrument(skip(self))]
    pub async fn cancel_run(&self, run_id: &str) -> Result<CancelSummary, CoreError> {
        let pending_test_ids = self.registry.cancel_run(run_id).await?;
        let mut summary = CancelSummary::default();
        for test_id in pending_test_ids {
            match self.gateway.cancel(&test_id).await {
                Ok(()) => summary.cancelled += 1,
                Err(_) => summary.errors += 1,
            }
        }
        if let Ok(run) = self.registry.get(run_id).await {
            emit_finalization_line(&self.log_bus, &run);
        }
        Ok(summary)
    }

    pub async fn list_runs(&self) -> Vec<Run> {
        self.registry.list().await
    }

    pub async fn get_run(&self, id_or_prefix: &str) -> Result<Run, CoreError> {
        self.registry.get(id_or_prefix).await
    }

    pub fn log_bus(&self) -> &LogBus {
        &self.log_bus
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }
}

/// Emit the terminal summary line for a just-finalized Run, and schedule
/// its log channel to be retired once the grace period elapses. Shared
/// by the Test Monitor (normal finalization), create_run's empty-suite
/// fast path, and `cancel_run`.
pub fn emit_finalization_line(log_bus: &LogBus, run: &Run) {
    if !run.status.is_terminal() {
        return;
    }
    let counts = run.test_counts();
    let line = match run.status {
        RunStatus::Passed => Some(LogLine::plain(format!(
            "Test run: \"{}\" finished. All {} tests passed.",
            run.suite_name, counts.total
        ))),
        RunStatus::Failed if counts.timed_out == 0 => Some(LogLine::plain(format!(
            "Test run: \"{}\" finished. {}/{} tests passed, {}/{} tests failed.",
            run.suite_name, counts.passed, counts.total, counts.failed, counts.total
        ))),
        RunStatus::Failed => Some(LogLine::plain(format!(
            "Test run: \"{}\" finished. {}/{} tests passed, {}/{} tests failed, {}/{} tests timed out.",
            run.suite_name,
            counts.passed,
            counts.total,
            counts.failed,
            counts.total,
            counts.timed_out,
            counts.total
        ))),
        // Cancellation is reported by CancelRun's own response, not a log line.
        RunStatus::Cancelled => None,
        RunStatus::Pending | RunStatus::Running => unreachable!("checked is_terminal above"),
    };
    if let Some(line) = line {
        log_bus.publish(&run.run_id, line.with_bold(true));
    }
    schedule_log_retire(log_bus, &run.run_id);
}
