// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Test Monitor: one task per live Test. Blocks on the workflow
//! handle under a bounded deadline, then writes the outcome back to the
//! registry and emits the corresponding log line.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{instrument, warn};

use crate::error::CoreError;
use crate::gateway::{WorkflowGateway, WorkflowOutcome};
use crate::log_bus::LogBus;
use crate::model::{LogColor, LogLine, TestStatus};
use crate::registry::RunRegistry;

/// Spawn a detached monitor task bound to `(run_id, test_id)`. Monitors
/// hold only ids, never direct pointers into the registry.
///
/// The monitor never holds a registry lock across the blocking wait; the
/// lock is acquired only for the status write inside [`RunRegistry::finish_test`].
/// A second, supervising task awaits the monitor's `JoinHandle`: if the
/// monitor panics, the test is recorded Failed instead of being left
/// Pending forever.
#[instrument(skip(gateway, registry, log_bus), fields(%run_id, %test_id))]
pub fn spawn_monitor(
    gateway: Arc<dyn WorkflowGateway>,
    registry: RunRegistry,
    log_bus: LogBus,
    run_id: String,
    test_id: String,
    test_name: String,
    deadline: Duration,
) {
    let sup_registry = registry.clone();
    let sup_log_bus = log_bus.clone();
    let sup_run_id = run_id.clone();
    let sup_test_id = test_id.clone();
    let sup_test_name = test_name.clone();

    let task = tokio::spawn(run_monitor(
        gateway, registry, log_bus, run_id, test_id, test_name, deadline,
    ));

    tokio::spawn(async move {
        if let Err(join_err) = task.await {
            warn!(%join_err, "monitor task panicked, recording test as failed");
            record_panic(
                &sup_registry,
                &sup_log_bus,
                &sup_run_id,
                &sup_test_id,
                &sup_test_name,
                &join_err,
            )
            .await;
        }
    });
}

async fn run_monitor(
    gateway: Arc<dyn WorkflowGateway>,
    registry: RunRegistry,
    log_bus: LogBus,
    run_id: String,
    test_id: String,
    test_name: String,
    deadline: Duration,
) {
    let handle = gateway.handle(&test_id);

    let outcome = tokio::time::timeout(deadline, handle.wait()).await;

    let status = match outcome {
        // Monitor deadline elapsed before the workflow produced a
        // verdict: the workflow itself is not cancelled.
        Err(_) => TestStatus::Timeout,
        Ok(Ok(WorkflowOutcome::Success)) => TestStatus::Passed,
        Ok(Ok(WorkflowOutcome::Failure(_))) => TestStatus::Failed,
        // The gateway's own wait failed (transport-level); treated as
        // a test failure.
        Ok(Err(_)) => TestStatus::Failed,
    };

    let line = match &status {
        TestStatus::Passed => LogLine::plain(format!("Test: \"{test_name}\" passed"))
            .with_color(LogColor::Green)
            .with_bold(true),
        TestStatus::Failed => {
            let reason = match outcome_reason(&outcome) {
                Some(reason) => reason,
                None => "unknown error".to_string(),
            };
            LogLine::plain(format!("Test: \"{test_name}\" failed: {reason}"))
                .with_color(LogColor::Red)
                .with_bold(true)
        }
        TestStatus::Timeout => LogLine::plain(format!("Test: \"{test_name}\" timed out"))
            .with_color(LogColor::Red)
            .with_bold(true),
        TestStatus::Pending => unreachable!("monitor only produces terminal statuses"),
    }
    .with_test_name(test_name.clone());

    log_bus.publish(&run_id, line);

    match registry.finish_test(&run_id, &test_id, status).await {
        Ok(Some(finalized)) => {
            crate::lifecycle::emit_finalization_line(&log_bus, &finalized);
        }
        Ok(None) => {}
        Err(err) => warn!(%err, "monitor could not record test outcome: run vanished"),
    }
}

/// Record a panicked monitor's test as Failed with an internal-error
/// reason, so the Run still finalizes instead of waiting forever on a
/// Test that will never transition.
async fn record_panic(
    registry: &RunRegistry,
    log_bus: &LogBus,
    run_id: &str,
    test_id: &str,
    test_name: &str,
    join_err: &JoinError,
) {
    let reason = CoreError::Internal {
        detail: join_err.to_string(),
    }
    .to_string();
    let line = LogLine::plain(format!("Test: \"{test_name}\" failed: {reason}"))
        .with_color(LogColor::Red)
        .with_bold(true)
        .with_test_name(test_name.to_string());
    log_bus.publish(run_id, line);

    match registry.finish_test(run_id, test_id, TestStatus::Failed).await {
        Ok(Some(finalized)) => crate::lifecycle::emit_finalization_line(log_bus, &finalized),
        Ok(None) => {}
        Err(err) => warn!(%err, "monitor panic recovery could not record test outcome: run vanished"),
    }
}

fn outcome_reason(
    outcome: &Result<Result<WorkflowOutcome, String>, tokio::time::error::Elapsed>,
) -> Option<String> {
    match outcome {
        Ok(Ok(WorkflowOutcome::Failure(message))) => Some(message.clone()),
        Ok(Err(message)) => Some(message.clone()),
        _ => None,
    }
}
