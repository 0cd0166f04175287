// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run Registry: the authoritative in-memory map of active runs and
//! their child tests. Owns all mutation of Run/Test status fields under a
//! single reader/writer lock per run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::model::{Run, RunContext, RunStatus, Test, TestStatus};

struct RunEntry {
    run: RwLock<Run>,
}

/// Authoritative store of Run/Test records.
///
/// Each run is guarded by its own lock: mutations take the
/// writer side, snapshots take the reader side, and the registry map
/// itself is only locked briefly to find or insert a run's entry.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, Arc<RunEntry>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new Pending Run with an empty test map.
    pub async fn create_run(&self, run_id: String, suite_name: String, context: RunContext) {
        let run = Run {
            run_id: run_id.clone(),
            suite_name,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            context,
            tests: Default::default(),
        };
        let entry = Arc::new(RunEntry {
            run: RwLock::new(run),
        });
        self.runs.write().await.insert(run_id, entry);
    }

    async fn entry(&self, run_id: &str) -> Result<Arc<RunEntry>, CoreError> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| CoreError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Insert a Test record and, if the Run is still Pending, promote it
    /// to Running.
    pub async fn insert_test(
        &self,
        run_id: &str,
        test_id: String,
        name: String,
    ) -> Result<(), CoreError> {
        let entry = self.entry(run_id).await?;
        let mut run = entry.run.write().await;
        run.tests.insert(
            test_id.clone(),
            Test {
                test_id,
                name,
                status: TestStatus::Pending,
                started_at: Utc::now(),
                ended_at: None,
            },
        );
        if run.status == RunStatus::Pending {
            run.status = RunStatus::Running;
        }
        Ok(())
    }

    /// Apply a Test's terminal transition and run the run finalizer in
    /// the same writer critical section, so two concurrent terminal
    /// transitions on the same Run can never race into two different Run
    /// terminal statuses.
    ///
    /// Returns `Some(run.clone())` if this call finalized the Run (i.e.
    /// this was the transition that observed zero pending tests), so the
    /// caller can emit the summary log line exactly once.
    pub async fn finish_test(
        &self,
        run_id: &str,
        test_id: &str,
        status: TestStatus,
    ) -> Result<Option<Run>, CoreError> {
        debug_assert!(status.is_terminal());
        let entry = self.entry(run_id).await?;
        let mut run = entry.run.write().await;

        if let Some(test) = run.tests.get_mut(test_id) {
            // A Test's status never rolls back from terminal.
            if !test.status.is_terminal() {
                test.status = status;
                test.ended_at = Some(Utc::now());
            }
        }

        let counts = run.test_counts();
        if counts.pending > 0 {
            return Ok(None);
        }
        if run.status.is_terminal() {
            // Already finalized (e.g. Cancelled) or a
            // concurrent transition finalized it first under this same
            // writer lock.
            return Ok(None);
        }

        run.status = if counts.failed == 0 && counts.timed_out == 0 {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        run.ended_at = Some(Utc::now());
        Ok(Some(run.clone()))
    }

    /// Force a Run straight to Failed, bypassing the usual
    /// all-tests-terminal finalization gate. Used only for the
    /// start-failure path, where the run must fail before any monitor
    /// could possibly finalize it.
    pub async fn force_failed(&self, run_id: &str) -> Result<Run, CoreError> {
        let entry = self.entry(run_id).await?;
        let mut run = entry.run.write().await;
        run.status = RunStatus::Failed;
        run.ended_at = Some(Utc::now());
        Ok(run.clone())
    }

    /// Finalize a Run that has no tests at all as a trivial pass. Returns
    /// `None` if the run already has tests or is already terminal.
    pub async fn finalize_if_empty(&self, run_id: &str) -> Result<Option<Run>, CoreError> {
        let entry = self.entry(run_id).await?;
        let mut run = entry.run.write().await;
        if !run.tests.is_empty() || run.status.is_terminal() {
            return Ok(None);
        }
        run.status = RunStatus::Passed;
        run.ended_at = Some(Utc::now());
        Ok(Some(run.clone()))
    }

    /// Mark a Run Cancelled immediately. Returns the Test ids that
    /// were not yet terminal at the moment of cancellation, so the caller
    /// can best-effort cancel their workflows.
    pub async fn cancel_run(&self, run_id: &str) -> Result<Vec<String>, CoreError> {
        let entry = self.entry(run_id).await?;
        let mut run = entry.run.write().await;
        if run.status.is_terminal() {
            return Ok(Vec::new());
        }
        let pending: Vec<String> = run
            .tests
            .values()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.test_id.clone())
            .collect();
        run.status = RunStatus::Cancelled;
        run.ended_at = Some(Utc::now());
        Ok(pending)
    }

    /// Point-in-time snapshot of all known runs.
    pub async fn list(&self) -> Vec<Run> {
        let runs = self.runs.read().await;
        let mut out = Vec::with_capacity(runs.len());
        for entry in runs.values() {
            out.push(entry.run.read().await.clone());
        }
        out
    }

    /// Look up a Run by exact id, or by a ≤12-char prefix.
    pub async fn get(&self, id_or_prefix: &str) -> Result<Run, CoreError> {
        let runs = self.runs.read().await;
        if let Some(entry) = runs.get(id_or_prefix) {
            return Ok(entry.run.read().await.clone());
        }
        if id_or_prefix.len() <= 12 {
            let mut matches = Vec::new();
            for (id, entry) in runs.iter() {
                if id.starts_with(id_or_prefix) {
                    matches.push(entry.clone());
                }
            }
            return match matches.len() {
                0 => Err(CoreError::RunNotFound {
                    run_id: id_or_prefix.to_string(),
                }),
                1 => Ok(matches[0].run.read().await.clone()),
                n => Err(CoreError::Ambiguous {
                    prefix: id_or_prefix.to_string(),
                    matches: n,
                }),
            };
        }
        Err(CoreError::RunNotFound {
            run_id: id_or_prefix.to_string(),
        })
    }

    /// Whether a Run id is known, without cloning the whole record.
    pub async fn contains(&self, run_id: &str) -> bool {
        self.runs.read().await.contains_key(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prefix_lookup_matches_unique_run() {
        let registry = RunRegistry::new();
        registry
            .create_run("abcdefghijklmnop".into(), "suite".into(), RunContext::default())
            .await;
        let run = registry.get("abcdefghijkl").await.unwrap();
        assert_eq!(run.run_id, "abcdefghijklmnop");
    }

    #[tokio::test]
    async fn prefix_lookup_is_ambiguous_with_two_matches() {
        let registry = RunRegistry::new();
        registry
            .create_run("abc111".into(), "suite".into(), RunContext::default())
            .await;
        registry
            .create_run("abc222".into(), "suite".into(), RunContext::default())
            .await;
        let err = registry.get("abc").await.unwrap_err();
        assert!(matches!(err, CoreError::Ambiguous { matches: 2, .. }));
    }

    #[tokio::test]
    async fn finalizes_passed_when_all_tests_pass() {
        let registry = RunRegistry::new();
        registry
            .create_run("run-1".into(), "suite".into(), RunContext::default())
            .await;
        registry
            .insert_test("run-1", "t1".into(), "auth".into())
            .await
            .unwrap();
        registry
            .insert_test("run-1", "t2".into(), "checkout".into())
            .await
            .unwrap();

        assert!(registry
            .finish_test("run-1", "t1", TestStatus::Passed)
            .await
            .unwrap()
            .is_none());
        let finalized = registry
            .finish_test("run-1", "t2", TestStatus::Passed)
            .await
            .unwrap()
            .expect("second transition finalizes the run");
        assert_eq!(finalized.status, RunStatus::Passed);
        assert!(finalized.ended_at.is_some());
    }

    #[tokio::test]
    async fn only_one_terminal_transition_under_concurrent_finishes() {
        let registry = Arc::new(RunRegistry::new());
        registry
            .create_run("run-1".into(), "suite".into(), RunContext::default())
            .await;
        for i in 0..8 {
            registry
                .insert_test("run-1", format!("t{i}"), format!("test-{i}"))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .finish_test("run-1", &format!("t{i}"), TestStatus::Passed)
                    .await
                    .unwrap()
            }));
        }
        let mut finalizations = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                finalizations += 1;
            }
        }
        assert_eq!(finalizations, 1);
    }

    #[tokio::test]
    async fn cancelled_run_is_not_resurrected_by_late_transitions() {
        let registry = RunRegistry::new();
        registry
            .create_run("run-1".into(), "suite".into(), RunContext::default())
            .await;
        registry
            .insert_test("run-1", "t1".into(), "auth".into())
            .await
            .unwrap();
        registry.cancel_run("run-1").await.unwrap();

        let result = registry
            .finish_test("run-1", "t1", TestStatus::Passed)
            .await
            .unwrap();
        assert!(result.is_none());
        let run = registry.get("run-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_status_never_rolls_back_from_terminal() {
        let registry = RunRegistry::new();
        registry
            .create_run("run-1".into(), "suite".into(), RunContext::default())
            .await;
        registry
            .insert_test("run-1", "t1".into(), "auth".into())
            .await
            .unwrap();
        registry
            .finish_test("run-1", "t1", TestStatus::Failed)
            .await
            .unwrap();
        registry
            .finish_test("run-1", "t1", TestStatus::Passed)
            .await
            .unwrap();
        let run = registry.get("run-1").await.unwrap();
        assert_eq!(run.tests["t1"].status, TestStatus::Failed);
    }
}
