// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The Run/Test/LogLine data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a Run. Pending is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Cancelled)
    }

    /// The wire enumeration literal for `RunSummary.status`.
    ///
    /// `Cancelled` has no wire enumerator and surfaces as `"FAILED"`.
    pub fn wire_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed | Self::Cancelled => "FAILED",
        }
    }
}

/// Status of a Test. Pending means the workflow has not yet produced a
/// final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Pending,
    Passed,
    Failed,
    Timeout,
}

impl TestStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Attribution context carried by a Run, immutable after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    pub project_id: Option<String>,
    pub source: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub trigger: Option<String>,
    pub schedule_name: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// One declared test within a submitted suite, before it is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

/// One plugin step within a test definition. The orchestrator treats the
/// step body as opaque input to the activity the worker fleet selects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub plugin: String,
    pub input: serde_json::Value,
}

/// An already-validated internal suite representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,
    pub tests: Vec<TestDefinition>,
}

/// One independently-executing unit under a Run.
#[derive(Debug, Clone)]
pub struct Test {
    /// Equal to the workflow id the engine assigned at dispatch.
    pub test_id: String,
    pub name: String,
    pub status: TestStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A single suite submission and its child tests.
#[derive(Debug, Clone)]
pub struct Run {
    pub run_id: String,
    pub suite_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub context: RunContext,
    pub tests: BTreeMap<String, Test>,
}

impl Run {
    /// Counts over the current Test set, used by the finalizer.
    pub fn test_counts(&self) -> TestCounts {
        let mut counts = TestCounts::default();
        for test in self.tests.values() {
            counts.total += 1;
            match test.status {
                TestStatus::Pending => counts.pending += 1,
                TestStatus::Passed => counts.passed += 1,
                TestStatus::Failed => counts.failed += 1,
                TestStatus::Timeout => counts.timed_out += 1,
            }
        }
        counts
    }

    /// A point-in-time, client-facing summary of this Run.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Test status counts used by the finalization tie-break rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub pending: usize,
}

/// A listing-friendly snapshot of a Run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A color tag for a [`LogLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColor {
    None,
    Green,
    Red,
    Purple,
}

impl LogColor {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Green => "green",
            Self::Red => "red",
            Self::Purple => "purple",
        }
    }
}

/// An event on the Log Bus.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub ts: DateTime<Utc>,
    pub message: String,
    pub color: LogColor,
    pub bold: bool,
    pub test_name: Option<String>,
    pub step_name: Option<String>,
}

impl LogLine {
    /// Construct a plain, uncolored, non-bold structural line.
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            message: message.into(),
            color: LogColor::None,
            bold: false,
            test_name: None,
            step_name: None,
        }
    }

    pub fn with_color(mut self, color: LogColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_surfaces_as_failed_on_the_wire() {
        assert_eq!(RunStatus::Cancelled.wire_str(), "FAILED");
        assert_eq!(RunStatus::Failed.wire_str(), "FAILED");
        assert_eq!(RunStatus::Passed.wire_str(), "PASSED");
    }

    #[test]
    fn terminal_statuses_are_classified_correctly() {
        assert!(RunStatus::Passed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());

        assert!(TestStatus::Passed.is_terminal());
        assert!(TestStatus::Timeout.is_terminal());
        assert!(!TestStatus::Pending.is_terminal());
    }
}
