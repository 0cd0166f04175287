// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! # rocketship-core
//!
//! The Run Orchestrator Core: accepts a validated suite, expands it into
//! independently-executing durable test workflows, coordinates their
//! lifecycle, multiplexes their logs, and aggregates pass/fail.
//!
//! ```text
//!                        ┌─────────────────────────┐
//!   CreateRun ──────────▶│ Lifecycle Manager        │
//!                        │  expands suite → tests   │
//!                        └──────┬─────────┬─────────┘
//!                               │         │ spawns
//!                        start  │         ▼
//!                        ┌──────▼───┐  ┌──────────────┐
//!                        │ Gateway  │  │ Monitor      │ (one per test)
//!                        │ (engine) │  │ awaits wait()│
//!                        └──────────┘  └──────┬───────┘
//!                                             │ writes status
//!                        ┌──────────┐         ▼
//!                        │ Run      │◀────────┘
//!                        │ Registry │  finalizes on last transition
//!                        └────┬─────┘
//!                             │ log lines
//!                             ▼
//!                        ┌──────────┐
//!                        │ Log      │──▶ StreamLogs subscribers
//!                        │ Bus      │
//!                        └──────────┘
//! ```
//!
//! | Run status | Meaning |
//! |---|---|
//! | `Pending` | created, no test started yet |
//! | `Running` | at least one test dispatched |
//! | `Passed` / `Failed` / `Cancelled` | terminal |
//!
//! A Test's status (`Pending` → `Passed` \| `Failed` \| `Timeout`) never
//! rolls back from a terminal value.

/// Process configuration, loaded from the environment.
pub mod config;
/// Error taxonomy shared across every component.
pub mod error;
/// Workflow Client Gateway.
pub mod gateway;
/// Run Lifecycle Manager.
pub mod lifecycle;
/// Log Bus.
pub mod log_bus;
/// The Run/Test/LogLine data model.
pub mod model;
/// Test Monitor.
pub mod monitor;
/// Run Registry.
pub mod registry;

pub use config::{Config, ConfigError};
pub use error::CoreError;
pub use gateway::{UnconfiguredWorkflowGateway, WorkflowGateway, WorkflowHandle, WorkflowOutcome};
pub use lifecycle::{CancelSummary, LifecycleManager};
pub use log_bus::{LogBus, Subscription};
pub use model::*;
pub use registry::RunRegistry;
