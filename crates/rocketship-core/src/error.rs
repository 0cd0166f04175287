// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error taxonomy for the Run Orchestrator Core.
//!
//! Every error surfaced by a component converts into [`CoreError`], which
//! carries a stable error code and converts to [`tonic::Status`] at the
//! gRPC edge.

use std::fmt;

use tonic::Status;

/// Errors surfaced by the orchestrator core.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// The submitted suite failed parse/validate by the external validator.
    InvalidSuite {
        /// Why the suite was rejected.
        reason: String,
    },

    /// The workflow engine could not be reached to dispatch any test.
    EngineUnavailable {
        /// The run, if one had already been created before the failure.
        run_id: Option<String>,
        /// The underlying transport error.
        reason: String,
    },

    /// No Run matches the supplied id or prefix.
    RunNotFound {
        /// The id or prefix that was looked up.
        run_id: String,
    },

    /// A prefix lookup matched more than one Run.
    Ambiguous {
        /// The prefix that matched multiple runs.
        prefix: String,
        /// How many runs matched.
        matches: usize,
    },

    /// An unexpected internal failure (e.g. a recovered monitor panic).
    Internal {
        /// Diagnostic detail, not shown verbatim to untrusted callers.
        detail: String,
    },
}

impl CoreError {
    /// Stable, machine-matchable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSuite { .. } => "INVALID_SUITE",
            Self::EngineUnavailable { .. } => "ENGINE_UNAVAILABLE",
            Self::RunNotFound { .. } => "RUN_NOT_FOUND",
            Self::Ambiguous { .. } => "AMBIGUOUS_RUN_ID",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSuite { reason } => write!(f, "invalid suite: {reason}"),
            Self::EngineUnavailable { run_id, reason } => match run_id {
                Some(id) => write!(f, "workflow engine unavailable for run '{id}': {reason}"),
                None => write!(f, "workflow engine unavailable: {reason}"),
            },
            Self::RunNotFound { run_id } => write!(f, "run '{run_id}' not found"),
            Self::Ambiguous { prefix, matches } => {
                write!(f, "prefix '{prefix}' matches {matches} runs, expected one")
            }
            Self::Internal { detail } => write!(f, "internal error: {detail}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<CoreError> for Status {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidSuite { .. } => Status::invalid_argument(message),
            CoreError::EngineUnavailable { .. } => Status::unavailable(message),
            CoreError::RunNotFound { .. } => Status::not_found(message),
            CoreError::Ambiguous { .. } => Status::failed_precondition(message),
            CoreError::Internal { .. } => Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let cases = [
            (
                CoreError::InvalidSuite {
                    reason: "bad yaml".into(),
                },
                "INVALID_SUITE",
            ),
            (
                CoreError::EngineUnavailable {
                    run_id: None,
                    reason: "connection refused".into(),
                },
                "ENGINE_UNAVAILABLE",
            ),
            (
                CoreError::RunNotFound {
                    run_id: "abc123".into(),
                },
                "RUN_NOT_FOUND",
            ),
            (
                CoreError::Ambiguous {
                    prefix: "abc".into(),
                    matches: 2,
                },
                "AMBIGUOUS_RUN_ID",
            ),
            (
                CoreError::Internal {
                    detail: "panic".into(),
                },
                "INTERNAL",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn status_codes_map_to_expected_grpc_codes() {
        assert_eq!(
            Status::from(CoreError::InvalidSuite {
                reason: "x".into()
            })
            .code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(
            Status::from(CoreError::RunNotFound {
                run_id: "x".into()
            })
            .code(),
            tonic::Code::NotFound
        );
        assert_eq!(
            Status::from(CoreError::Ambiguous {
                prefix: "x".into(),
                matches: 2
            })
            .code(),
            tonic::Code::FailedPrecondition
        );
        assert_eq!(
            Status::from(CoreError::EngineUnavailable {
                run_id: None,
                reason: "x".into()
            })
            .code(),
            tonic::Code::Unavailable
        );
        assert_eq!(
            Status::from(CoreError::Internal { detail: "x".into() }).code(),
            tonic::Code::Internal
        );
    }

    #[test]
    fn display_includes_run_id_when_present() {
        let err = CoreError::EngineUnavailable {
            run_id: Some("run-1".into()),
            reason: "timeout".into(),
        };
        assert_eq!(
            err.to_string(),
            "workflow engine unavailable for run 'run-1': timeout"
        );
    }
}
