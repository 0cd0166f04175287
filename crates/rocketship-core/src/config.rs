// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process configuration, loaded once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

/// Typed process configuration for the Run Orchestrator Core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the `rocketship.v1.Engine` gRPC server.
    pub grpc_addr: SocketAddr,
    /// Wall-clock deadline for a single Test Monitor.
    pub monitor_timeout: Duration,
    /// Per-run ring buffer capacity for the Log Bus.
    pub log_bus_buffer_len: usize,
    /// Per-subscriber outbound channel depth for the Log Bus.
    pub log_bus_channel_depth: usize,
    /// Task queue name passed to every `WorkflowGateway::start` call.
    pub task_queue: String,
}

/// Failure loading [`Config`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

fn env_or(key: &'static str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Every field has a usable default except none are required; invalid
    /// (present but unparsable) values fail fast with [`ConfigError::Invalid`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let grpc_addr = env_or("ROCKETSHIP_GRPC_ADDR", "0.0.0.0:7700")
            .parse()
            .map_err(|e| ConfigError::Invalid("ROCKETSHIP_GRPC_ADDR", format!("{e}")))?;

        let monitor_timeout_secs: u64 = env_or("ROCKETSHIP_MONITOR_TIMEOUT_SECS", "1800")
            .parse()
            .map_err(|e| {
                ConfigError::Invalid("ROCKETSHIP_MONITOR_TIMEOUT_SECS", format!("{e}"))
            })?;

        let log_bus_buffer_len: usize = env_or("ROCKETSHIP_LOG_BUFFER_LEN", "1024")
            .parse()
            .map_err(|e| ConfigError::Invalid("ROCKETSHIP_LOG_BUFFER_LEN", format!("{e}")))?;

        let log_bus_channel_depth: usize = env_or("ROCKETSHIP_LOG_CHANNEL_DEPTH", "32")
            .parse()
            .map_err(|e| ConfigError::Invalid("ROCKETSHIP_LOG_CHANNEL_DEPTH", format!("{e}")))?;

        let task_queue = env_or("ROCKETSHIP_TASK_QUEUE", "rocketship-tests");

        Ok(Self {
            grpc_addr,
            monitor_timeout: Duration::from_secs(monitor_timeout_secs),
            log_bus_buffer_len,
            log_bus_channel_depth,
            task_queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for key in [
            "ROCKETSHIP_GRPC_ADDR",
            "ROCKETSHIP_MONITOR_TIMEOUT_SECS",
            "ROCKETSHIP_LOG_BUFFER_LEN",
            "ROCKETSHIP_LOG_CHANNEL_DEPTH",
            "ROCKETSHIP_TASK_QUEUE",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn defaults_apply_when_unset() {
        clear_env();
        let config = Config::from_env().expect("defaults must be valid");
        assert_eq!(config.grpc_addr.to_string(), "0.0.0.0:7700");
        assert_eq!(config.monitor_timeout, Duration::from_secs(1800));
        assert_eq!(config.log_bus_buffer_len, 1024);
        assert_eq!(config.log_bus_channel_depth, 32);
        assert_eq!(config.task_queue, "rocketship-tests");
    }

    #[test]
    fn invalid_addr_is_rejected() {
        clear_env();
        unsafe { std::env::set_var("ROCKETSHIP_GRPC_ADDR", "not-an-addr") };
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("ROCKETSHIP_GRPC_ADDR", _)));
        clear_env();
    }
}
