// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entrypoint for the Run Orchestrator Core's gRPC server.

mod grpcapi;

use std::sync::Arc;

use anyhow::Result;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rocketship_core::{
    Config, LifecycleManager, LogBus, RunRegistry, UnconfiguredWorkflowGateway, WorkflowGateway,
};
use rocketship_proto::proto::engine_server::EngineServer;
use rocketship_proto::proto::FILE_DESCRIPTOR_SET;

use grpcapi::EngineGrpcApi;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rocketship_server=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.grpc_addr, "starting rocketship-server");

    let registry = RunRegistry::new();
    let log_bus = LogBus::new(config.log_bus_buffer_len, config.log_bus_channel_depth);

    // The durable workflow engine is a third-party boundary that this
    // repository does not reimplement. A concrete deployment replaces this
    // with a client for its chosen engine behind the same `WorkflowGateway`
    // trait; until then every run fails to start with EngineUnavailable.
    let gateway: Arc<dyn WorkflowGateway> = Arc::new(UnconfiguredWorkflowGateway::new());

    let lifecycle = LifecycleManager::new(
        registry,
        log_bus,
        gateway,
        config.monitor_timeout,
        config.task_queue.clone(),
    );

    let engine_api = EngineGrpcApi {
        lifecycle: lifecycle.clone(),
    };

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<EngineServer<EngineGrpcApi>>()
        .await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build()?;

    let server = Server::builder()
        .add_service(reflection_service)
        .add_service(health_service)
        .add_service(EngineServer::new(engine_api))
        .serve(config.grpc_addr);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining in-flight monitors in the background");
        }
    }

    Ok(())
}
