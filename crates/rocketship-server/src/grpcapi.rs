// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine gRPC Facade: implements `rocketship.v1.Engine` on top of the
//! Lifecycle Manager, Run Registry, and Log Bus.

use std::pin::Pin;

use futures::Stream;
use tonic::{Request, Response, Status};
use tracing::instrument;

use rocketship_core::{CoreError, LifecycleManager, Suite};
use rocketship_proto::proto::engine_server::Engine;
use rocketship_proto::proto::{
    AddLogRequest, AddLogResponse, CreateRunRequest, CreateRunResponse, HealthRequest,
    HealthResponse, ListRunsRequest, ListRunsResponse, LogLine as ProtoLogLine, LogStreamRequest,
    RunSummary as ProtoRunSummary,
};

/// `rocketship.v1.Engine` implementation. Holds the single shared
/// [`LifecycleManager`], which in turn owns the gateway, registry, and
/// log bus.
pub struct EngineGrpcApi {
    pub lifecycle: LifecycleManager,
}

type LogStream = Pin<Box<dyn Stream<Item = Result<ProtoLogLine, Status>> + Send + 'static>>;

#[async_trait::async_trait]
impl Engine for EngineGrpcApi {
    type StreamLogsStream = LogStream;

    #[instrument(skip(self, request))]
    async fn create_run(
        &self,
        request: Request<CreateRunRequest>,
    ) -> Result<Response<CreateRunResponse>, Status> {
        let req = request.into_inner();
        let suite: Suite = serde_json::from_slice(&req.yaml_payload).map_err(|e| {
            Status::from(CoreError::InvalidSuite {
                reason: e.to_string(),
            })
        })?;
        let context = Default::default();
        let run_id = self
            .lifecycle
            .create_run(suite, context)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(CreateRunResponse { run_id }))
    }

    #[instrument(skip(self, request))]
    async fn stream_logs(
        &self,
        request: Request<LogStreamRequest>,
    ) -> Result<Response<Self::StreamLogsStream>, Status> {
        let run_id = request.into_inner().run_id;
        if !self.lifecycle.registry().contains(&run_id).await {
            return Err(Status::from(CoreError::RunNotFound { run_id }));
        }
        let mut subscription = self.lifecycle.log_bus().subscribe(&run_id);

        let stream = async_stream::stream! {
            while let Some(line) = subscription.recv().await {
                yield Ok(to_proto_log_line(line));
            }
        };
        Ok(Response::new(Box::pin(stream) as Self::StreamLogsStream))
    }

    #[instrument(skip(self, request))]
    async fn add_log(
        &self,
        request: Request<AddLogRequest>,
    ) -> Result<Response<AddLogResponse>, Status> {
        let req = request.into_inner();
        if !self.lifecycle.registry().contains(&req.run_id).await {
            return Err(Status::from(CoreError::RunNotFound {
                run_id: req.run_id,
            }));
        }
        let line = rocketship_core::LogLine {
            ts: chrono::Utc::now(),
            message: req.message,
            color: parse_color(&req.color),
            bold: req.bold,
            test_name: req.test_name,
            step_name: req.step_name,
        };
        self.lifecycle.log_bus().publish(&req.run_id, line);
        Ok(Response::new(AddLogResponse {}))
    }

    #[instrument(skip(self))]
    async fn list_runs(
        &self,
        _request: Request<ListRunsRequest>,
    ) -> Result<Response<ListRunsResponse>, Status> {
        let runs = self.lifecycle.list_runs().await;
        let runs = runs
            .into_iter()
            .map(|run| {
                let summary = run.summary();
                ProtoRunSummary {
                    run_id: summary.run_id,
                    status: summary.status.wire_str().to_string(),
                    started_at: summary.started_at.to_rfc3339(),
                    ended_at: summary.ended_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                }
            })
            .collect();
        Ok(Response::new(ListRunsResponse { runs }))
    }

    #[instrument(skip(self))]
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            status: "ok".to_string(),
        }))
    }
}

fn parse_color(color: &str) -> rocketship_core::LogColor {
    match color {
        "green" => rocketship_core::LogColor::Green,
        "red" => rocketship_core::LogColor::Red,
        "purple" => rocketship_core::LogColor::Purple,
        _ => rocketship_core::LogColor::None,
    }
}

fn to_proto_log_line(line: rocketship_core::LogLine) -> ProtoLogLine {
    ProtoLogLine {
        ts: line.ts.to_rfc3339(),
        msg: line.message,
        color: line.color.as_wire_str().to_string(),
        bold: line.bold,
        test_name: line.test_name,
        step_name: line.step_name,
    }
}
