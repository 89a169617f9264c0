//! JSON-RPC Server
//!
//! Implements the JSON-RPC 2.0 server over TCP (localhost only).

use crate::handler::RpcHandler;
use crate::types::{GetJobRequest, ListJobsRequest, SubmitDefinitionRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use semantica_core::application::step_managers::StepContext;
use semantica_core::application::Orchestrator;
use semantica_core::port::{JobDefinitionStorage, JobStorage};
use std::sync::Arc;
use tracing::info;

// ADR-020: RPC Server Configuration
// Note: jsonrpsee doesn't support Unix sockets directly (hyper limitation)
// Using TCP on localhost as secure alternative (no external access)
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        job_definition_storage: Arc<dyn JobDefinitionStorage>,
        job_storage: Arc<dyn JobStorage>,
        orchestrator: Arc<Orchestrator>,
        step_ctx: StepContext,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(
                job_definition_storage,
                job_storage,
                orchestrator,
                step_ctx,
            )),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Note: Uses TCP on localhost (not Unix socket) due to jsonrpsee/hyper limitations
    /// Security: Only binds to 127.0.0.1 (no external access)
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("definition.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitDefinitionRequest = params.parse()?;
                    handler.submit_definition(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: GetJobRequest = params.parse()?;
                    handler.get_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListJobsRequest = params.parse()?;
                    handler.list_jobs(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}
