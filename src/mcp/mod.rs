//! MCP (Model Context Protocol) server implementation.
//!
//! This module provides an MCP server that hosts one reconciliation session and exposes its
//! operations as tools. The MCP host plays the part of the operator's screen. The server
//! communicates via JSON-RPC over stdio.

/// Checks if the server has been initialized and returns an error if not.
macro_rules! require_init {
    ($self:expr) => {
        if !$self.check_initialized().await {
            return Self::uninitialized();
        }
    };
}

mod mcp_utils;
mod tools;

use crate::api::{self, Backend};
use crate::error::{ErrorType, IntoResult};
use crate::session::SharedSession;
use crate::{Config, Mode};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{
    CallToolResult, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::ErrorData as McpError;
use rmcp::{tool_handler, ServerHandler, ServiceExt};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The recon MCP server.
///
/// Tool calls may run concurrently. The session serializes its own state changes and does not
/// block on backend calls, so `close_session` and `view_session` answer while a check is running.
#[derive(Clone)]
pub struct ReconServer {
    initialized: Arc<Mutex<bool>>,
    config: Arc<Config>,
    backend: Arc<dyn Backend>,
    session: SharedSession,
    tool_router: ToolRouter<ReconServer>,
}

impl Debug for ReconServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconServer")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ReconServer {
    /// Creates a new ReconServer with the given configuration.
    pub fn new(config: Config, mode: Mode) -> crate::Result<Self> {
        let backend = api::backend(&config, mode).pub_result(ErrorType::Config)?;
        Ok(Self {
            initialized: Arc::new(Mutex::new(false)),
            config: Arc::new(config),
            backend,
            session: SharedSession::new(),
            tool_router: Self::tool_router(),
        })
    }

    async fn check_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    fn uninitialized() -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::error(vec![rmcp::model::Content::text(
            "You have not yet initialized the service. Please call initialize_service first.",
        )]))
    }
}

#[tool_handler]
impl ServerHandler for ReconServer {
    /// Returns server information sent to the MCP client during initialization. Agents tend to
    /// skip `instructions`, so the full guide is returned by the `initialize_service` tool, which
    /// must be called before anything else.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "recon".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(include_str!("docs/INTRO.md").into()),
        }
    }
}

/// Transport type for the MCP server.
#[derive(Debug, Default)]
pub(crate) enum Io {
    #[default]
    Stdio,
    /// Mock transport for testing - holds one end of a duplex channel.
    #[cfg(test)]
    Mock(tokio::io::DuplexStream),
}

/// Runs the MCP server with stdio transport or mock transport. This function starts the MCP server
/// and blocks until the client disconnects or an error occurs.
///
/// # Arguments
/// - `config`: The `Config` object
/// - `mode`: Whether we are running against the live backend or the test backend
/// - `io`: Whether we are using stdio as the transport or using mock io for testing
///
pub(crate) async fn run_server(config: Config, mode: Mode, io: Io) -> crate::Result<()> {
    let server = ReconServer::new(config, mode)?;
    info!("Starting MCP server...");

    let service = match io {
        Io::Stdio => server
            .serve(stdio())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))
            .pub_result(ErrorType::Service)?,
        #[cfg(test)]
        Io::Mock(stream) => server
            .serve(stream)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))
            .pub_result(ErrorType::Service)?,
    };

    info!("MCP server running, waiting for requests...");

    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))
        .pub_result(ErrorType::Service)?;

    info!("MCP server shut down");
    Ok(())
}
