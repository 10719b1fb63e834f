//! The reconciliation tools exposed by the MCP server.

use crate::commands;
use crate::mcp::mcp_utils::tool_result;
use crate::mcp::ReconServer;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use rmcp::{tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

/// Parameters for the select_file tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "SelectFileParams")]
pub struct SelectFileParams {
    /// Absolute path to the bank-statement export. Must end in `.xlsx` or `.xls`.
    pub path: PathBuf,

    /// The event whose registrations the deposits are matched against. Defaults to the
    /// `event_id` in the recon config.
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Parameters for the toggle_candidate tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "ToggleCandidateParams")]
pub struct ToggleCandidateParams {
    /// Zero-based index of the deposit, as shown in brackets in the session view.
    pub deal_index: usize,

    /// Zero-based index of the candidate within that deposit's `registrationList`.
    pub registration_index: usize,
}

/// Parameters for the edit_matching_log tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "EditMatchingLogParams")]
pub struct EditMatchingLogParams {
    /// Zero-based index of the deposit.
    pub deal_index: usize,

    /// The new matching log. Replaces the old text entirely; may be empty.
    pub text: String,
}

/// Parameters for the registration_detail tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[schemars(title = "RegistrationDetailParams")]
pub struct RegistrationDetailParams {
    /// The `registrationId` of a candidate.
    pub registration_id: String,
}

#[tool_router(vis = "pub(super)")]
impl ReconServer {
    #[tool]
    /// Initialize the recon MCP service for this session and return usage instructions. You
    /// **MUST** call this **ONCE** before using other tools so that you have the full usage
    /// instructions. You **MAY** call it more than once if you have forgotten the usage
    /// instructions.
    async fn initialize_service(&self) -> Result<CallToolResult, McpError> {
        let mut initialized = self.initialized.lock().await;
        *initialized = true;
        Ok(CallToolResult::success(vec![rmcp::model::Content::text(
            include_str!("docs/INSTRUCTIONS.md"),
        )]))
    }

    /// Choose the bank-statement export to reconcile. Only `.xlsx` and `.xls` files are accepted;
    /// anything else is rejected before the file is read or sent anywhere. Selecting a file
    /// discards any matcher result already loaded. Not allowed while a check or finalize is
    /// running.
    #[tool]
    async fn select_file(
        &self,
        Parameters(params): Parameters<SelectFileParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: select_file called with {}", params.path.display());
        let out = commands::select_file(
            &self.session,
            &self.config,
            &params.path,
            params.event_id.as_deref(),
        )
        .await;
        tool_result(out)
    }

    /// Upload the selected file to the matcher service and load the deposits and their proposed
    /// registration candidates. Also used to re-check the same file, which replaces the current
    /// result. On failure the session returns to where it was and the server's message is
    /// reported.
    #[tool]
    async fn check_file(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: check_file called");
        let out = commands::check_file(&self.session, self.backend.as_ref()).await;
        tool_result(out)
    }

    /// Flip the `checked` flag of one registration candidate. Checking a candidate means its
    /// payment status will be updated when you finalize. Returns the updated session view with
    /// recomputed summary and classifications.
    #[tool]
    async fn toggle_candidate(
        &self,
        Parameters(params): Parameters<ToggleCandidateParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!(
            "MCP: toggle_candidate called with deal_index={}, registration_index={}",
            params.deal_index, params.registration_index
        );
        let out = commands::toggle_candidate(
            &self.session,
            params.deal_index,
            params.registration_index,
        )
        .await;
        tool_result(out)
    }

    /// Replace the matching log (the free-text note) of one deposit. The note is sent to the
    /// finalizer with everything else.
    #[tool]
    async fn edit_matching_log(
        &self,
        Parameters(params): Parameters<EditMatchingLogParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!(
            "MCP: edit_matching_log called with deal_index={}",
            params.deal_index
        );
        let out = commands::edit_matching_log(&self.session, params.deal_index, params.text).await;
        tool_result(out)
    }

    /// Show the current session: its state, the selected file, the summary counts and one line
    /// per deposit with its classification. The JSON content holds the full records.
    #[tool]
    async fn view_session(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let out = commands::view_session(&self.session).await;
        tool_result(out)
    }

    /// Send every deposit, every candidate flag and every matching log to the finalizer in one
    /// call. Checked candidates have their payment status updated by the backend. On failure
    /// nothing is lost: the session stays editable and you can call finalize again. An empty
    /// result cannot be finalized.
    ///
    /// # Caution
    ///
    /// This changes payment records. Confirm with the user before calling it.
    #[tool]
    async fn finalize(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: finalize called");
        let out = commands::finalize(&self.session, self.backend.as_ref()).await;
        tool_result(out)
    }

    /// Discard the session and everything in it without contacting the backend. A check or
    /// finalize that is still running is not cancelled, but its result will be ignored.
    #[tool]
    async fn close_session(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: close_session called");
        let out = commands::close_session(&self.session).await;
        tool_result(out)
    }

    /// Look up one registration by id, read-only. Does not change the session.
    #[tool]
    async fn registration_detail(
        &self,
        Parameters(params): Parameters<RegistrationDetailParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!(
            "MCP: registration_detail called with {}",
            params.registration_id
        );
        let out =
            commands::registration_detail(self.backend.as_ref(), &params.registration_id).await;
        tool_result(out)
    }
}
