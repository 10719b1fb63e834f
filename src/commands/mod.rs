//! Command handlers for the recon CLI and MCP server.
//!
//! This module contains implementations for all CLI subcommands and the session operations the
//! MCP tools call into.

mod check;
mod detail;
mod init;
mod mcp;
mod reconcile;

use crate::session::SessionView;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use check::check;
pub use detail::{detail, registration_detail};
pub use init::init;
pub use mcp::mcp;
pub use reconcile::{
    check_file, close_session, edit_matching_log, finalize, select_file, toggle_candidate,
    view_session,
};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to both the command line and MCP server interfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Renders a session view as text: a headline, the summary and one line per deposit.
fn render(headline: &str, view: &SessionView) -> String {
    let mut text = headline.to_string();
    if let Some(file_name) = &view.file_name {
        text.push_str(&format!(
            "\nFile: {file_name} (event {})",
            view.event_id.as_deref().unwrap_or("?")
        ));
    }
    text.push_str(&format!("\nState: {}", view.state));
    if view.checked_at.is_some() || view.summary.total_deals > 0 {
        text.push_str(&format!("\n{}", view.summary));
    }
    for deal in &view.deals {
        text.push('\n');
        text.push_str(&deal.line());
    }
    text
}
