//! The backend collaborators: the matcher service (`check`), the finalizer (`finalize`), and the
//! registration detail lookup. They are reached through the `Backend` trait so that the session
//! can run against either the live HTTP API or an in-memory test backend.

mod http;
mod test_backend;

use crate::error::Res;
use crate::model::{DepositRecord, MatcherRecord, RegistrationDetail};
use crate::upload::Upload;
use crate::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) use http::HttpBackend;
pub(crate) use test_backend::TestBackend;
#[cfg(test)]
pub(crate) use test_backend::{Gate, TestBackendState};

/// When this environment variable is set and non-empty, the in-memory test backend is used
/// instead of the HTTP API.
pub const TEST_MODE_ENV: &str = "RECON_IN_TEST_MODE";

/// Whether we are talking to the live backend or to the in-memory test backend.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    Testing,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// Returns `Mode::Testing` when `RECON_IN_TEST_MODE` is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Live,
        }
    }
}

/// The backend operations a reconciliation session needs.
///
/// Methods take `&self` so that a single backend can be shared between a session and the
/// read-only detail view while a call is in flight.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Uploads the file to the matcher and returns its proposed pairings, un-normalized.
    async fn check(&self, upload: &Upload) -> Res<Vec<MatcherRecord>>;

    /// Sends the full working state to the finalizer. Only candidates with `checked = true` are
    /// expected to change payment status; the payload is not filtered here.
    async fn finalize(&self, event_id: &str, deals: &[DepositRecord]) -> Res<()>;

    /// Fetches one registration for the read-only detail view.
    async fn registration(&self, registration_id: &str) -> Res<RegistrationDetail>;
}

/// Creates the backend selected by `mode`.
pub(crate) fn backend(config: &Config, mode: Mode) -> Res<Arc<dyn Backend>> {
    Ok(match mode {
        Mode::Live => Arc::new(HttpBackend::new(config)?),
        Mode::Testing => Arc::new(TestBackend::new(config.api_url())),
    })
}

/// Picks the most useful message out of an error response. The backend puts a human-readable
/// explanation in `message` or `error`; when neither is present we fall back to `fallback`.
pub(crate) fn server_message(body: &str, fallback: impl Into<String>) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_field = |field: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(field))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    from_field("message")
        .or_else(|| from_field("error"))
        .unwrap_or_else(|| fallback.into())
}
