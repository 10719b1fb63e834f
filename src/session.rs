//! A reconciliation session: one upload, one matcher result, one finalize.
//!
//! The session owns the working `ReconciliationTable` and is the only thing that mutates it. The
//! two backend calls (`check` and `finalize`) are split into a `begin_*` step that hands out a
//! ticket and a `complete_*` step that applies the response. Anything that throws the working
//! state away (`select_file`, `close`) bumps the session's generation, and a ticket from an older
//! generation is never applied. This lets the shared form release its lock while a call is in
//! flight without a late response overwriting a session the operator already closed.

use crate::api::Backend;
use crate::error::{Error, ErrorType, IntoResult, Res};
use crate::model::{DealView, DepositRecord, MatcherRecord, Summary};
use crate::table::ReconciliationTable;
use crate::upload::Upload;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The externally visible state of a session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No file selected.
    Idle,
    /// A file is selected but has not been checked.
    FileSelected,
    /// The matcher call is in flight.
    Checking,
    /// The working state is populated and editable.
    Checked,
    /// The finalize call is in flight.
    Submitting,
    /// Finalize succeeded. Terminal.
    Submitted,
}

serde_plain::derive_display_from_serialize!(SessionState);
serde_plain::derive_fromstr_from_deserialize!(SessionState);

#[derive(Debug, Clone, Eq, PartialEq)]
struct Working {
    upload: Upload,
    table: ReconciliationTable,
    checked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
enum Stage {
    #[default]
    Idle,
    FileSelected(Upload),
    /// `previous` is the working state of a re-check, restored if the check fails.
    Checking {
        upload: Upload,
        previous: Option<Working>,
    },
    Checked(Working),
    Submitting(Working),
    Submitted {
        upload: Upload,
        summary: Summary,
    },
}

/// Permission to apply one matcher response.
#[derive(Debug)]
pub struct CheckTicket {
    generation: u64,
    upload: Upload,
}

impl CheckTicket {
    pub fn upload(&self) -> &Upload {
        &self.upload
    }
}

/// Permission to apply one finalize response. Carries the exact payload to send.
#[derive(Debug)]
pub struct FinalizeTicket {
    generation: u64,
    event_id: String,
    deals: Vec<DepositRecord>,
}

impl FinalizeTicket {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn deals(&self) -> &[DepositRecord] {
        &self.deals
    }
}

/// A snapshot of the session for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: SessionState,
    pub file_name: Option<String>,
    pub event_id: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub summary: Summary,
    pub deals: Vec<DealView>,
}

/// One reconciliation session. See the module documentation.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    generation: u64,
    stage: Stage,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            generation: 0,
            stage: Stage::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match &self.stage {
            Stage::Idle => SessionState::Idle,
            Stage::FileSelected(_) => SessionState::FileSelected,
            Stage::Checking { .. } => SessionState::Checking,
            Stage::Checked(_) => SessionState::Checked,
            Stage::Submitting(_) => SessionState::Submitting,
            Stage::Submitted { .. } => SessionState::Submitted,
        }
    }

    /// The working state, while there is one.
    pub fn table(&self) -> Option<&ReconciliationTable> {
        match &self.stage {
            Stage::Checked(w) | Stage::Submitting(w) => Some(&w.table),
            _ => None,
        }
    }

    /// The selected file, if any.
    pub fn upload(&self) -> Option<&Upload> {
        match &self.stage {
            Stage::Idle => None,
            Stage::FileSelected(upload)
            | Stage::Checking { upload, .. }
            | Stage::Submitted { upload, .. } => Some(upload),
            Stage::Checked(w) | Stage::Submitting(w) => Some(&w.upload),
        }
    }

    /// Selects a new file, discarding any previous result. Not allowed while a call is in flight
    /// or after the session was finalized.
    pub fn select_file(&mut self, upload: Upload) -> crate::Result<()> {
        match self.state() {
            SessionState::Checking => {
                return session_error("A check is in progress; wait for it before choosing a file")
            }
            SessionState::Submitting => {
                return session_error("Finalize is in progress; wait for it before choosing a file")
            }
            SessionState::Submitted => {
                return session_error(
                    "This session was already finalized; close it to start a new one",
                )
            }
            _ => {}
        }
        if self.table().is_some() {
            debug!("Discarding the previous matcher result");
        }
        self.next_generation();
        info!(
            "Selected {} for event {}",
            upload.file_name(),
            upload.event_id()
        );
        self.stage = Stage::FileSelected(upload);
        Ok(())
    }

    /// Starts a matcher call for the selected file. Valid after a file is selected or to re-check
    /// a result that is already loaded.
    pub fn begin_check(&mut self) -> crate::Result<CheckTicket> {
        let (upload, previous) = match std::mem::take(&mut self.stage) {
            Stage::FileSelected(upload) => (upload, None),
            Stage::Checked(working) => (working.upload.clone(), Some(working)),
            other => {
                let state = self.restore(other);
                return session_error(match state {
                    SessionState::Idle => "Select a file before checking it",
                    SessionState::Checking => "A check is already in progress",
                    SessionState::Submitting => "Finalize is in progress",
                    _ => "This session was already finalized; close it to start a new one",
                });
            }
        };
        let ticket = CheckTicket {
            generation: self.generation,
            upload: upload.clone(),
        };
        self.stage = Stage::Checking { upload, previous };
        Ok(ticket)
    }

    /// Applies a matcher response. A failure returns the session to where it was before the
    /// check, and a response for a closed session is dropped.
    pub fn complete_check(
        &mut self,
        ticket: CheckTicket,
        result: Res<Vec<MatcherRecord>>,
    ) -> crate::Result<Summary> {
        if self.is_stale(ticket.generation, "matcher") {
            return session_error(
                "The matcher response arrived after the session was closed and was discarded",
            );
        }
        let (upload, previous) = match std::mem::take(&mut self.stage) {
            Stage::Checking { upload, previous } => (upload, previous),
            other => {
                self.restore(other);
                return session_error("No check is in progress");
            }
        };
        match result {
            Ok(raw) => {
                let table = ReconciliationTable::ingest(&raw);
                let summary = table.summary();
                info!("Matcher result for {}: {summary}", upload.file_name());
                self.stage = Stage::Checked(Working {
                    upload,
                    table,
                    checked_at: Utc::now(),
                });
                Ok(summary)
            }
            Err(e) => {
                warn!("Check failed for {}: {e:#}", upload.file_name());
                self.stage = match previous {
                    Some(working) => Stage::Checked(working),
                    None => Stage::FileSelected(upload),
                };
                Err(e).pub_result(ErrorType::Matcher)
            }
        }
    }

    /// Flips one candidate. Returns the new value, or `None` when there is no working state.
    pub fn toggle(
        &mut self,
        deal_index: usize,
        registration_index: usize,
    ) -> crate::Result<Option<bool>> {
        match &mut self.stage {
            Stage::Checked(w) => w
                .table
                .toggle_candidate(deal_index, registration_index)
                .map(Some)
                .pub_result(ErrorType::Validation),
            Stage::Checking { .. } => session_error("A check is in progress"),
            Stage::Submitting(_) => session_error("Finalize is in progress"),
            _ => {
                debug!("Toggle ignored; there is no working state");
                Ok(None)
            }
        }
    }

    /// Replaces one deposit's matching log. Returns `false` when there is no working state.
    pub fn edit_log(&mut self, deal_index: usize, text: impl Into<String>) -> crate::Result<bool> {
        match &mut self.stage {
            Stage::Checked(w) => w
                .table
                .edit_matching_log(deal_index, text)
                .map(|_| true)
                .pub_result(ErrorType::Validation),
            Stage::Checking { .. } => session_error("A check is in progress"),
            Stage::Submitting(_) => session_error("Finalize is in progress"),
            _ => {
                debug!("Matching log edit ignored; there is no working state");
                Ok(false)
            }
        }
    }

    /// Starts a finalize call carrying the whole working state. An empty result cannot be
    /// finalized.
    pub fn begin_finalize(&mut self) -> crate::Result<FinalizeTicket> {
        let working = match std::mem::take(&mut self.stage) {
            Stage::Checked(working) => working,
            other => {
                let state = self.restore(other);
                return session_error(match state {
                    SessionState::Submitting => "Finalize is already in progress",
                    SessionState::Checking => "A check is in progress",
                    SessionState::Submitted => "This session was already finalized",
                    _ => "Check a file before finalizing",
                });
            }
        };
        if working.table.is_empty() {
            self.stage = Stage::Checked(working);
            return Err(Error::new(
                ErrorType::Validation,
                anyhow!("Nothing to finalize: the matcher returned no deposit records"),
            ));
        }
        let ticket = FinalizeTicket {
            generation: self.generation,
            event_id: working.upload.event_id().to_string(),
            deals: working.table.deals().to_vec(),
        };
        self.stage = Stage::Submitting(working);
        Ok(ticket)
    }

    /// Applies a finalize response. On failure the working state is kept exactly as it was so
    /// the operator can retry without re-uploading.
    pub fn complete_finalize(
        &mut self,
        ticket: FinalizeTicket,
        result: Res<()>,
    ) -> crate::Result<Summary> {
        if self.is_stale(ticket.generation, "finalizer") {
            return session_error(match &result {
                Ok(()) => "The session was closed while finalizing. The finalizer applied the \
                    reconciliation on the server, but the result was not kept in this session"
                    .to_string(),
                Err(e) => format!(
                    "The session was closed while finalizing, so the finalize outcome is unknown \
                    ({e:#}). It may already have been applied on the server. Check the payment \
                    statuses before finalizing again"
                ),
            });
        }
        let working = match std::mem::take(&mut self.stage) {
            Stage::Submitting(working) => working,
            other => {
                self.restore(other);
                return session_error("No finalize is in progress");
            }
        };
        match result {
            Ok(()) => {
                let summary = working.table.summary();
                info!(
                    "Finalized {} for event {}: {summary}",
                    working.upload.file_name(),
                    ticket.event_id
                );
                self.stage = Stage::Submitted {
                    upload: working.upload,
                    summary,
                };
                Ok(summary)
            }
            Err(e) => {
                warn!("Finalize failed for {}: {e:#}", working.upload.file_name());
                self.stage = Stage::Checked(working);
                Err(e).pub_result(ErrorType::Finalizer)
            }
        }
    }

    /// Discards everything. Valid in every state and never calls the backend. A call that is
    /// still in flight is not cancelled, but its response will not be applied.
    pub fn close(&mut self) {
        if self.state() != SessionState::Idle {
            info!("Closing session {} in state {}", self.id, self.state());
        }
        self.next_generation();
        self.stage = Stage::Idle;
    }

    /// Runs a whole check when the caller owns the session exclusively.
    pub async fn check(&mut self, backend: &dyn Backend) -> crate::Result<Summary> {
        let ticket = self.begin_check()?;
        let result = backend.check(ticket.upload()).await;
        self.complete_check(ticket, result)
    }

    /// Runs a whole finalize when the caller owns the session exclusively.
    pub async fn finalize(&mut self, backend: &dyn Backend) -> crate::Result<Summary> {
        let ticket = self.begin_finalize()?;
        let result = backend.finalize(ticket.event_id(), ticket.deals()).await;
        self.complete_finalize(ticket, result)
    }

    /// Builds a snapshot for display. Summary and classifications are computed fresh.
    pub fn view(&self) -> SessionView {
        let (checked_at, summary, deals) = match &self.stage {
            Stage::Checked(w) | Stage::Submitting(w) => {
                (Some(w.checked_at), w.table.summary(), w.table.views())
            }
            Stage::Submitted { summary, .. } => (None, *summary, Vec::new()),
            _ => (None, Summary::default(), Vec::new()),
        };
        SessionView {
            session_id: self.id,
            state: self.state(),
            file_name: self.upload().map(|u| u.file_name().to_string()),
            event_id: self.upload().map(|u| u.event_id().to_string()),
            checked_at,
            summary,
            deals,
        }
    }

    fn next_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Puts a stage back after `mem::take` and reports its state.
    fn restore(&mut self, stage: Stage) -> SessionState {
        self.stage = stage;
        self.state()
    }

    /// Whether a ticket was issued before the latest `select_file` or `close`.
    fn is_stale(&self, generation: u64, what: &str) -> bool {
        let stale = generation != self.generation;
        if stale {
            warn!("Discarding a late {what} response for session {}", self.id);
        }
        stale
    }
}

fn session_error<T>(message: impl Into<String>) -> crate::Result<T> {
    Err(Error::new(ErrorType::Session, anyhow!(message.into())))
}

/// A session shared between concurrent callers, such as MCP tool calls. The lock is never held
/// while waiting on the backend, so `close` and `view` stay responsive during a check or finalize.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and reads the file, then selects it. An invalid file type is rejected before
    /// anything is read and leaves the session unchanged.
    pub async fn select_file(&self, path: &Path, event_id: &str) -> crate::Result<SessionView> {
        let upload = Upload::open(path, event_id)
            .await
            .pub_result(ErrorType::Validation)?;
        let mut session = self.inner.lock().await;
        session.select_file(upload)?;
        Ok(session.view())
    }

    pub async fn check(&self, backend: &dyn Backend) -> crate::Result<SessionView> {
        let ticket = self.inner.lock().await.begin_check()?;
        let result = backend.check(ticket.upload()).await;
        let mut session = self.inner.lock().await;
        session.complete_check(ticket, result)?;
        Ok(session.view())
    }

    pub async fn toggle(
        &self,
        deal_index: usize,
        registration_index: usize,
    ) -> crate::Result<(Option<bool>, SessionView)> {
        let mut session = self.inner.lock().await;
        let value = session.toggle(deal_index, registration_index)?;
        Ok((value, session.view()))
    }

    pub async fn edit_log(
        &self,
        deal_index: usize,
        text: impl Into<String>,
    ) -> crate::Result<(bool, SessionView)> {
        let mut session = self.inner.lock().await;
        let edited = session.edit_log(deal_index, text)?;
        Ok((edited, session.view()))
    }

    pub async fn finalize(&self, backend: &dyn Backend) -> crate::Result<SessionView> {
        let ticket = self.inner.lock().await.begin_finalize()?;
        let result = backend.finalize(ticket.event_id(), ticket.deals()).await;
        let mut session = self.inner.lock().await;
        session.complete_finalize(ticket, result)?;
        Ok(session.view())
    }

    pub async fn close(&self) -> SessionView {
        let mut session = self.inner.lock().await;
        session.close();
        session.view()
    }

    pub async fn view(&self) -> SessionView {
        self.inner.lock().await.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Gate;
    use crate::model::{Classification, MatcherCandidate};
    use crate::test::TestEnv;

    fn upload(name: &str) -> Upload {
        Upload::new(name, "EV-1", b"sheet".to_vec()).unwrap()
    }

    fn three_deals() -> Vec<MatcherRecord> {
        let candidate = |id: &str| MatcherCandidate {
            registration_id: id.into(),
            amount: 50000,
            ..Default::default()
        };
        vec![
            MatcherRecord {
                description: "Kim".into(),
                deposit_amt: 50000,
                registration_list: vec![candidate("R1"), candidate("R2")],
                ..Default::default()
            },
            MatcherRecord {
                description: "Lee".into(),
                deposit_amt: 50000,
                ..Default::default()
            },
            MatcherRecord {
                description: "Park".into(),
                deposit_amt: 50000,
                registration_list: vec![candidate("R3")],
                ..Default::default()
            },
        ]
    }

    #[tokio::test]
    async fn test_full_flow() {
        let env = TestEnv::new().await;
        let backend = env.backend();
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);

        session.select_file(upload("march.xlsx")).unwrap();
        assert_eq!(session.state(), SessionState::FileSelected);

        let summary = session.check(backend.as_ref()).await.unwrap();
        assert_eq!(session.state(), SessionState::Checked);
        assert_eq!(summary.total_deals, 5);
        assert_eq!(summary.unmatched_deals, 1);
        assert_eq!(summary.checked_count, 1);

        assert_eq!(session.toggle(1, 0).unwrap(), Some(true));
        assert!(session.edit_log(3, "refund requested by phone").unwrap());
        let view = session.view();
        assert_eq!(view.summary.checked_count, 2);
        assert_eq!(view.deals[1].classification, Classification::Matched);
        assert_eq!(view.file_name.as_deref(), Some("march.xlsx"));

        session.finalize(backend.as_ref()).await.unwrap();
        assert_eq!(session.state(), SessionState::Submitted);
        assert!(session.table().is_none());

        let finalized = env.get_state().finalized;
        assert_eq!(finalized.len(), 1);
        let sent = &finalized[0];
        assert_eq!(sent.len(), 5);
        assert!(sent[1].registration_list()[0].checked());
        assert_eq!(sent[3].matching_log(), "refund requested by phone");
        // Unchecked candidates are sent too; the finalizer decides what to do with them.
        assert!(!sent[1].registration_list()[1].checked());
    }

    #[tokio::test]
    async fn test_invalid_file_never_reaches_backend() {
        let env = TestEnv::new().await;
        let shared = SharedSession::new();
        let path = env.write_file("march.csv", b"a,b,c").await;
        let err = shared.select_file(&path, "EV-1").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(err.to_string().contains("not a spreadsheet"), "{err}");
        assert_eq!(shared.view().await.state, SessionState::Idle);
        assert!(env.get_state().checks.is_empty());
    }

    #[tokio::test]
    async fn test_check_failure_keeps_file() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.check_error = Some("Sheet 1 has no deposit column".into());
        env.set_state(state);

        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let err = session.check(env.backend().as_ref()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Matcher);
        assert_eq!(err.to_string(), "Sheet 1 has no deposit column");
        assert_eq!(session.state(), SessionState::FileSelected);

        // Retry after the matcher recovers.
        let mut state = env.get_state();
        state.check_error = None;
        env.set_state(state);
        session.check(env.backend().as_ref()).await.unwrap();
        assert_eq!(session.state(), SessionState::Checked);
    }

    #[tokio::test]
    async fn test_failed_recheck_restores_previous_result() {
        let env = TestEnv::new().await;
        let backend = env.backend();
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        session.check(backend.as_ref()).await.unwrap();
        session.toggle(2, 0).unwrap();
        let before = session.table().cloned();

        let mut state = env.get_state();
        state.check_error = Some("matcher down".into());
        env.set_state(state);
        assert!(session.check(backend.as_ref()).await.is_err());
        assert_eq!(session.state(), SessionState::Checked);
        assert_eq!(session.table().cloned(), before);
    }

    #[tokio::test]
    async fn test_finalize_failure_preserves_state() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.matcher_response = three_deals();
        state.finalize_error = Some("Payment status update failed".into());
        env.set_state(state);
        let backend = env.backend();

        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        session.check(backend.as_ref()).await.unwrap();
        session.toggle(0, 1).unwrap();
        session.edit_log(1, "walk-in payment").unwrap();
        let before = session.table().cloned().unwrap();
        assert_eq!(before.len(), 3);

        let err = session.finalize(backend.as_ref()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Finalizer);
        assert_eq!(err.to_string(), "Payment status update failed");
        assert_eq!(session.state(), SessionState::Checked);
        assert_eq!(session.table(), Some(&before));
        assert!(env.get_state().finalized.is_empty());

        // The operator can keep editing and retry.
        session.toggle(2, 0).unwrap();
        let mut state = env.get_state();
        state.finalize_error = None;
        env.set_state(state);
        session.finalize(backend.as_ref()).await.unwrap();
        assert_eq!(env.get_state().finalized.len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_empty_result_is_rejected() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.matcher_response = Vec::new();
        env.set_state(state);
        let backend = env.backend();

        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let summary = session.check(backend.as_ref()).await.unwrap();
        assert_eq!(summary, Summary::default());

        let err = session.finalize(backend.as_ref()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(err.to_string().contains("Nothing to finalize"), "{err}");
        assert_eq!(session.state(), SessionState::Checked);
        assert!(env.get_state().finalized.is_empty());
    }

    #[tokio::test]
    async fn test_new_file_discards_result() {
        let env = TestEnv::new().await;
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        session.check(env.backend().as_ref()).await.unwrap();
        session.select_file(upload("april.xls")).unwrap();
        assert_eq!(session.state(), SessionState::FileSelected);
        assert!(session.table().is_none());
        assert_eq!(session.upload().unwrap().file_name(), "april.xls");
    }

    #[test]
    fn test_operations_without_working_state() {
        let mut session = Session::new();
        assert_eq!(session.toggle(0, 0).unwrap(), None);
        assert!(!session.edit_log(0, "x").unwrap());
        let err = session.begin_check().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        let err = session.begin_finalize().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        assert_eq!(session.state(), SessionState::Idle);
        session.close();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_out_of_range_toggle_is_validation_error() {
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let ticket = session.begin_check().unwrap();
        session.complete_check(ticket, Ok(three_deals())).unwrap();
        let err = session.toggle(1, 0).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert_eq!(session.state(), SessionState::Checked);
    }

    #[test]
    fn test_in_flight_check_blocks_other_operations() {
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let ticket = session.begin_check().unwrap();
        assert_eq!(session.state(), SessionState::Checking);
        assert!(session.begin_check().is_err());
        assert!(session.select_file(upload("april.xlsx")).is_err());
        assert!(session.toggle(0, 0).is_err());
        assert_eq!(session.state(), SessionState::Checking);
        session.complete_check(ticket, Ok(three_deals())).unwrap();
        assert_eq!(session.state(), SessionState::Checked);
    }

    #[test]
    fn test_late_check_response_is_discarded() {
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let ticket = session.begin_check().unwrap();
        session.close();
        let err = session.complete_check(ticket, Ok(three_deals())).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.table().is_none());
    }

    #[test]
    fn test_late_finalize_response_is_discarded() {
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let ticket = session.begin_check().unwrap();
        session.complete_check(ticket, Ok(three_deals())).unwrap();
        let ticket = session.begin_finalize().unwrap();
        assert_eq!(ticket.deals().len(), 3);
        assert_eq!(session.state(), SessionState::Submitting);
        session.close();
        session.select_file(upload("april.xlsx")).unwrap();
        let err = session.complete_finalize(ticket, Ok(())).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        assert!(err.to_string().contains("applied the reconciliation on the server"));
        assert_eq!(session.state(), SessionState::FileSelected);
    }

    #[test]
    fn test_late_finalize_failure_reports_unknown_outcome() {
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let ticket = session.begin_check().unwrap();
        session.complete_check(ticket, Ok(three_deals())).unwrap();
        let ticket = session.begin_finalize().unwrap();
        session.close();
        let err = session
            .complete_finalize(ticket, Err(anyhow!("operation timed out")))
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        let message = err.to_string();
        assert!(message.contains("finalize outcome is unknown"), "{message}");
        assert!(message.contains("may already have been applied on the server"), "{message}");
        assert!(message.contains("operation timed out"), "{message}");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_view_with_extreme_amounts() {
        let candidate = |id: &str, amount: i64| MatcherCandidate {
            registration_id: id.to_string(),
            amount,
            checked: Some(true),
            ..Default::default()
        };
        let record = MatcherRecord {
            description: "Overflow".to_string(),
            deposit_amt: i64::MAX,
            registration_list: vec![candidate("R1", i64::MAX), candidate("R2", 1)],
            ..Default::default()
        };
        let mut session = Session::new();
        session.select_file(upload("march.xlsx")).unwrap();
        let ticket = session.begin_check().unwrap();
        session.complete_check(ticket, Ok(vec![record])).unwrap();

        let view = session.view();
        assert_eq!(view.deals[0].checked_amount, None);
        assert!(!view.deals[0].amount_settled);

        session.toggle(0, 1).unwrap();
        let view = session.view();
        assert_eq!(view.deals[0].checked_amount, Some(i64::MAX));
        assert!(view.deals[0].amount_settled);
    }

    #[tokio::test]
    async fn test_close_while_check_in_flight() {
        let env = TestEnv::new().await;
        let gate = Gate::default();
        let mut state = env.get_state();
        state.check_gate = Some(gate.clone());
        env.set_state(state);

        let shared = SharedSession::new();
        let path = env.write_file("march.xlsx", b"sheet").await;
        shared.select_file(&path, "EV-1").await.unwrap();

        let backend = env.backend();
        let task = {
            let shared = shared.clone();
            tokio::spawn(async move { shared.check(backend.as_ref()).await })
        };
        gate.wait_entered().await;
        assert_eq!(shared.view().await.state, SessionState::Checking);

        let view = shared.close().await;
        assert_eq!(view.state, SessionState::Idle);
        gate.open();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        let view = shared.view().await;
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.deals.is_empty());
    }

    #[tokio::test]
    async fn test_close_while_finalize_in_flight() {
        let env = TestEnv::new().await;
        let gate = Gate::default();
        let mut state = env.get_state();
        state.finalize_gate = Some(gate.clone());
        env.set_state(state);

        let backend = env.backend();
        let shared = SharedSession::new();
        let path = env.write_file("march.xlsx", b"sheet").await;
        shared.select_file(&path, "EV-1").await.unwrap();
        shared.check(backend.as_ref()).await.unwrap();

        let task = {
            let shared = shared.clone();
            let backend = env.backend();
            tokio::spawn(async move { shared.finalize(backend.as_ref()).await })
        };
        gate.wait_entered().await;
        assert_eq!(shared.view().await.state, SessionState::Submitting);

        let view = shared.close().await;
        assert_eq!(view.state, SessionState::Idle);
        gate.open();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Session);
        assert!(err.to_string().contains("applied the reconciliation on the server"));
        let view = shared.view().await;
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.deals.is_empty());
        // The server still received the whole state.
        let finalized = env.get_state().finalized;
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].len(), 5);
    }

    #[tokio::test]
    async fn test_shared_flow() {
        let env = TestEnv::new().await;
        let backend = env.backend();
        let shared = SharedSession::new();
        let path = env.write_file("march.XLSX", b"sheet").await;
        shared.select_file(&path, "EV-3").await.unwrap();
        let view = shared.check(backend.as_ref()).await.unwrap();
        assert_eq!(view.state, SessionState::Checked);
        assert_eq!(view.deals.len(), 5);
        assert!(view.checked_at.is_some());

        let (value, _) = shared.toggle(4, 1).await.unwrap();
        assert_eq!(value, Some(true));
        let (edited, view) = shared.edit_log(4, "paid for a family member").await.unwrap();
        assert!(edited);
        assert_eq!(view.deals[4].deal.matching_log(), "paid for a family member");

        let view = shared.finalize(backend.as_ref()).await.unwrap();
        assert_eq!(view.state, SessionState::Submitted);
        assert_eq!(env.get_state().checks[0].0, "EV-3");
    }
}
