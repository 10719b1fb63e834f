//! The interactive reconciliation operations. Each one acts on a `SharedSession` and reports the
//! resulting view, so the caller always sees the recomputed summary and classifications.

use crate::api::Backend;
use crate::commands::{render, Out};
use crate::error::{ErrorType, IntoResult};
use crate::session::{SessionView, SharedSession};
use crate::{Config, Result};
use std::path::Path;

/// Chooses the bank export to reconcile. `event_id` falls back to the configured default.
pub async fn select_file(
    session: &SharedSession,
    config: &Config,
    path: &Path,
    event_id: Option<&str>,
) -> Result<Out<SessionView>> {
    let event_id = config
        .resolve_event_id(event_id)
        .pub_result(ErrorType::Config)?;
    let view = session.select_file(path, &event_id).await?;
    Ok(Out::new(
        render("Selected the file; call check_file to run the matcher", &view),
        view,
    ))
}

/// Sends the selected file to the matcher and loads its proposals.
pub async fn check_file(
    session: &SharedSession,
    backend: &dyn Backend,
) -> Result<Out<SessionView>> {
    let view = session.check(backend).await?;
    Ok(Out::new(render("Matcher result", &view), view))
}

pub async fn toggle_candidate(
    session: &SharedSession,
    deal_index: usize,
    registration_index: usize,
) -> Result<Out<SessionView>> {
    let (value, view) = session.toggle(deal_index, registration_index).await?;
    let headline = match value {
        Some(true) => format!("Checked candidate {registration_index} of deposit {deal_index}"),
        Some(false) => format!("Unchecked candidate {registration_index} of deposit {deal_index}"),
        None => "Nothing to toggle; check a file first".to_string(),
    };
    Ok(Out::new(render(&headline, &view), view))
}

pub async fn edit_matching_log(
    session: &SharedSession,
    deal_index: usize,
    text: String,
) -> Result<Out<SessionView>> {
    let (edited, view) = session.edit_log(deal_index, text).await?;
    let headline = if edited {
        format!("Updated the matching log of deposit {deal_index}")
    } else {
        "Nothing to edit; check a file first".to_string()
    };
    Ok(Out::new(render(&headline, &view), view))
}

/// Sends the whole working state to the finalizer.
pub async fn finalize(session: &SharedSession, backend: &dyn Backend) -> Result<Out<SessionView>> {
    let view = session.finalize(backend).await?;
    Ok(Out::new(
        render("Finalized; payment statuses were updated", &view),
        view,
    ))
}

/// Discards the session. Always succeeds.
pub async fn close_session(session: &SharedSession) -> Result<Out<SessionView>> {
    let view = session.close().await;
    Ok(Out::new(render("Session closed", &view), view))
}

pub async fn view_session(session: &SharedSession) -> Result<Out<SessionView>> {
    let view = session.view().await;
    Ok(Out::new(render("Current session", &view), view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classification;
    use crate::session::SessionState;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_reconcile_flow() {
        let env = TestEnv::new().await;
        let config = env.config();
        let backend = env.backend();
        let session = SharedSession::new();

        let out = toggle_candidate(&session, 0, 0).await.unwrap();
        assert!(out.message().starts_with("Nothing to toggle"));

        let path = env.write_file("march.xls", b"sheet").await;
        select_file(&session, &config, &path, None).await.unwrap();
        let out = check_file(&session, backend.as_ref()).await.unwrap();
        assert!(out.message().contains("[3] unmatched"), "{}", out.message());

        let out = toggle_candidate(&session, 2, 1).await.unwrap();
        assert!(out.message().starts_with("Checked candidate 1 of deposit 2"));
        let view = out.structure().unwrap();
        assert_eq!(view.deals[2].classification, Classification::Matched);
        assert!(view.deals[2].amount_settled);

        edit_matching_log(&session, 2, "confirmed by email".into())
            .await
            .unwrap();
        let out = finalize(&session, backend.as_ref()).await.unwrap();
        assert_eq!(out.structure().unwrap().state, SessionState::Submitted);
        let sent = &env.get_state().finalized[0];
        assert_eq!(sent[2].matching_log(), "confirmed by email");

        let out = close_session(&session).await.unwrap();
        assert_eq!(out.structure().unwrap().state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_view_session_idle() {
        let session = SharedSession::new();
        let out = view_session(&session).await.unwrap();
        assert!(out.message().contains("State: idle"), "{}", out.message());
    }
}
