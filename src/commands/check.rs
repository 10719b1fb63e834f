use crate::api;
use crate::commands::{render, Out};
use crate::error::{ErrorType, IntoResult};
use crate::session::{Session, SessionView};
use crate::upload::Upload;
use crate::{Config, Mode, Result};
use std::path::Path;

/// Uploads `file` to the matcher and reports what it proposes, without finalizing anything.
///
/// The event is `event_id` when given, otherwise the default from `config.json`.
pub async fn check(
    config: Config,
    mode: Mode,
    file: &Path,
    event_id: Option<&str>,
) -> Result<Out<SessionView>> {
    let event_id = config
        .resolve_event_id(event_id)
        .pub_result(ErrorType::Config)?;
    let upload = Upload::open(file, event_id)
        .await
        .pub_result(ErrorType::Validation)?;
    let backend = api::backend(&config, mode).pub_result(ErrorType::Config)?;

    let mut session = Session::new();
    session.select_file(upload)?;
    session.check(backend.as_ref()).await?;
    let view = session.view();
    let message = render("Matcher result (dry run, nothing was finalized)", &view);
    Ok(Out::new(message, view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_check_dry_run() {
        let env = TestEnv::new().await;
        let path = env.write_file("march.xlsx", b"sheet").await;
        let out = check(env.config(), Mode::Testing, &path, None).await.unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.state, SessionState::Checked);
        assert_eq!(view.event_id.as_deref(), Some("EV-TEST"));
        assert!(out.message().contains("5 deposits"), "{}", out.message());
        assert!(out.message().contains("Unknown Sender"));
        assert!(env.get_state().finalized.is_empty());
    }

    #[tokio::test]
    async fn test_check_rejects_csv() {
        let env = TestEnv::new().await;
        let path = env.write_file("march.csv", b"a,b").await;
        let err = check(env.config(), Mode::Testing, &path, Some("EV-2"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(env.get_state().checks.is_empty());
    }
}
