use crate::api::{self, Backend};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::RegistrationDetail;
use crate::utils;
use crate::{Config, Mode, Result};
use anyhow::Context;

/// Looks up one registration. This is read-only and never touches a reconciliation session.
pub async fn detail(
    config: &Config,
    mode: Mode,
    registration_id: &str,
) -> Result<Out<RegistrationDetail>> {
    let backend = api::backend(config, mode).pub_result(ErrorType::Config)?;
    registration_detail(backend.as_ref(), registration_id).await
}

/// Same as `detail` with an existing backend.
pub async fn registration_detail(
    backend: &dyn Backend,
    registration_id: &str,
) -> Result<Out<RegistrationDetail>> {
    let detail = backend
        .registration(registration_id)
        .await
        .with_context(|| format!("Unable to load registration '{registration_id}'"))
        .pub_result(ErrorType::Detail)?;
    let message = format!(
        "Registration {}: {} ({}), {}, status {}",
        detail.registration_id(),
        detail.name(),
        detail.event_category_name(),
        utils::format_amount(detail.amount()),
        detail.payment_status()
    );
    Ok(Out::new(message, detail))
}
