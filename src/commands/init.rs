use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the recon home directory and an initial `config.json`.
///
/// # Arguments
/// - `recon_home` - The directory that will be the root of the home directory, e.g. `$HOME/recon`
/// - `api_url` - The base URL of the registration backend, e.g. `https://admin.example.com/api`
/// - `event_id` - Optional default event for commands that do not name one.
///
/// # Errors
/// - Returns an error if the URL is unusable or any file operations fail.
pub async fn init(recon_home: &Path, api_url: &str, event_id: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(recon_home, api_url, event_id.map(str::to_string))
        .await
        .context("Unable to create the recon directory and config")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the recon config at {}",
        config.config_path().display()
    )
    .into())
}
