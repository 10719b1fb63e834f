//! Implements the `Backend` trait against the registration system's REST API using `reqwest`.

use crate::api::{server_message, Backend};
use crate::error::Res;
use crate::model::{DepositRecord, MatcherRecord, RegistrationDetail};
use crate::upload::Upload;
use crate::Config;
use anyhow::{bail, Context};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

const SPREADSHEET_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Talks to the backend over HTTP. The base URL comes from `config.json`.
pub(crate) struct HttpBackend {
    base: Url,
    client: Client,
}

impl HttpBackend {
    pub(crate) fn new(config: &Config) -> Res<Self> {
        let base = parse_base(config.api_url())?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self { base, client })
    }

    fn url(&self, segments: &[&str]) -> Res<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("The API URL '{}' cannot be a base", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn check(&self, upload: &Upload) -> Res<Vec<MatcherRecord>> {
        let url = self.url(&["events", upload.event_id(), "payments", "check"])?;
        debug!("Uploading {} to {url}", upload.file_name());
        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.file_name().to_string())
            .mime_str(SPREADSHEET_MIME)
            .context("Unable to build the upload part")?;
        let form = Form::new()
            .text("eventId", upload.event_id().to_string())
            .part("file", part);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send the file to the matcher service")?;
        let records: Vec<MatcherRecord> = json_or_error(response, "Matcher service").await?;
        trace!("Matcher returned {} deposit records", records.len());
        Ok(records)
    }

    async fn finalize(&self, event_id: &str, deals: &[DepositRecord]) -> Res<()> {
        let url = self.url(&["events", event_id, "payments", "finalize"])?;
        debug!("Finalizing {} deposit records at {url}", deals.len());
        let response = self
            .client
            .post(url)
            .json(deals)
            .send()
            .await
            .context("Failed to send the reconciliation to the finalizer")?;
        ensure_success(response, "Finalizer").await?;
        Ok(())
    }

    async fn registration(&self, registration_id: &str) -> Res<RegistrationDetail> {
        let url = self.url(&["registrations", registration_id])?;
        trace!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to request the registration")?;
        json_or_error(response, "Registration lookup").await
    }
}

fn parse_base(api_url: &str) -> Res<Url> {
    let base = Url::parse(api_url).with_context(|| format!("Invalid API URL '{api_url}'"))?;
    if base.cannot_be_a_base() {
        bail!("The API URL '{api_url}' cannot be a base");
    }
    Ok(base)
}

/// Returns the response unchanged if it is a success, otherwise an error carrying the server's
/// own explanation when it gave one.
async fn ensure_success(response: Response, what: &str) -> Res<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    let fallback = format!("{what} responded with status {status}");
    bail!("{}", server_message(&body, fallback))
}

async fn json_or_error<T>(response: Response, what: &str) -> Res<T>
where
    T: DeserializeOwned,
{
    let response = ensure_success(response, what).await?;
    let body = response
        .text()
        .await
        .with_context(|| format!("Unable to read the {what} response"))?;
    serde_json::from_str(&body).with_context(|| format!("Unable to parse the {what} response"))
}
