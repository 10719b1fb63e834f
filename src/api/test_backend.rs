//! Implements the `Backend` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a registration server. Set `RECON_IN_TEST_MODE` to use it.

use crate::api::Backend;
use crate::error::Res;
use crate::model::{DepositRecord, MatcherCandidate, MatcherRecord, RegistrationDetail};
use crate::upload::Upload;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Arc, LazyLock, Mutex};
use tokio::sync::Notify;
use tracing::debug;

/// The state of every test backend, keyed by API URL. Separate tests use separate URLs so they do
/// not see each other's data.
static STATES: LazyLock<Mutex<HashMap<String, TestBackendState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Everything a test backend knows and remembers.
#[derive(Debug, Clone)]
pub(crate) struct TestBackendState {
    /// What the matcher returns for any uploaded file.
    pub(crate) matcher_response: Vec<MatcherRecord>,
    /// Registrations available to the detail lookup.
    pub(crate) registrations: BTreeMap<String, RegistrationDetail>,
    /// `(event_id, file_name)` of every check call.
    pub(crate) checks: Vec<(String, String)>,
    /// Every payload that was successfully finalized.
    pub(crate) finalized: Vec<Vec<DepositRecord>>,
    /// When set, check calls fail with this message.
    pub(crate) check_error: Option<String>,
    /// When set, finalize calls fail with this message.
    pub(crate) finalize_error: Option<String>,
    /// When set, registration lookups fail with this message.
    pub(crate) registration_error: Option<String>,
    /// When set, check calls wait on this gate before answering.
    pub(crate) check_gate: Option<Gate>,
    /// When set, finalize calls wait on this gate before answering.
    pub(crate) finalize_gate: Option<Gate>,
}

impl Default for TestBackendState {
    /// Loads seed data from this module.
    fn default() -> Self {
        // The seed CSVs are compiled in; a parse failure is a bug in this file.
        let matcher_response =
            seed_matcher_response().expect("the test backend seed data must parse");
        let registrations = registrations_from(&matcher_response);
        Self {
            matcher_response,
            registrations,
            checks: Vec::new(),
            finalized: Vec::new(),
            check_error: None,
            finalize_error: None,
            registration_error: None,
            check_gate: None,
            finalize_gate: None,
        }
    }
}

/// Lets a test hold a backend call open. The backend signals `entered` when the call arrives and
/// then waits for `release`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Waits until a call is parked at this gate.
    #[cfg(test)]
    pub(crate) async fn wait_entered(&self) {
        self.entered.notified().await
    }

    /// Lets the parked call continue.
    #[cfg(test)]
    pub(crate) fn open(&self) {
        self.release.notify_one()
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await
    }
}

/// An implementation of the `Backend` trait that does not use the network.
pub(crate) struct TestBackend {
    key: String,
}

impl TestBackend {
    /// Creates a test backend whose state is stored under `key` (the configured API URL).
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Returns a copy of the current state, seeding it if this key has not been used yet.
    pub(crate) fn get_state(&self) -> TestBackendState {
        let mut states = STATES.lock().unwrap_or_else(|e| e.into_inner());
        states.entry(self.key.clone()).or_default().clone()
    }

    /// Replaces the state.
    #[cfg(test)]
    pub(crate) fn set_state(&self, state: TestBackendState) {
        let mut states = STATES.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(self.key.clone(), state);
    }

    fn update<T>(&self, f: impl FnOnce(&mut TestBackendState) -> T) -> T {
        let mut states = STATES.lock().unwrap_or_else(|e| e.into_inner());
        f(states.entry(self.key.clone()).or_default())
    }
}

#[async_trait::async_trait]
impl Backend for TestBackend {
    async fn check(&self, upload: &Upload) -> Res<Vec<MatcherRecord>> {
        let gate = self.update(|state| {
            state
                .checks
                .push((upload.event_id().to_string(), upload.file_name().to_string()));
            state.check_gate.clone()
        });
        if let Some(gate) = gate {
            gate.pass().await;
        }
        let state = self.get_state();
        if let Some(message) = state.check_error {
            bail!("{message}");
        }
        debug!(
            "Test matcher returning {} records for {}",
            state.matcher_response.len(),
            upload.file_name()
        );
        Ok(state.matcher_response)
    }

    async fn finalize(&self, event_id: &str, deals: &[DepositRecord]) -> Res<()> {
        let gate = self.get_state().finalize_gate;
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.update(|state| {
            if let Some(message) = &state.finalize_error {
                bail!("{message}");
            }
            debug!("Test finalizer accepted {} records for {event_id}", deals.len());
            state.finalized.push(deals.to_vec());
            Ok(())
        })
    }

    async fn registration(&self, registration_id: &str) -> Res<RegistrationDetail> {
        let state = self.get_state();
        if let Some(message) = state.registration_error {
            bail!("{message}");
        }
        state
            .registrations
            .get(registration_id)
            .cloned()
            .with_context(|| format!("Registration '{registration_id}' not found"))
    }
}

/// Builds detail records for every candidate in the matcher response.
fn registrations_from(records: &[MatcherRecord]) -> BTreeMap<String, RegistrationDetail> {
    records
        .iter()
        .flat_map(|r| r.registration_list.iter())
        .map(|c| {
            let detail = RegistrationDetail {
                registration_id: c.registration_id.clone(),
                name: c.name.clone(),
                event_category_name: c.event_category_name.clone(),
                amount: c.amount,
                registration_date: c.registration_date.clone(),
                payment_status: "PENDING".to_string(),
                organization_name: c.organization_name.clone(),
                other_fields: BTreeMap::new(),
            };
            (c.registration_id.clone(), detail)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedDeal {
    deal_date: String,
    description: String,
    deposit_amt: i64,
    #[serde(rename = "type")]
    deal_type: String,
    organization: bool,
    matching_log: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCandidate {
    deal: usize,
    registration_id: String,
    name: String,
    paymenter_name: String,
    organization_name: String,
    event_category_name: String,
    amount: i64,
    registration_date: String,
    checked: Option<bool>,
}

/// Builds the seed matcher response from the CSV data in this module.
fn seed_matcher_response() -> Res<Vec<MatcherRecord>> {
    let mut records: Vec<MatcherRecord> = read_csv::<SeedDeal>(DEAL_DATA)?
        .into_iter()
        .map(|d| MatcherRecord {
            deal_date: d.deal_date,
            description: d.description,
            deposit_amt: d.deposit_amt,
            deal_type: d.deal_type,
            organization: d.organization,
            matching_log: d.matching_log,
            ..Default::default()
        })
        .collect();
    for c in read_csv::<SeedCandidate>(CANDIDATE_DATA)? {
        let deal_count = records.len();
        let record = records
            .get_mut(c.deal)
            .with_context(|| format!("Seed candidate refers to deal {} of {deal_count}", c.deal))?;
        record.registration_list.push(MatcherCandidate {
            registration_id: c.registration_id,
            name: c.name,
            paymenter_name: c.paymenter_name,
            organization_name: c.organization_name,
            event_category_name: c.event_category_name,
            amount: c.amount,
            registration_date: c.registration_date,
            checked: c.checked,
            other_fields: BTreeMap::new(),
        });
    }
    Ok(records)
}

/// Loads rows from a CSV-formatted string.
fn read_csv<T>(csv_data: &str) -> Res<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result.context("Unable to parse seed CSV row")?);
    }
    Ok(rows)
}

/// Seed deposit rows, as the matcher would read them from a bank export.
const DEAL_DATA: &str = r##"dealDate,description,depositAmt,type,organization,matchingLog
2024.03.02 10:15:22,Kim Minsu,50000,deposit,false,name and amount match
2024.03.02 11:40:03,Seoul Runners Club,350000,deposit,true,organization name match
2024.03.03 09:05:41,Lee J,60000,deposit,false,amount match only
2024.03.03 14:22:10,Unknown Sender,45000,deposit,false,no registration found
2024.03.04 08:00:00,Park Seoyeon,120000,deposit,false,two registrations by the same payer
"##;

/// Seed candidates; `deal` is the zero-based row in `DEAL_DATA`. An empty `checked` column means
/// the matcher left the field out.
const CANDIDATE_DATA: &str = r##"deal,registrationId,name,paymenterName,organizationName,eventCategoryName,amount,registrationDate,checked
0,R-1001,Kim Minsu,Kim Minsu,,10K,50000,2024-02-20T09:00:00+09:00,true
1,G-2001,Choi Hyun,Seoul Runners Club,Seoul Runners Club,Half,70000,2024-02-11T10:30:00+09:00,
1,G-2002,Jung Ara,Seoul Runners Club,Seoul Runners Club,Half,70000,2024-02-11T10:30:00+09:00,
1,G-2003,Kang Dohyun,Seoul Runners Club,Seoul Runners Club,10K,50000,2024-02-11T10:30:00+09:00,
1,G-2004,Yoon Seo,Seoul Runners Club,Seoul Runners Club,Full,80000,2024-02-11T10:30:00+09:00,
1,G-2005,Han Jimin,Seoul Runners Club,Seoul Runners Club,Full,80000,2024-02-11T10:30:00+09:00,
2,R-1002,Lee Jiwoo,Lee Jiwoo,,Half,60000,2024-02-25T18:12:00+09:00,
2,R-1003,Lee Junho,Lee Junho,,Half,60000,2024-02-26T07:45:00+09:00,false
4,R-1004,Park Seoyeon,Park Seoyeon,,Full,60000,2024-02-28T21:03:00+09:00,
4,R-1005,Park Minjun,Park Seoyeon,,Full,60000,2024-02-28T21:05:00+09:00,
"##;
