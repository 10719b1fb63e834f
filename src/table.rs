//! The reconciliation table: the editable working copy of one matcher result.
//!
//! All edits are local and synchronous. Nothing here talks to the backend; the session decides
//! when the table is built from a check and when it is sent to the finalizer.

use crate::error::Res;
use crate::model::{compute_summary, deal_views, DealView, DepositRecord, MatcherRecord, Summary};
use anyhow::{bail, Context};
use serde::Serialize;

/// Normalizes a matcher response. Every candidate ends up with an explicit `checked` flag
/// (absent or `null` becomes `false`). `raw` is not modified.
pub fn ingest(raw: &[MatcherRecord]) -> Vec<DepositRecord> {
    raw.iter().map(DepositRecord::from).collect()
}

/// Holds the working state for one reconciliation session.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ReconciliationTable {
    deals: Vec<DepositRecord>,
}

impl ReconciliationTable {
    /// Builds a table from a raw matcher response.
    pub fn ingest(raw: &[MatcherRecord]) -> Self {
        Self { deals: ingest(raw) }
    }

    pub fn deals(&self) -> &[DepositRecord] {
        &self.deals
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    /// Flips the `checked` flag of exactly one candidate and returns its new value.
    pub fn toggle_candidate(&mut self, deal_index: usize, registration_index: usize) -> Res<bool> {
        let deal_count = self.deals.len();
        let deal = self.deals.get_mut(deal_index).with_context(|| {
            format!("Deposit index {deal_index} is out of range ({deal_count} deposits)")
        })?;
        let candidate_count = deal.registration_list.len();
        let candidate = match deal.registration_list.get_mut(registration_index) {
            Some(candidate) => candidate,
            None => bail!(
                "Registration index {registration_index} is out of range for deposit \
                {deal_index} ({candidate_count} candidates)"
            ),
        };
        candidate.checked = !candidate.checked;
        Ok(candidate.checked)
    }

    /// Replaces the matching log of one deposit.
    pub fn edit_matching_log(&mut self, deal_index: usize, text: impl Into<String>) -> Res<()> {
        let deal_count = self.deals.len();
        let deal = self.deals.get_mut(deal_index).with_context(|| {
            format!("Deposit index {deal_index} is out of range ({deal_count} deposits)")
        })?;
        deal.matching_log = text.into();
        Ok(())
    }

    /// Computes fresh summary counts.
    pub fn summary(&self) -> Summary {
        compute_summary(&self.deals)
    }

    /// Builds the per-deposit display views.
    pub fn views(&self) -> Vec<DealView> {
        deal_views(&self.deals)
    }
}
