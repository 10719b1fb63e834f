//! Deposit records and their registration candidates, in both the raw form returned by the
//! matcher service and the normalized form held by the reconciliation table.

use crate::model::Classification;
use crate::utils::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One bank-transaction row together with the registrations the matcher proposes for it.
///
/// This is the normalized form: every candidate carries an explicit `checked` flag.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    /// Transaction date exactly as it appeared in the statement.
    pub(crate) deal_date: String,
    /// Depositor name as it appeared in the statement.
    pub(crate) description: String,
    /// Amount in whole currency units.
    pub(crate) deposit_amt: i64,
    /// Transaction type label, e.g. deposit or withdrawal.
    #[serde(rename = "type")]
    pub(crate) deal_type: String,
    /// Whether the matcher believes this is a group payment.
    pub(crate) organization: bool,
    /// Operator-editable annotation.
    pub(crate) matching_log: String,
    pub(crate) registration_list: Vec<RegistrationCandidate>,
    /// Fields we do not model; sent back to the finalizer untouched.
    #[serde(flatten)]
    pub(crate) other_fields: BTreeMap<String, Value>,
}

impl DepositRecord {
    pub fn deal_date(&self) -> &str {
        &self.deal_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn deposit_amt(&self) -> i64 {
        self.deposit_amt
    }

    pub fn deal_type(&self) -> &str {
        &self.deal_type
    }

    pub fn organization(&self) -> bool {
        self.organization
    }

    pub fn matching_log(&self) -> &str {
        &self.matching_log
    }

    pub fn registration_list(&self) -> &[RegistrationCandidate] {
        &self.registration_list
    }

    /// Classifies this deposit for display. See `Classification`.
    pub fn classify(&self) -> Classification {
        if self.registration_list.is_empty() {
            Classification::Unmatched
        } else if self.registration_list.iter().all(|c| !c.checked) {
            Classification::Mismatched
        } else {
            Classification::Matched
        }
    }

    /// The sum of `amount` over the checked candidates, or `None` if it does not fit in an `i64`.
    pub fn checked_amount(&self) -> Option<i64> {
        self.registration_list
            .iter()
            .filter(|c| c.checked)
            .try_fold(0i64, |total, c| total.checked_add(c.amount))
    }
}

/// A registration the matcher proposes as the source of a deposit.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCandidate {
    pub(crate) registration_id: String,
    pub(crate) name: String,
    pub(crate) paymenter_name: String,
    pub(crate) organization_name: String,
    pub(crate) event_category_name: String,
    pub(crate) amount: i64,
    /// ISO-8601 timestamp, kept as text.
    pub(crate) registration_date: String,
    /// The operator's confirmation that this registration was paid by the deposit.
    pub(crate) checked: bool,
    #[serde(flatten)]
    pub(crate) other_fields: BTreeMap<String, Value>,
}

impl RegistrationCandidate {
    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paymenter_name(&self) -> &str {
        &self.paymenter_name
    }

    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    pub fn event_category_name(&self) -> &str {
        &self.event_category_name
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn registration_date(&self) -> &str {
        &self.registration_date
    }

    pub fn checked(&self) -> bool {
        self.checked
    }
}

/// A deposit record as the matcher service returns it. Candidates may omit `checked`, and the
/// display strings may be `null`.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) deal_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) deposit_amt: i64,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub(crate) deal_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) organization: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) matching_log: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) registration_list: Vec<MatcherCandidate>,
    #[serde(flatten)]
    pub(crate) other_fields: BTreeMap<String, Value>,
}

/// A registration candidate as the matcher service returns it.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherCandidate {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) registration_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) paymenter_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) organization_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) event_category_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) amount: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) registration_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) checked: Option<bool>,
    #[serde(flatten)]
    pub(crate) other_fields: BTreeMap<String, Value>,
}

impl From<&MatcherRecord> for DepositRecord {
    fn from(raw: &MatcherRecord) -> Self {
        Self {
            deal_date: raw.deal_date.clone(),
            description: raw.description.clone(),
            deposit_amt: raw.deposit_amt,
            deal_type: raw.deal_type.clone(),
            organization: raw.organization,
            matching_log: raw.matching_log.clone(),
            registration_list: raw
                .registration_list
                .iter()
                .map(RegistrationCandidate::from)
                .collect(),
            other_fields: raw.other_fields.clone(),
        }
    }
}

impl From<&MatcherCandidate> for RegistrationCandidate {
    fn from(raw: &MatcherCandidate) -> Self {
        Self {
            registration_id: raw.registration_id.clone(),
            name: raw.name.clone(),
            paymenter_name: raw.paymenter_name.clone(),
            organization_name: raw.organization_name.clone(),
            event_category_name: raw.event_category_name.clone(),
            amount: raw.amount,
            registration_date: raw.registration_date.clone(),
            checked: raw.checked.unwrap_or(false),
            other_fields: raw.other_fields.clone(),
        }
    }
}
