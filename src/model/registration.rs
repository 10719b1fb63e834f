use crate::utils::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The full record of one registration, fetched by id for the read-only detail view. It is
/// never written back into a reconciliation session.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) registration_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) event_category_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) amount: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) registration_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) payment_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) organization_name: String,
    /// Contact details, member lists and anything else the backend returns.
    #[serde(flatten)]
    pub(crate) other_fields: BTreeMap<String, Value>,
}

impl RegistrationDetail {
    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub fn payment_status(&self) -> &str {
        &self.payment_status
    }

    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    pub fn other_fields(&self) -> &BTreeMap<String, Value> {
        &self.other_fields
    }
}

#[test]
fn test_parse_registration_detail() {
    let json = r#"{
        "registrationId": "R-2001",
        "name": "Lee Jiwoo",
        "eventCategoryName": "Full",
        "amount": 70000,
        "registrationDate": "2024-02-01T12:00:00+09:00",
        "paymentStatus": "PENDING",
        "organizationName": null,
        "phone": "010-0000-0000"
    }"#;
    let detail: RegistrationDetail = serde_json::from_str(json).unwrap();
    assert_eq!(detail.registration_id(), "R-2001");
    assert_eq!(detail.amount(), 70000);
    assert_eq!(detail.organization_name(), "");
    assert_eq!(
        detail.other_fields().get("phone"),
        Some(&Value::String("010-0000-0000".into()))
    );
}
