use crate::model::DepositRecord;
use crate::utils;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How a deposit is highlighted in the reconciliation table.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The matcher proposed no candidates.
    Unmatched,
    /// There are candidates but none of them is checked.
    Mismatched,
    /// At least one candidate is checked, even if others on the same deposit are not.
    Matched,
}

serde_plain::derive_display_from_serialize!(Classification);
serde_plain::derive_fromstr_from_deserialize!(Classification);

/// Counts derived from the working state. Any toggle invalidates all four, so these are never
/// cached.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct Summary {
    pub total_deals: usize,
    pub checked_count: usize,
    pub unchecked_count: usize,
    pub unmatched_deals: usize,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} deposits: {} checked, {} unchecked, {} unmatched",
            self.total_deals, self.checked_count, self.unchecked_count, self.unmatched_deals
        )
    }
}

/// Computes the summary counts for `deals`.
pub fn compute_summary(deals: &[DepositRecord]) -> Summary {
    let mut summary = Summary {
        total_deals: deals.len(),
        ..Default::default()
    };
    for deal in deals {
        if deal.registration_list.is_empty() {
            summary.unmatched_deals += 1;
        }
        for candidate in &deal.registration_list {
            if candidate.checked {
                summary.checked_count += 1;
            } else {
                summary.unchecked_count += 1;
            }
        }
    }
    summary
}

/// Classifies a deposit. See `Classification`.
pub fn classify(deal: &DepositRecord) -> Classification {
    deal.classify()
}

/// A deposit as it is presented to the operator: the record plus its derived display state.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DealView {
    pub index: usize,
    pub classification: Classification,
    /// Sum of the checked candidates' amounts. `None` when the sum overflows.
    pub checked_amount: Option<i64>,
    /// True when the checked amounts add up to exactly the deposit.
    pub amount_settled: bool,
    pub deal: DepositRecord,
}

impl DealView {
    pub fn new(index: usize, deal: &DepositRecord) -> Self {
        let checked_amount = deal.checked_amount();
        Self {
            index,
            classification: deal.classify(),
            checked_amount,
            amount_settled: checked_amount == Some(deal.deposit_amt),
            deal: deal.clone(),
        }
    }

    /// A single human-readable line, e.g. `[0] matched   2024.03.02  Kim Minsu  50,000 (1/2)`.
    pub fn line(&self) -> String {
        let checked = self
            .deal
            .registration_list
            .iter()
            .filter(|c| c.checked)
            .count();
        format!(
            "[{}] {:<10} {}  {}  {} ({}/{})",
            self.index,
            self.classification,
            self.deal.deal_date,
            self.deal.description,
            utils::format_amount(self.deal.deposit_amt),
            checked,
            self.deal.registration_list.len()
        )
    }
}

/// Builds the views for every deal in `deals`.
pub fn deal_views(deals: &[DepositRecord]) -> Vec<DealView> {
    deals
        .iter()
        .enumerate()
        .map(|(ix, deal)| DealView::new(ix, deal))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegistrationCandidate;

    fn candidate(checked: bool) -> RegistrationCandidate {
        RegistrationCandidate {
            checked,
            amount: 50000,
            ..Default::default()
        }
    }

    fn deal(checked: &[bool]) -> DepositRecord {
        DepositRecord {
            deposit_amt: 50000,
            registration_list: checked.iter().map(|c| candidate(*c)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(compute_summary(&[]), Summary::default());
    }

    #[test]
    fn test_summary_counts() {
        let deals = vec![
            deal(&[]),
            deal(&[true, false]),
            deal(&[false, false, false]),
            deal(&[]),
            deal(&[true]),
        ];
        let summary = compute_summary(&deals);
        assert_eq!(summary.total_deals, 5);
        assert_eq!(summary.checked_count, 2);
        assert_eq!(summary.unchecked_count, 4);
        assert_eq!(summary.unmatched_deals, 2);

        let candidates: usize = deals.iter().map(|d| d.registration_list.len()).sum();
        assert_eq!(summary.checked_count + summary.unchecked_count, candidates);
    }

    #[test]
    fn test_partial_agreement_is_matched() {
        assert_eq!(classify(&deal(&[false, true])), Classification::Matched);
        assert_eq!(classify(&deal(&[false, false])), Classification::Mismatched);
        assert_eq!(classify(&deal(&[])), Classification::Unmatched);
    }

    #[test]
    fn test_deal_view_settlement() {
        let view = DealView::new(3, &deal(&[true, false]));
        assert_eq!(view.index, 3);
        assert_eq!(view.checked_amount, Some(50000));
        assert!(view.amount_settled);

        let view = DealView::new(0, &deal(&[true, true]));
        assert_eq!(view.checked_amount, Some(100000));
        assert!(!view.amount_settled);
    }

    #[test]
    fn test_deal_view_extreme_amounts() {
        let mut d = deal(&[true, true]);
        d.deposit_amt = i64::MAX;
        d.registration_list[0].amount = i64::MAX;
        d.registration_list[1].amount = 1;
        let view = DealView::new(0, &d);
        assert_eq!(view.checked_amount, None);
        assert!(!view.amount_settled);

        d.registration_list[1].checked = false;
        let view = DealView::new(0, &d);
        assert_eq!(view.checked_amount, Some(i64::MAX));
        assert!(view.amount_settled);
    }

    #[test]
    fn test_deal_view_line() {
        let mut d = deal(&[true, false]);
        d.deal_date = "2024.03.02".into();
        d.description = "Kim Minsu".into();
        let line = DealView::new(0, &d).line();
        assert!(line.starts_with("[0] matched"), "{line}");
        assert!(line.contains("Kim Minsu"), "{line}");
        assert!(line.contains("50,000 (1/2)"), "{line}");
    }

    #[test]
    fn test_summary_display() {
        let summary = compute_summary(&[deal(&[]), deal(&[true])]);
        assert_eq!(
            summary.to_string(),
            "2 deposits: 1 checked, 0 unchecked, 1 unmatched"
        );
    }
}
