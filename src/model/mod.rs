//! Types that represent the core data model, such as `DepositRecord` and `RegistrationCandidate`.
mod deposit;
mod registration;
mod summary;

pub use deposit::{DepositRecord, MatcherCandidate, MatcherRecord, RegistrationCandidate};
pub use registration::RegistrationDetail;
pub use summary::{classify, compute_summary, deal_views, Classification, DealView, Summary};
