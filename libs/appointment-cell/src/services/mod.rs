pub mod eligibility;
pub mod lifecycle;
pub mod query;
