//! Runs a sample of conversations and judges the outcomes.

mod orchestrator;
mod report;

pub use orchestrator::{classify, Campaign, TestOutcome};
pub use report::{natural_cmp, TestRecord, TestReport, REPORT_VERSION};
