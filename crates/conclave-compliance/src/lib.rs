//! Compliance reports built from finished Conclave sessions.
//!
//! # Main types
//!
//! - [`ResponseAggregator`]: Reduces a final transcript to a report.
//! - [`ComplianceReport`]: Per-agent findings plus an overall status.
//! - [`ComplianceStatus`]: `Compliant`, `NonCompliant` or `Inconclusive`.

/// Transcript aggregation.
pub mod aggregator;
/// Compliance report types.
pub mod report;

pub use aggregator::ResponseAggregator;
pub use report::{AgentFinding, ComplianceReport, ComplianceStatus};
