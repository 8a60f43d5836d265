//! Compliance issues and the suspicion verdict

use crate::models::types::{ComplianceIssue, CreatorTransfer, RiskSignal};

pub fn compliance_issues(
    concentration: f64,
    laundering: &[RiskSignal],
    fairness_threshold: f64,
) -> Vec<ComplianceIssue> {
    let mut issues = Vec::new();
    if concentration > fairness_threshold {
        issues.push(ComplianceIssue::DistributionFairness { concentration });
    }
    if !laundering.is_empty() {
        issues.push(ComplianceIssue::SuspiciousTransactionActivity {
            signal_count: laundering.len(),
        });
    }
    issues
}

/// Suspicious when concentrated or when any creator-origin transfer exceeds
/// `creator_fraction` of everything transferred
pub fn is_suspicious(
    concentration: f64,
    creator_transfers: &[CreatorTransfer],
    total_transferred: f64,
    concentration_threshold: f64,
    creator_fraction: f64,
) -> bool {
    concentration > concentration_threshold
        || creator_transfers
            .iter()
            .any(|t| t.amount > creator_fraction * total_transferred)
}
