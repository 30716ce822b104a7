//! Drift scoring: normalized score and severity from difference counts.

use driftwatch_core::model::Severity;

/// Difference count at which the drift score saturates at 1.0.
pub const DRIFT_SATURATION: f64 = 10.0;

/// Normalized drift score in `[0.0, 1.0]`: linear in the number of
/// differing paths, capped at [`DRIFT_SATURATION`] differences.
pub fn drift_score(difference_count: usize) -> f64 {
    (difference_count as f64 / DRIFT_SATURATION).min(1.0)
}

/// Severity for a drift finding: LOW for up to 5 differences, MEDIUM for
/// 6–10, HIGH beyond that (boundaries inclusive).
pub fn drift_severity(difference_count: usize) -> Severity {
    if difference_count <= 5 {
        Severity::Low
    } else if difference_count <= 10 {
        Severity::Medium
    } else {
        Severity::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_linear_and_capped() {
        assert_eq!(drift_score(0), 0.0);
        assert_eq!(drift_score(1), 0.1);
        assert_eq!(drift_score(5), 0.5);
        assert_eq!(drift_score(10), 1.0);
        assert_eq!(drift_score(25), 1.0);
    }

    #[test]
    fn severity_boundaries_are_inclusive() {
        assert_eq!(drift_severity(1), Severity::Low);
        assert_eq!(drift_severity(5), Severity::Low);
        assert_eq!(drift_severity(6), Severity::Medium);
        assert_eq!(drift_severity(10), Severity::Medium);
        assert_eq!(drift_severity(11), Severity::High);
    }
}
