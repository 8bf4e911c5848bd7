use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::Verdict;

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total assessments processed
    pub assessments_total: AtomicU64,

    /// Assessments by outcome
    pub assessments_approved: AtomicU64,
    pub assessments_fraud: AtomicU64,

    /// Fast-reject gate hits
    pub identity_gate_rejects: AtomicU64,
    pub blacklist_gate_rejects: AtomicU64,

    /// Assessment latency buckets (microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,

    /// Rule evaluation counts
    pub rules_evaluated_total: AtomicU64,
    pub rules_triggered_total: AtomicU64,
    pub rule_failures_total: AtomicU64,
    pub rules_skipped_total: AtomicU64,

    /// Audit log operations
    pub audit_writes_total: AtomicU64,
    pub audit_write_errors: AtomicU64,

    /// Registry calls that errored or timed out
    pub verification_errors: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record an assessment outcome.
    pub fn record_verdict(&self, verdict: &Verdict) {
        self.assessments_total.fetch_add(1, Ordering::Relaxed);

        if verdict.is_fraud {
            self.assessments_fraud.fetch_add(1, Ordering::Relaxed);
        } else {
            self.assessments_approved.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_identity_gate(&self) {
        self.identity_gate_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blacklist_gate(&self) {
        self.blacklist_gate_rejects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record assessment latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 1000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_5_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 50000 {
            self.latency_10_50ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100000 {
            self.latency_50_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a rule evaluation.
    pub fn record_rule_evaluation(&self, triggered: bool) {
        self.rules_evaluated_total.fetch_add(1, Ordering::Relaxed);
        if triggered {
            self.rules_triggered_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a predicate that returned an error.
    pub fn record_rule_failure(&self) {
        self.rule_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rule skipped for lack of a predicate.
    pub fn record_rule_skipped(&self) {
        self.rules_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an audit write.
    pub fn record_audit_write(&self, success: bool) {
        self.audit_writes_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.audit_write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_verification_error(&self) {
        self.verification_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of assessments that ended as fraud.
    pub fn fraud_rate(&self) -> f64 {
        let total = self.assessments_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.assessments_fraud.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP fraudr_assessments_total Total number of assessments
# TYPE fraudr_assessments_total counter
fraudr_assessments_total {}

# HELP fraudr_assessments Assessments by outcome
# TYPE fraudr_assessments counter
fraudr_assessments{{outcome="approved"}} {}
fraudr_assessments{{outcome="fraud"}} {}

# HELP fraudr_gate_rejects_total Assessments rejected before rule evaluation
# TYPE fraudr_gate_rejects_total counter
fraudr_gate_rejects_total{{gate="identity"}} {}
fraudr_gate_rejects_total{{gate="blacklist"}} {}

# HELP fraudr_assessment_latency_bucket Assessment latency histogram
# TYPE fraudr_assessment_latency_bucket counter
fraudr_assessment_latency_bucket{{le="0.001"}} {}
fraudr_assessment_latency_bucket{{le="0.005"}} {}
fraudr_assessment_latency_bucket{{le="0.01"}} {}
fraudr_assessment_latency_bucket{{le="0.05"}} {}
fraudr_assessment_latency_bucket{{le="0.1"}} {}
fraudr_assessment_latency_bucket{{le="+Inf"}} {}

# HELP fraudr_rules_evaluated_total Total rule evaluations
# TYPE fraudr_rules_evaluated_total counter
fraudr_rules_evaluated_total {}

# HELP fraudr_rules_triggered_total Total rules that triggered
# TYPE fraudr_rules_triggered_total counter
fraudr_rules_triggered_total {}

# HELP fraudr_rule_failures_total Predicates that returned an error
# TYPE fraudr_rule_failures_total counter
fraudr_rule_failures_total {}

# HELP fraudr_rules_skipped_total Rules skipped for an unregistered condition key
# TYPE fraudr_rules_skipped_total counter
fraudr_rules_skipped_total {}

# HELP fraudr_audit_writes_total Total audit write operations
# TYPE fraudr_audit_writes_total counter
fraudr_audit_writes_total {}

# HELP fraudr_audit_write_errors_total Audit write errors
# TYPE fraudr_audit_write_errors_total counter
fraudr_audit_write_errors_total {}

# HELP fraudr_verification_errors_total Registry calls that failed or timed out
# TYPE fraudr_verification_errors_total counter
fraudr_verification_errors_total {}
"#,
            self.assessments_total.load(Ordering::Relaxed),
            self.assessments_approved.load(Ordering::Relaxed),
            self.assessments_fraud.load(Ordering::Relaxed),
            self.identity_gate_rejects.load(Ordering::Relaxed),
            self.blacklist_gate_rejects.load(Ordering::Relaxed),
            self.latency_under_1ms.load(Ordering::Relaxed),
            self.latency_1_5ms.load(Ordering::Relaxed),
            self.latency_5_10ms.load(Ordering::Relaxed),
            self.latency_10_50ms.load(Ordering::Relaxed),
            self.latency_50_100ms.load(Ordering::Relaxed),
            self.latency_over_100ms.load(Ordering::Relaxed),
            self.rules_evaluated_total.load(Ordering::Relaxed),
            self.rules_triggered_total.load(Ordering::Relaxed),
            self.rule_failures_total.load(Ordering::Relaxed),
            self.rules_skipped_total.load(Ordering::Relaxed),
            self.audit_writes_total.load(Ordering::Relaxed),
            self.audit_write_errors.load(Ordering::Relaxed),
            self.verification_errors.load(Ordering::Relaxed),
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_verdict() {
        let metrics = MetricsRegistry::new();

        metrics.record_verdict(&Verdict::from_rules(false, String::new(), 0.0));
        metrics.record_verdict(&Verdict::from_rules(false, String::new(), 0.0));
        metrics.record_verdict(&Verdict::rejected("Identity not verified"));

        assert_eq!(metrics.assessments_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.assessments_approved.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.assessments_fraud.load(Ordering::Relaxed), 1);
        assert!((metrics.fraud_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_latency() {
        let metrics = MetricsRegistry::new();

        {
            let _guard = TimingGuard::new(&metrics);
        }

        let buckets = metrics.latency_under_1ms.load(Ordering::Relaxed)
            + metrics.latency_1_5ms.load(Ordering::Relaxed)
            + metrics.latency_5_10ms.load(Ordering::Relaxed);
        assert_eq!(buckets, 1);
    }

    #[test]
    fn test_fraud_rate_without_assessments() {
        assert_eq!(MetricsRegistry::new().fraud_rate(), 0.0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MetricsRegistry::new();
        metrics.record_verdict(&Verdict::from_rules(false, String::new(), 0.0));
        metrics.record_blacklist_gate();
        metrics.record_audit_write(false);

        let output = metrics.to_prometheus();

        assert!(output.contains("fraudr_assessments_total 1"));
        assert!(output.contains("fraudr_assessments{outcome=\"approved\"} 1"));
        assert!(output.contains("fraudr_gate_rejects_total{gate=\"blacklist\"} 1"));
        assert!(output.contains("fraudr_audit_write_errors_total 1"));
    }
}
