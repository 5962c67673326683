//! Status classification.
//!
//! Every numeric metric kind owns a fixed [`ThresholdPolicy`]: a report gate and
//! an ordered table of [`Band`]s. Several tables deliberately map distinct
//! numeric tiers to the same [`Status::Warning`]; dashboards depend on that
//! vocabulary staying coarse.

use crate::types::Status;

/// How a value is compared against a bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// `value >= bound`
    AtLeast(f64),
    /// `value > bound`
    Above(f64),
}

impl Bound {
    /// Returns true if `value` satisfies this bound.
    #[must_use]
    pub fn admits(&self, value: f64) -> bool {
        match *self {
            Self::AtLeast(bound) => value >= bound,
            Self::Above(bound) => value > bound,
        }
    }
}

/// One threshold tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Status assigned when the bound is met.
    pub status: Status,
    /// Lower bound of the tier.
    pub bound: Bound,
}

impl Band {
    const fn warning(bound: Bound) -> Self {
        Self {
            status: Status::Warning,
            bound,
        }
    }

    const fn critical(bound: Bound) -> Self {
        Self {
            status: Status::Critical,
            bound,
        }
    }
}

/// Report gate plus band table for one numeric metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    /// Short name for logs.
    pub name: &'static str,
    /// Values that do not pass the gate are not reported at all.
    pub report: Bound,
    /// Bands in ascending order.
    pub bands: &'static [Band],
}

impl ThresholdPolicy {
    /// Node pool utilization percentage.
    pub const NODE_POOL: Self = Self {
        name: "node_pool_utilization",
        report: Bound::AtLeast(80.0),
        bands: &[
            Band::warning(Bound::AtLeast(80.0)),
            Band::warning(Bound::AtLeast(90.0)),
            Band::critical(Bound::AtLeast(95.0)),
        ],
    };

    /// Restarts summed across a pod's containers.
    pub const POD_RESTARTS: Self = Self {
        name: "pod_restarts",
        report: Bound::Above(5.0),
        bands: &[
            Band::warning(Bound::Above(5.0)),
            Band::warning(Bound::Above(10.0)),
            Band::critical(Bound::Above(20.0)),
        ],
    };

    /// Backend p95 latency in seconds.
    pub const LATENCY: Self = Self {
        name: "backend_p95_latency",
        report: Bound::Above(3.0),
        bands: &[
            Band::warning(Bound::Above(3.0)),
            Band::warning(Bound::Above(5.0)),
            Band::critical(Bound::Above(10.0)),
        ],
    };

    /// Oldest unacknowledged Pub/Sub message age in minutes.
    pub const PUBSUB_BACKLOG: Self = Self {
        name: "pubsub_oldest_unacked_age",
        report: Bound::Above(5.0),
        bands: &[
            Band::warning(Bound::Above(5.0)),
            Band::warning(Bound::Above(10.0)),
            Band::critical(Bound::Above(30.0)),
        ],
    };

    /// High-priority CPU utilization percentage.
    pub const INSTANCE_CPU: Self = Self {
        name: "instance_cpu",
        report: Bound::Above(45.0),
        bands: &[
            Band::warning(Bound::Above(45.0)),
            Band::critical(Bound::Above(65.0)),
        ],
    };

    /// Storage utilization percentage.
    pub const INSTANCE_STORAGE: Self = Self {
        name: "instance_storage",
        report: Bound::Above(75.0),
        bands: &[
            Band::warning(Bound::Above(75.0)),
            Band::critical(Bound::Above(90.0)),
        ],
    };

    /// Classifies a value: the most severe band it meets, else healthy.
    /// A missing value is unknown.
    #[must_use]
    pub fn classify(&self, value: Option<f64>) -> Status {
        let Some(value) = value else {
            return Status::Unknown;
        };
        self.bands
            .iter()
            .filter(|band| band.bound.admits(value))
            .map(|band| band.status)
            .max_by_key(Status::severity)
            .unwrap_or(Status::Healthy)
    }

    /// Returns true if the value passes the report gate.
    #[must_use]
    pub fn should_report(&self, value: f64) -> bool {
        self.report.admits(value)
    }

    /// Classifies a value only if it passes the report gate.
    #[must_use]
    pub fn evaluate(&self, value: f64) -> Option<Status> {
        self.should_report(value).then(|| self.classify(Some(value)))
    }
}

/// Classifies the HTTP status returned by a hostname probe.
///
/// `None` means the probe failed before a response arrived.
#[must_use]
pub fn classify_http_status(code: Option<u16>) -> Status {
    match code {
        Some(200) => Status::Healthy,
        Some(201..=499) => Status::Warning,
        Some(_) | None => Status::Critical,
    }
}

/// Classifies a pod phase. `running` is healthy and never reported.
#[must_use]
pub fn classify_pod_phase(phase: &str) -> Status {
    match phase.to_ascii_lowercase().as_str() {
        "running" => Status::Healthy,
        "pending" | "containercreating" => Status::Warning,
        "failed" | "unknown" | "crashloopbackoff" => Status::Critical,
        _ => Status::Warning,
    }
}

/// Which policy an observation is classified under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyKind {
    /// Hostname probe.
    UrlProbe,
    /// Pod phase string.
    PodPhase,
    /// Any numeric band table.
    Threshold(ThresholdPolicy),
}

/// A raw observation handed to [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation<'a> {
    /// A numeric measurement.
    Value(f64),
    /// An HTTP status code, or `None` for a transport failure.
    HttpStatus(Option<u16>),
    /// A pod phase.
    Phase(&'a str),
    /// The value could not be obtained.
    Missing,
}

/// Maps an observation to a status under the given policy.
///
/// Mismatched pairs (a phase under a numeric policy, say) classify as unknown.
#[must_use]
pub fn classify(kind: PolicyKind, observation: Observation<'_>) -> Status {
    match (kind, observation) {
        (_, Observation::Missing) => Status::Unknown,
        (PolicyKind::UrlProbe, Observation::HttpStatus(code)) => classify_http_status(code),
        (PolicyKind::PodPhase, Observation::Phase(phase)) => classify_pod_phase(phase),
        (PolicyKind::Threshold(policy), Observation::Value(value)) => policy.classify(Some(value)),
        _ => Status::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(79.99, None ; "just below gate")]
    #[test_case(80.0, Some(Status::Warning) ; "gate is inclusive")]
    #[test_case(92.0, Some(Status::Warning) ; "ninety band stays warning")]
    #[test_case(94.99, Some(Status::Warning) ; "below critical")]
    #[test_case(95.0, Some(Status::Critical) ; "critical inclusive")]
    #[test_case(100.0, Some(Status::Critical) ; "full")]
    fn node_pool_bands(value: f64, expected: Option<Status>) {
        assert_eq!(ThresholdPolicy::NODE_POOL.evaluate(value), expected);
    }

    #[test_case(5.0, None ; "five not reported")]
    #[test_case(6.0, Some(Status::Warning) ; "six warns")]
    #[test_case(15.0, Some(Status::Warning) ; "ten to twenty still warning")]
    #[test_case(20.0, Some(Status::Warning) ; "twenty is not critical")]
    #[test_case(21.0, Some(Status::Critical) ; "above twenty")]
    fn pod_restart_bands(value: f64, expected: Option<Status>) {
        assert_eq!(ThresholdPolicy::POD_RESTARTS.evaluate(value), expected);
    }

    #[test_case(3.0, None ; "three seconds not reported")]
    #[test_case(3.01, Some(Status::Warning) ; "just above")]
    #[test_case(7.5, Some(Status::Warning) ; "five to ten still warning")]
    #[test_case(10.0, Some(Status::Warning) ; "ten is not critical")]
    #[test_case(10.5, Some(Status::Critical) ; "above ten")]
    fn latency_bands(value: f64, expected: Option<Status>) {
        assert_eq!(ThresholdPolicy::LATENCY.evaluate(value), expected);
    }

    #[test_case(5.0, None ; "five minutes not reported")]
    #[test_case(6.0, Some(Status::Warning) ; "six minutes")]
    #[test_case(12.0, Some(Status::Warning) ; "ten to thirty still warning")]
    #[test_case(31.0, Some(Status::Critical) ; "above thirty")]
    fn pubsub_bands(value: f64, expected: Option<Status>) {
        assert_eq!(ThresholdPolicy::PUBSUB_BACKLOG.evaluate(value), expected);
    }

    #[test_case(&ThresholdPolicy::INSTANCE_CPU, 45.0, None ; "cpu at gate")]
    #[test_case(&ThresholdPolicy::INSTANCE_CPU, 50.0, Some(Status::Warning) ; "cpu warning")]
    #[test_case(&ThresholdPolicy::INSTANCE_CPU, 65.1, Some(Status::Critical) ; "cpu critical")]
    #[test_case(&ThresholdPolicy::INSTANCE_STORAGE, 75.0, None ; "storage at gate")]
    #[test_case(&ThresholdPolicy::INSTANCE_STORAGE, 80.0, Some(Status::Warning) ; "storage warning")]
    #[test_case(&ThresholdPolicy::INSTANCE_STORAGE, 90.5, Some(Status::Critical) ; "storage critical")]
    fn instance_bands(policy: &ThresholdPolicy, value: f64, expected: Option<Status>) {
        assert_eq!(policy.evaluate(value), expected);
    }

    #[test]
    fn below_every_band_is_healthy() {
        assert_eq!(ThresholdPolicy::LATENCY.classify(Some(0.4)), Status::Healthy);
    }

    #[test]
    fn missing_value_is_unknown() {
        assert_eq!(ThresholdPolicy::NODE_POOL.classify(None), Status::Unknown);
        assert_eq!(
            classify(PolicyKind::UrlProbe, Observation::Missing),
            Status::Unknown
        );
    }

    #[test_case(Some(200), Status::Healthy ; "ok")]
    #[test_case(Some(204), Status::Warning ; "other 2xx")]
    #[test_case(Some(301), Status::Warning ; "redirect")]
    #[test_case(Some(404), Status::Warning ; "not found")]
    #[test_case(Some(499), Status::Warning ; "last 4xx")]
    #[test_case(Some(500), Status::Critical ; "server error")]
    #[test_case(Some(503), Status::Critical ; "unavailable")]
    #[test_case(Some(101), Status::Critical ; "informational")]
    #[test_case(None, Status::Critical ; "transport error")]
    fn http_status_classification(code: Option<u16>, expected: Status) {
        assert_eq!(classify_http_status(code), expected);
    }

    #[test_case("Running", Status::Healthy ; "running")]
    #[test_case("Pending", Status::Warning ; "pending")]
    #[test_case("ContainerCreating", Status::Warning ; "creating")]
    #[test_case("Failed", Status::Critical ; "failed")]
    #[test_case("Unknown", Status::Critical ; "unknown phase")]
    #[test_case("CrashLoopBackOff", Status::Critical ; "crash loop")]
    #[test_case("Succeeded", Status::Warning ; "other phase")]
    fn pod_phase_classification(phase: &str, expected: Status) {
        assert_eq!(classify_pod_phase(phase), expected);
    }

    #[test]
    fn mismatched_observation_is_unknown() {
        assert_eq!(
            classify(PolicyKind::PodPhase, Observation::Value(3.0)),
            Status::Unknown
        );
    }

    fn policies() -> impl Strategy<Value = ThresholdPolicy> {
        prop_oneof![
            Just(ThresholdPolicy::NODE_POOL),
            Just(ThresholdPolicy::POD_RESTARTS),
            Just(ThresholdPolicy::LATENCY),
            Just(ThresholdPolicy::PUBSUB_BACKLOG),
            Just(ThresholdPolicy::INSTANCE_CPU),
            Just(ThresholdPolicy::INSTANCE_STORAGE),
        ]
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(policy in policies(), value in -1_000.0f64..1_000.0) {
            let kind = PolicyKind::Threshold(policy);
            let first = classify(kind, Observation::Value(value));
            for _ in 0..4 {
                prop_assert_eq!(classify(kind, Observation::Value(value)), first);
            }
        }

        #[test]
        fn severity_never_decreases_with_value(
            policy in policies(),
            a in 0.0f64..200.0,
            b in 0.0f64..200.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                policy.classify(Some(low)).severity() <= policy.classify(Some(high)).severity()
            );
        }

        #[test]
        fn reported_values_are_never_healthy(policy in policies(), value in 0.0f64..200.0) {
            if let Some(status) = policy.evaluate(value) {
                prop_assert_ne!(status, Status::Healthy);
            }
        }

        #[test]
        fn http_classification_is_total(code in 0u16..1000) {
            let status = classify_http_status(Some(code));
            prop_assert_ne!(status, Status::Unknown);
        }
    }
}
