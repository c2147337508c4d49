use crate::action::{Action, Kind, Op};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        gauge::Gauge,
        histogram::{exponential_buckets, Histogram},
    },
    registry::Registry,
};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ReconcilerMetrics {
    pub(crate) upstream_services: Gauge,
    pub(crate) invalid_services: Gauge,
    pub(crate) cycle_duration: Histogram,
    pub(crate) errors: Family<ErrorLabels, Counter>,
    pub(crate) observed_read_failures: Family<KindLabels, Counter>,
    pub(crate) actions: Family<ActionLabels, Counter>,
}

#[derive(Clone, Debug)]
pub struct ExecutorMetrics {
    pub(crate) applied: Family<ActionLabels, Counter>,
    pub(crate) apply_errors: Family<ActionLabels, Counter>,
    pub(crate) dropped: Family<ActionLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub(crate) struct ErrorLabels {
    pub(crate) operation: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub(crate) struct KindLabels {
    pub(crate) kind: Kind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub(crate) struct ActionLabels {
    pub(crate) kind: Kind,
    pub(crate) op: Op,
}

// === impl ReconcilerMetrics ===

impl ReconcilerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let upstream_services = Gauge::default();
        prom.register(
            "upstream_services",
            "Number of upstream services discovered in the last reconciliation",
            upstream_services.clone(),
        );

        let invalid_services = Gauge::default();
        prom.register(
            "invalid_services",
            "Number of catalog services excluded from the last reconciliation",
            invalid_services.clone(),
        );

        let cycle_duration = Histogram::new(exponential_buckets(0.01, 2.0, 12));
        prom.register(
            "cycle_duration_seconds",
            "Time taken by each reconciliation",
            cycle_duration.clone(),
        );

        let errors = Family::default();
        prom.register(
            "errors",
            "Count of failed registry and cluster operations",
            errors.clone(),
        );

        let observed_read_failures = Family::default();
        prom.register(
            "observed_read_failures",
            "Count of reconciliations that could not list observed resources",
            observed_read_failures.clone(),
        );

        let actions = Family::default();
        prom.register(
            "actions",
            "Count of actions submitted to the executor",
            actions.clone(),
        );

        Self {
            upstream_services,
            invalid_services,
            cycle_duration,
            errors,
            observed_read_failures,
            actions,
        }
    }

    pub(crate) fn error(&self, operation: &str) {
        self.errors
            .get_or_create(&ErrorLabels {
                operation: operation.to_string(),
            })
            .inc();
    }

    pub(crate) fn observed_read_failure(&self, kind: Kind) {
        self.observed_read_failures
            .get_or_create(&KindLabels { kind })
            .inc();
    }

    pub(crate) fn action(&self, action: &Action) {
        self.actions.get_or_create(&ActionLabels::new(action)).inc();
    }

    pub(crate) fn services(&self, upstream: usize, invalid: usize) {
        self.upstream_services.set(upstream as i64);
        self.invalid_services.set(invalid as i64);
    }

    pub(crate) fn cycle(&self, elapsed: Duration) {
        self.cycle_duration.observe(elapsed.as_secs_f64());
    }
}

// === impl ExecutorMetrics ===

impl ExecutorMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let applied = Family::default();
        prom.register(
            "applied",
            "Count of actions applied to the cluster",
            applied.clone(),
        );

        let apply_errors = Family::default();
        prom.register(
            "apply_errors",
            "Count of failed attempts to apply an action",
            apply_errors.clone(),
        );

        let dropped = Family::default();
        prom.register(
            "dropped",
            "Count of actions abandoned after exhausting retries",
            dropped.clone(),
        );

        Self {
            applied,
            apply_errors,
            dropped,
        }
    }
}

// === impl ActionLabels ===

impl ActionLabels {
    pub(crate) fn new(action: &Action) -> Self {
        Self {
            kind: action.kind(),
            op: action.op(),
        }
    }
}
