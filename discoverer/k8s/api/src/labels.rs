//! Naming and labeling of discovered resources.
//!
//! Names and labels are pure functions of the backend name and the service
//! name, so a resource projected in one reconciliation keeps its identity in
//! the next. Service names are lower-cased; no other sanitization is applied.

use crate::BackendName;
use std::collections::BTreeMap;

pub type Map = BTreeMap<String, String>;

/// Marks every resource owned by a backend. Observed state is listed with a
/// selector on this label.
pub const BACKEND_LABEL: &str = "discoverer.consul.io/backend";

/// Records the upstream service a resource was projected from.
pub const SERVICE_LABEL: &str = "discoverer.consul.io/service";

/// Returns the name of the Service and Endpoints projected for `service`.
///
/// Distinct (case-folded) service names yield distinct resource names under
/// the same backend.
pub fn discovered_name(backend: &BackendName, service: &str) -> String {
    format!("{}-{}", backend, service.to_lowercase())
}

/// Returns the labels of the Service and Endpoints projected for `service`.
///
/// There is no per-service-instance label; callers must not select on
/// anything finer than the backend and upstream service name.
pub fn discovered_labels(backend: &BackendName, service: &str) -> Map {
    let mut labels = Map::new();
    labels.insert(BACKEND_LABEL.to_string(), backend.to_string());
    labels.insert(SERVICE_LABEL.to_string(), service.to_lowercase());
    labels
}

/// Returns the label selector matching every resource owned by `backend`.
pub fn backend_selector(backend: &BackendName) -> String {
    format!("{BACKEND_LABEL}={backend}")
}

/// Reads the upstream service name back from a resource's labels.
pub fn upstream_name(labels: Option<&Map>) -> String {
    labels
        .and_then(|l| l.get(SERVICE_LABEL))
        .cloned()
        .unwrap_or_default()
}
