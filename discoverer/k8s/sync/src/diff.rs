//! Classifies desired resources against observed resources.
//!
//! Resources are matched by identity (namespace and name). A desired
//! resource without an observed match is added; an observed resource without
//! a desired match is deleted; a matched pair is updated only when the
//! kind-specific detail differs. Metadata is never compared.
//!
//! When several observed resources share a desired resource's identity, the
//! first observed resource is the one compared and the rest are left
//! untouched.

use crate::action::DiscoveredEndpoints;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use consul_discoverer_k8s_api as k8s;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

/// A resource kind that can be compared for update-worthiness.
pub trait Detail {
    fn id(&self) -> ResourceId;

    /// Returns true if `other` would not need an update to match `self`.
    fn detail_eq(&self, other: &Self) -> bool;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diff<T> {
    pub add: Vec<T>,
    pub update: Vec<T>,
    pub delete: Vec<T>,
}

pub fn diff<T: Detail + Clone>(desired: &[T], observed: &[T]) -> Diff<T> {
    let mut observed_by_id = HashMap::with_capacity(observed.len());
    for resource in observed {
        observed_by_id.entry(resource.id()).or_insert(resource);
    }

    let mut add = Vec::new();
    let mut update = Vec::new();
    let mut desired_ids = HashSet::with_capacity(desired.len());
    for resource in desired {
        let id = resource.id();
        match observed_by_id.get(&id) {
            None => add.push(resource.clone()),
            Some(current) => {
                if !resource.detail_eq(current) {
                    update.push(resource.clone());
                }
            }
        }
        desired_ids.insert(id);
    }

    let delete = observed
        .iter()
        .filter(|r| !desired_ids.contains(&r.id()))
        .cloned()
        .collect();

    Diff {
        add,
        update,
        delete,
    }
}

// === impl Diff ===

impl<T> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

impl Detail for k8s::Service {
    fn id(&self) -> ResourceId {
        ResourceId::from_meta(&self.metadata)
    }

    fn detail_eq(&self, other: &Self) -> bool {
        fn ports(svc: &k8s::Service) -> Option<&Vec<k8s::ServicePort>> {
            svc.spec.as_ref().and_then(|s| s.ports.as_ref())
        }
        ports(self) == ports(other)
    }
}

impl Detail for DiscoveredEndpoints {
    fn id(&self) -> ResourceId {
        ResourceId::from_meta(&self.endpoints.metadata)
    }

    fn detail_eq(&self, other: &Self) -> bool {
        self.endpoints.subsets == other.endpoints.subsets
    }
}

// === impl ResourceId ===

impl ResourceId {
    fn from_meta(meta: &k8s::ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}
