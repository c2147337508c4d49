use consul_discoverer_k8s_api::{self as k8s, labels};
use prometheus_client::encoding::EncodeLabelValue;

/// An Endpoints resource along with the name of the upstream service it
/// was projected from.
///
/// The upstream name is a plain field so that an Endpoints never refers
/// back to its Service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiscoveredEndpoints {
    pub endpoints: k8s::Endpoints,
    pub upstream_name: String,
}

/// A change to be applied to the target cluster.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    AddService(k8s::Service),
    UpdateService(k8s::Service),
    DeleteService(k8s::Service),
    AddEndpoints(DiscoveredEndpoints),
    UpdateEndpoints(DiscoveredEndpoints),
    DeleteEndpoints(DiscoveredEndpoints),
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Kind {
    Service,
    Endpoints,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Op {
    Add,
    Update,
    Delete,
}

// === impl DiscoveredEndpoints ===

impl DiscoveredEndpoints {
    /// Wraps an Endpoints read from the cluster, recovering its upstream name
    /// from its labels.
    pub fn observed(endpoints: k8s::Endpoints) -> Self {
        let upstream_name = labels::upstream_name(endpoints.metadata.labels.as_ref());
        Self {
            endpoints,
            upstream_name,
        }
    }
}

// === impl Action ===

impl Action {
    pub fn kind(&self) -> Kind {
        match self {
            Self::AddService(_) | Self::UpdateService(_) | Self::DeleteService(_) => Kind::Service,
            Self::AddEndpoints(_) | Self::UpdateEndpoints(_) | Self::DeleteEndpoints(_) => {
                Kind::Endpoints
            }
        }
    }

    pub fn op(&self) -> Op {
        match self {
            Self::AddService(_) | Self::AddEndpoints(_) => Op::Add,
            Self::UpdateService(_) | Self::UpdateEndpoints(_) => Op::Update,
            Self::DeleteService(_) | Self::DeleteEndpoints(_) => Op::Delete,
        }
    }

    pub fn namespace(&self) -> String {
        self.metadata().namespace.clone().unwrap_or_default()
    }

    pub fn name(&self) -> String {
        self.metadata().name.clone().unwrap_or_default()
    }

    /// The upstream service name, if this action targets an Endpoints.
    pub fn upstream_name(&self) -> Option<&str> {
        match self {
            Self::AddEndpoints(ep) | Self::UpdateEndpoints(ep) | Self::DeleteEndpoints(ep) => {
                Some(&ep.upstream_name)
            }
            _ => None,
        }
    }

    fn metadata(&self) -> &k8s::ObjectMeta {
        match self {
            Self::AddService(svc) | Self::UpdateService(svc) | Self::DeleteService(svc) => {
                &svc.metadata
            }
            Self::AddEndpoints(ep) | Self::UpdateEndpoints(ep) | Self::DeleteEndpoints(ep) => {
                &ep.endpoints.metadata
            }
        }
    }
}
