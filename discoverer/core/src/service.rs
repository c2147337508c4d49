use crate::registry::Instance;

/// A remote service, as reported by the registry during a single
/// reconciliation.
///
/// Services are rebuilt from registry state on every reconciliation and are
/// never updated in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Service {
    /// The registry-assigned name, with its original casing.
    pub name: String,

    /// The single port that represents this service.
    pub port: u16,

    /// Instance addresses, in registry order. Duplicates are preserved.
    pub nodes: Vec<String>,
}

// === impl Service ===

impl Service {
    /// Builds a service from its healthy instances.
    ///
    /// The first instance that reports a non-zero port determines the
    /// service's port. Every instance contributes its address, whether or not
    /// its port matches.
    pub fn from_instances(
        name: impl ToString,
        instances: impl IntoIterator<Item = Instance>,
    ) -> Self {
        let mut port = 0;
        let mut nodes = Vec::new();
        for instance in instances {
            if port == 0 {
                port = instance.port;
            }
            nodes.push(instance.address);
        }

        Self {
            name: name.to_string(),
            port,
            nodes,
        }
    }

    /// The normalized name used to derive resource identifiers.
    pub fn id(&self) -> String {
        self.name.to_lowercase()
    }
}
