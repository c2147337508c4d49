use anyhow::Result;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Service names mapped to their tags, ordered by name.
pub type Catalog = BTreeMap<String, Vec<String>>;

/// A healthy instance of a registry service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    /// An IP address or hostname.
    pub address: String,
    pub port: u16,
}

/// Reads services and their healthy instances from a remote registry.
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Lists every service in the catalog along with its tags.
    async fn list_tagged_services(&self) -> Result<Catalog>;

    /// Lists the instances of `name` that are passing their health checks,
    /// in the order the registry returns them.
    async fn list_healthy_instances(&self, name: &str) -> Result<Vec<Instance>>;
}

#[async_trait::async_trait]
impl<R: Registry + ?Sized> Registry for std::sync::Arc<R> {
    async fn list_tagged_services(&self) -> Result<Catalog> {
        (**self).list_tagged_services().await
    }

    async fn list_healthy_instances(&self, name: &str) -> Result<Vec<Instance>> {
        (**self).list_healthy_instances(name).await
    }
}

/// Selects the catalog services that should be discovered.
///
/// A service is selected only if the filter tag is one of its tags. There is
/// no wildcard: an empty filter selects only services that carry an empty
/// tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFilter(String);

// === impl TagFilter ===

impl TagFilter {
    pub fn new(tag: impl ToString) -> Self {
        Self(tag.to_string())
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| *t == self.0)
    }
}

impl FromStr for TagFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
