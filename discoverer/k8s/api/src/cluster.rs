use crate::{Api, Client, Endpoints, ListParams, Service};
use anyhow::Result;

/// Reads the discovered resources that currently exist in the target cluster.
#[async_trait::async_trait]
pub trait Cluster: Send + Sync {
    async fn list_services(&self, namespace: &str, selector: &str) -> Result<Vec<Service>>;

    async fn list_endpoints(&self, namespace: &str, selector: &str) -> Result<Vec<Endpoints>>;
}

#[async_trait::async_trait]
impl<C: Cluster + ?Sized> Cluster for std::sync::Arc<C> {
    async fn list_services(&self, namespace: &str, selector: &str) -> Result<Vec<Service>> {
        (**self).list_services(namespace, selector).await
    }

    async fn list_endpoints(&self, namespace: &str, selector: &str) -> Result<Vec<Endpoints>> {
        (**self).list_endpoints(namespace, selector).await
    }
}

#[async_trait::async_trait]
impl Cluster for Client {
    async fn list_services(&self, namespace: &str, selector: &str) -> Result<Vec<Service>> {
        let api = Api::<Service>::namespaced(self.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        tracing::trace!(namespace, selector, services = list.items.len(), "Listed");
        Ok(list.items)
    }

    async fn list_endpoints(&self, namespace: &str, selector: &str) -> Result<Vec<Endpoints>> {
        let api = Api::<Endpoints>::namespaced(self.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        tracing::trace!(namespace, selector, endpoints = list.items.len(), "Listed");
        Ok(list.items)
    }
}
