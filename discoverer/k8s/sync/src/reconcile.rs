use crate::{
    action::{Action, DiscoveredEndpoints, Kind},
    diff::{self, Diff},
    metrics::ReconcilerMetrics,
    project,
};
use consul_discoverer_core::{Registry, Service, TagFilter};
use consul_discoverer_k8s_api::{labels, BackendName, Cluster};
use std::{fmt, future::Future, str::FromStr};
use tokio::{
    sync::mpsc,
    time::{self, Duration, Instant, MissedTickBehavior},
};

/// Settings fixed for the lifetime of a [`Reconciler`].
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: BackendName,
    pub namespace: String,
    pub tag_filter: TagFilter,
    pub interval: Duration,
    pub observed_read_failure: ObservedReadFailure,
}

/// What to do with a resource kind when its observed state can't be listed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ObservedReadFailure {
    /// Diff against an empty observed list, so every desired resource is
    /// (re-)added.
    #[default]
    CreateAll,

    /// Emit no actions for the kind until the next reconciliation.
    Skip,
}

/// Periodically projects registry services into cluster actions.
pub struct Reconciler<R, C> {
    config: Config,
    registry: R,
    cluster: C,
    actions: mpsc::Sender<Action>,
    metrics: ReconcilerMetrics,
}

// === impl Reconciler ===

impl<R: Registry, C: Cluster> Reconciler<R, C> {
    pub fn new(
        config: Config,
        registry: R,
        cluster: C,
        actions: mpsc::Sender<Action>,
        metrics: ReconcilerMetrics,
    ) -> Self {
        Self {
            config,
            registry,
            cluster,
            actions,
            metrics,
        }
    }

    /// Reconciles immediately and then once per interval until `shutdown`
    /// completes.
    ///
    /// Shutdown is observed between reconciliations; a reconciliation that
    /// has started always runs to completion.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("Stopping");
                    return;
                }
                _ = interval.tick() => {}
            }

            self.reconcile().await;
        }
    }

    pub(crate) async fn reconcile(&self) {
        let start = Instant::now();
        tracing::info!("Reconciling");

        let Some((services, invalid)) = self.discover().await else {
            return;
        };

        let Config {
            backend, namespace, ..
        } = &self.config;
        let selector = labels::backend_selector(backend);

        let observed_services = match self.cluster.list_services(namespace, &selector).await {
            Ok(services) => Some(services),
            Err(error) => {
                tracing::error!(%namespace, %error, "Failed to list services");
                self.metrics.error("ListServicesInNamespace");
                self.observed_read_failure(Kind::Service)
            }
        };

        let observed_endpoints = match self.cluster.list_endpoints(namespace, &selector).await {
            Ok(endpoints) => Some(
                endpoints
                    .into_iter()
                    .map(DiscoveredEndpoints::observed)
                    .collect::<Vec<_>>(),
            ),
            Err(error) => {
                tracing::error!(%namespace, %error, "Failed to list endpoints");
                self.metrics.error("ListEndpointsInNamespace");
                self.observed_read_failure(Kind::Endpoints)
            }
        };

        if let Some(observed) = observed_services {
            let desired = project::services(backend, namespace, &services);
            let Diff {
                add,
                update,
                delete,
            } = diff::diff(&desired, &observed);
            tracing::debug!(
                add = add.len(),
                update = update.len(),
                delete = delete.len(),
                "Services"
            );
            self.submit(
                add.into_iter()
                    .map(Action::AddService)
                    .chain(update.into_iter().map(Action::UpdateService))
                    .chain(delete.into_iter().map(Action::DeleteService)),
            )
            .await;
        }

        if let Some(observed) = observed_endpoints {
            let desired = project::endpoints(backend, namespace, &services);
            let Diff {
                add,
                update,
                delete,
            } = diff::diff(&desired, &observed);
            tracing::debug!(
                add = add.len(),
                update = update.len(),
                delete = delete.len(),
                "Endpoints"
            );
            self.submit(
                add.into_iter()
                    .map(Action::AddEndpoints)
                    .chain(update.into_iter().map(Action::UpdateEndpoints))
                    .chain(delete.into_iter().map(Action::DeleteEndpoints)),
            )
            .await;
        }

        self.metrics.services(services.len(), invalid);
        let elapsed = start.elapsed();
        self.metrics.cycle(elapsed);
        tracing::debug!(services = services.len(), invalid, ?elapsed, "Reconciled");
    }

    /// Builds the services selected by the tag filter, along with the number
    /// of catalog services that were excluded.
    ///
    /// Returns `None` if the catalog can't be read.
    async fn discover(&self) -> Option<(Vec<Service>, usize)> {
        let catalog = match self.registry.list_tagged_services().await {
            Ok(catalog) => catalog,
            Err(error) => {
                tracing::error!(%error, "Failed to list registry services");
                self.metrics.error("ListCatalogServices");
                return None;
            }
        };

        let mut services = Vec::with_capacity(catalog.len());
        let mut invalid = 0;
        for (name, tags) in catalog {
            if !self.config.tag_filter.matches(&tags) {
                tracing::trace!(service = %name, "Not tagged");
                invalid += 1;
                continue;
            }

            match self.registry.list_healthy_instances(&name).await {
                Ok(instances) => services.push(Service::from_instances(name, instances)),
                Err(error) => {
                    tracing::warn!(service = %name, %error, "Failed to list healthy instances");
                    self.metrics.error("ListHealthyInstances");
                    invalid += 1;
                }
            }
        }

        Some((services, invalid))
    }

    fn observed_read_failure<T>(&self, kind: Kind) -> Option<Vec<T>> {
        self.metrics.observed_read_failure(kind);
        match self.config.observed_read_failure {
            ObservedReadFailure::CreateAll => Some(Vec::new()),
            ObservedReadFailure::Skip => {
                tracing::warn!(?kind, "Skipping reconciliation of unreadable resources");
                None
            }
        }
    }

    async fn submit(&self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.metrics.action(&action);
            if self.actions.send(action).await.is_err() {
                tracing::error!("Executor is no longer accepting actions");
                return;
            }
        }
    }
}

// === impl ObservedReadFailure ===

impl FromStr for ObservedReadFailure {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create-all" => Ok(Self::CreateAll),
            "skip" => Ok(Self::Skip),
            s => anyhow::bail!("invalid observed read failure policy: {s:?}"),
        }
    }
}

impl fmt::Display for ObservedReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateAll => "create-all".fmt(f),
            Self::Skip => "skip".fmt(f),
        }
    }
}
