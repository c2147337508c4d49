use crate::{
    action::Action,
    metrics::{ActionLabels, ExecutorMetrics},
};
use anyhow::Result;
use consul_discoverer_k8s_api::{self as k8s, Api, DeleteParams, Patch, PatchParams};
use futures::prelude::*;
use tokio::{
    sync::mpsc,
    time::{self, Duration},
};
use tokio_stream::wrappers::ReceiverStream;

pub const FIELD_MANAGER: &str = "consul-discoverer";

const DEFAULT_ATTEMPTS: usize = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Applies a single action to the target cluster.
#[async_trait::async_trait]
pub trait Apply: Send + Sync {
    async fn apply(&self, action: &Action) -> Result<()>;
}

#[async_trait::async_trait]
impl<A: Apply + ?Sized> Apply for std::sync::Arc<A> {
    async fn apply(&self, action: &Action) -> Result<()> {
        (**self).apply(action).await
    }
}

/// Drains the action queue, applying actions with a fixed number of
/// concurrent workers.
///
/// Actions are submitted in order but may be applied out of order. An action
/// that keeps failing is dropped; the next reconciliation derives it again.
pub struct Executor<A> {
    applier: A,
    actions: mpsc::Receiver<Action>,
    workers: usize,
    attempts: usize,
    backoff: Duration,
    metrics: ExecutorMetrics,
}

// === impl Executor ===

impl<A: Apply> Executor<A> {
    pub fn new(
        applier: A,
        actions: mpsc::Receiver<Action>,
        workers: usize,
        metrics: ExecutorMetrics,
    ) -> Self {
        Self {
            applier,
            actions,
            workers: workers.max(1),
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            metrics,
        }
    }

    pub fn with_retries(mut self, attempts: usize, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Runs until every sender of the action queue has been dropped.
    pub async fn run(self) {
        let Self {
            applier,
            actions,
            workers,
            attempts,
            backoff,
            metrics,
        } = self;

        ReceiverStream::new(actions)
            .for_each_concurrent(workers, |action| {
                process(&applier, &metrics, attempts, backoff, action)
            })
            .await;
        tracing::debug!("Action queue closed");
    }
}

async fn process<A: Apply>(
    applier: &A,
    metrics: &ExecutorMetrics,
    attempts: usize,
    backoff: Duration,
    action: Action,
) {
    let labels = ActionLabels::new(&action);
    let namespace = action.namespace();
    let name = action.name();
    let upstream = action.upstream_name().unwrap_or_default();

    for attempt in 1..=attempts {
        match applier.apply(&action).await {
            Ok(()) => {
                tracing::debug!(%namespace, %name, upstream, kind = ?labels.kind, op = ?labels.op, "Applied");
                metrics.applied.get_or_create(&labels).inc();
                return;
            }
            Err(error) => {
                tracing::warn!(%namespace, %name, upstream, kind = ?labels.kind, op = ?labels.op, attempt, %error, "Failed to apply");
                metrics.apply_errors.get_or_create(&labels).inc();
                if attempt < attempts {
                    time::sleep(backoff).await;
                }
            }
        }
    }

    tracing::error!(%namespace, %name, upstream, kind = ?labels.kind, op = ?labels.op, "Dropping action");
    metrics.dropped.get_or_create(&labels).inc();
}

#[async_trait::async_trait]
impl Apply for k8s::Client {
    async fn apply(&self, action: &Action) -> Result<()> {
        let namespace = action.namespace();
        let name = action.name();
        let params = PatchParams::apply(FIELD_MANAGER).force();

        match action {
            Action::AddService(svc) | Action::UpdateService(svc) => {
                let api = Api::<k8s::Service>::namespaced(self.clone(), &namespace);
                api.patch(&name, &params, &Patch::Apply(svc)).await?;
            }
            Action::AddEndpoints(ep) | Action::UpdateEndpoints(ep) => {
                let api = Api::<k8s::Endpoints>::namespaced(self.clone(), &namespace);
                api.patch(&name, &params, &Patch::Apply(&ep.endpoints))
                    .await?;
            }
            Action::DeleteService(_) => {
                let api = Api::<k8s::Service>::namespaced(self.clone(), &namespace);
                match api.delete(&name, &DeleteParams::default()).await {
                    Ok(_) => {}
                    Err(k8s::Error::Api(error)) if error.code == 404 => {}
                    Err(error) => return Err(error.into()),
                }
            }
            Action::DeleteEndpoints(_) => {
                let api = Api::<k8s::Endpoints>::namespaced(self.clone(), &namespace);
                match api.delete(&name, &DeleteParams::default()).await {
                    Ok(_) => {}
                    Err(k8s::Error::Api(error)) if error.code == 404 => {}
                    Err(error) => return Err(error.into()),
                }
            }
        }

        Ok(())
    }
}
