use crate::{consul, core::TagFilter, duration::Period, k8s::BackendName, sync};
use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::prelude::*;
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

const DEFAULT_TAG_FILTER: &str = "gateway";

#[derive(Debug, Parser)]
#[clap(
    name = "consul-discoverer",
    about = "Mirrors Consul services into Kubernetes Services and Endpoints"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "consul_discoverer=info,warn",
        env = "CONSUL_DISCOVERER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The namespace in which discovered resources are managed.
    #[clap(long, default_value = "consul")]
    namespace: String,

    /// A YAML file describing how to connect to the Consul agent.
    #[clap(long)]
    consul_config: PathBuf,

    /// Identifies this discoverer's resources. Must be a valid DNS label.
    #[clap(long)]
    backend_name: String,

    /// Only services carrying this tag are discovered.
    ///
    /// Takes precedence over the config file's `tag_filter`. Defaults to
    /// `gateway` when neither is set.
    #[clap(long)]
    tag_filter: Option<TagFilter>,

    #[clap(long, default_value = "30s")]
    reconciliation_period: Period,

    /// The number of actions applied concurrently.
    #[clap(long, default_value = "2")]
    num_threads: usize,

    /// The number of actions buffered between the reconciler and executor.
    #[clap(long, default_value = "1000")]
    queue_size: usize,

    /// How to reconcile a resource kind that can't be listed: `create-all`
    /// or `skip`.
    #[clap(long, default_value = "create-all")]
    observed_read_failure: sync::ObservedReadFailure,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            namespace,
            consul_config,
            backend_name,
            tag_filter,
            reconciliation_period,
            num_threads,
            queue_size,
            observed_read_failure,
        } = self;

        let backend = backend_name.parse::<BackendName>()?;
        let consul_config = consul::Config::load(&consul_config)?;
        let tag_filter = tag_filter
            .or_else(|| consul_config.tag_filter.as_deref().map(TagFilter::new))
            .unwrap_or_else(|| TagFilter::new(DEFAULT_TAG_FILTER));

        let mut prom = <Registry>::default();
        let discoverer = prom.sub_registry_with_prefix("discoverer");
        let reconciler_metrics = sync::ReconcilerMetrics::register(discoverer);
        let executor_metrics = sync::ExecutorMetrics::register(discoverer);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let registry = consul::Consul::new(&consul_config)?;
        let datacenter = registry
            .datacenter()
            .await
            .context("failed to reach the Consul agent")?;
        info!(
            %datacenter,
            consul = consul_config.addr(),
            %backend,
            %namespace,
            %tag_filter,
            "Discovering services"
        );

        let (actions_tx, actions_rx) = mpsc::channel(queue_size.max(1));

        let executor = sync::Executor::new(
            runtime.client(),
            actions_rx,
            num_threads,
            executor_metrics,
        );
        tokio::spawn(executor.run().instrument(info_span!("executor")));

        let reconciler = sync::Reconciler::new(
            sync::Config {
                backend,
                namespace,
                tag_filter,
                interval: reconciliation_period.into(),
                observed_read_failure,
            },
            registry,
            runtime.client(),
            actions_tx,
            reconciler_metrics,
        );
        // The shutdown handle is held until the reconciler observes it, so an
        // in-flight reconciliation finishes before the runtime exits.
        let shutdown = runtime.shutdown_handle().signaled().map(drop);
        tokio::spawn(
            reconciler
                .run(shutdown)
                .instrument(info_span!("reconciler")),
        );

        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(
            ["consul-discoverer", "--consul-config=/etc/consul.yaml"]
                .iter()
                .chain(args)
                .copied(),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["--backend-name=dc1"]);
        assert_eq!(args.namespace, "consul");
        assert_eq!(args.backend_name, "dc1");
        assert_eq!(args.tag_filter, None);
        assert_eq!(
            std::time::Duration::from(args.reconciliation_period),
            std::time::Duration::from_secs(30)
        );
        assert_eq!(args.num_threads, 2);
        assert_eq!(
            args.observed_read_failure,
            sync::ObservedReadFailure::CreateAll
        );
    }

    #[test]
    fn overrides() {
        let args = parse(&[
            "--backend-name=east",
            "--namespace=mesh",
            "--tag-filter=edge",
            "--reconciliation-period=1m30s",
            "--num-threads=4",
            "--queue-size=10",
            "--observed-read-failure=skip",
        ]);
        assert_eq!(args.namespace, "mesh");
        assert_eq!(args.tag_filter, Some(TagFilter::new("edge")));
        assert_eq!(
            std::time::Duration::from(args.reconciliation_period),
            std::time::Duration::from_secs(90)
        );
        assert_eq!(args.num_threads, 4);
        assert_eq!(args.queue_size, 10);
        assert_eq!(args.observed_read_failure, sync::ObservedReadFailure::Skip);
    }

    #[test]
    fn requires_backend_name() {
        assert!(
            Args::try_parse_from(["consul-discoverer", "--consul-config=/etc/consul.yaml"])
                .is_err()
        );
    }

    #[test]
    fn rejects_zero_period() {
        assert!(Args::try_parse_from([
            "consul-discoverer",
            "--consul-config=/etc/consul.yaml",
            "--backend-name=dc1",
            "--reconciliation-period=0s",
        ])
        .is_err());
    }

    #[test]
    fn rejects_unknown_read_failure_policy() {
        assert!(Args::try_parse_from([
            "consul-discoverer",
            "--consul-config=/etc/consul.yaml",
            "--backend-name=dc1",
            "--observed-read-failure=ignore",
        ])
        .is_err());
    }
}
