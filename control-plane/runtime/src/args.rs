use crate::{admission::Admission, k8s::ConsulMeta};
use anyhow::{bail, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "consul-k8s-controller",
    about = "Validates and defaults Consul config entry resources"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "consul_k8s=info,warn",
        env = "CONSUL_K8S_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(flatten)]
    consul: ConsulArgs,
}

/// How Kubernetes resources map onto Consul partitions and namespaces.
#[derive(Clone, Debug, clap::Args)]
struct ConsulArgs {
    /// Enables Consul Enterprise admin partitions.
    #[clap(long)]
    enable_partitions: bool,

    /// The admin partition that resources are written to.
    #[clap(long, default_value = "default")]
    partition: String,

    /// Enables Consul Enterprise namespaces.
    #[clap(long)]
    enable_namespaces: bool,

    /// The Consul namespace resources are written to when mirroring is
    /// disabled.
    #[clap(long, default_value = "default")]
    consul_destination_namespace: String,

    /// Writes each resource to the Consul namespace named after its
    /// Kubernetes namespace.
    #[clap(long)]
    enable_k8s_namespace_mirroring: bool,

    /// Prepended to mirrored namespace names.
    #[clap(long, default_value = "")]
    k8s_namespace_mirroring_prefix: String,

    /// The datacenter recorded on entries written from this cluster.
    #[clap(long, default_value = "dc1")]
    datacenter: String,
}

impl Args {
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            consul,
        } = self;

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder())
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        let meta = Arc::new(consul.meta());
        info!(
            datacenter = %consul.datacenter,
            partitions = meta.partitions_enabled,
            namespaces = meta.namespaces_enabled,
            mirroring = meta.mirroring,
            "Serving admission webhooks"
        );

        let client = runtime.client();
        let runtime = runtime.spawn_server(Admission::new(client, meta));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

impl ConsulArgs {
    fn meta(&self) -> ConsulMeta {
        ConsulMeta {
            partitions_enabled: self.enable_partitions,
            partition: self.partition.clone(),
            namespaces_enabled: self.enable_namespaces,
            destination_namespace: self.consul_destination_namespace.clone(),
            mirroring: self.enable_k8s_namespace_mirroring,
            prefix: self.k8s_namespace_mirroring_prefix.clone(),
        }
    }
}
