// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Engine bootstrap
//!
//! Loads the node manifest and wires the concrete adapters into an
//! [`EngineContext`].

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use schain_admin_core::application::config_generator::ConfigGenerator;
use schain_admin_core::application::context::EngineContext;
use schain_admin_core::application::repository_factory::create_schain_record_repository;
use schain_admin_core::application::settings::EngineSettings;
use schain_admin_core::domain::events::{LogNotifier, Notifier};
use schain_admin_core::domain::layout::SchainLayout;
use schain_admin_core::domain::node_config::NodeConfigManifest;
use schain_admin_core::domain::repository::SchainRecordRepository;
use schain_admin_core::infrastructure::{
    DockerRuntime, HttpChainGateway, HttpDkgClient, IptablesFirewall, JsonRpcWorkerClient,
    OsProcessControl, WebhookNotifier,
};

const IPTABLES_LOCK_FILE: &str = ".iptables.lock";

/// Load, override and validate the node manifest.
pub fn load_manifest(config_path: Option<PathBuf>) -> Result<NodeConfigManifest> {
    let manifest =
        NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest.validate().context("Configuration validation failed")?;
    Ok(manifest)
}

pub async fn record_repository(
    manifest: &NodeConfigManifest,
) -> Result<Arc<dyn SchainRecordRepository>> {
    let max_connections = manifest.spec.database.as_ref().map_or(5, |db| db.max_connections);
    create_schain_record_repository(&manifest.storage_backend(), max_connections)
        .await
        .context("Failed to initialize record repository")
}

/// `config_path` is forwarded to spawned workers so they load the same manifest.
pub async fn build_context(
    manifest: &NodeConfigManifest,
    config_path: Option<PathBuf>,
) -> Result<Arc<EngineContext>> {
    let spec = &manifest.spec;

    let runtime = DockerRuntime::new(spec.runtime.docker_socket.clone())
        .context("Failed to initialize Docker runtime")?;
    runtime.healthcheck().await.context("Docker is not reachable")?;

    let generator = ConfigGenerator::from_path(spec.paths.base_config.as_ref())
        .context("Failed to load base config")?;

    let firewall = IptablesFirewall::new(
        spec.firewall.iptables_path.clone(),
        spec.paths.node_data_dir.join(IPTABLES_LOCK_FILE),
    );

    let notifier: Arc<dyn Notifier> = match &spec.notifications {
        Some(n) => Arc::new(WebhookNotifier::new(n.webhook_url.clone(), n.per_minute)),
        None => Arc::new(LogNotifier),
    };

    let process = OsProcessControl::current_exe(config_path)
        .context("Failed to resolve current executable")?;

    let ctx = EngineContext {
        settings: EngineSettings::from(manifest),
        layout: SchainLayout::new(spec.paths.schains_dir.clone()),
        generator,
        runtime: Arc::new(runtime),
        firewall: Arc::new(firewall),
        chain: Arc::new(HttpChainGateway::new(
            spec.chain.endpoint.clone(),
            Duration::from_secs(spec.chain.timeout_secs),
        )),
        dkg: Arc::new(HttpDkgClient::new(
            spec.dkg.endpoint.clone(),
            Duration::from_secs(spec.dkg.timeout_secs),
        )),
        rpc: Arc::new(JsonRpcWorkerClient::new()),
        records: record_repository(manifest).await?,
        notifier,
        process: Arc::new(process),
    };

    info!(
        "Engine context ready: node_id={}, schains_dir={:?}",
        ctx.settings.node_id,
        ctx.layout.schains_dir()
    );
    Ok(Arc::new(ctx))
}

/// Install the Prometheus exporter when metrics are enabled.
pub fn install_metrics(manifest: &NodeConfigManifest) -> Result<()> {
    let Some(metrics) = manifest.spec.observability.as_ref().and_then(|o| o.metrics.as_ref()) else {
        return Ok(());
    };
    if !metrics.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}
