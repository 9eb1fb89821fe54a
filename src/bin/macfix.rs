// Copyright (c) 2025 - Cowboy AI, Inc.
//! MAC conflict resolution entry point
//!
//! Connects to every configured endpoint, runs one resolution pass over the
//! union of their machine sets, and reports the result. The process exits
//! abnormally when the initial connection cannot be established.
//!
//! Configuration comes from the environment:
//! - `MACFIX_ENDPOINTS`: JSON array of endpoint identities
//! - `MACFIX_ACTIVE_ONLY`: restrict the pass to active machines (default true)

use anyhow::{Context, Result};
use tracing::info;

use macfix::{resolver, Hypervisor, ResolverConfig, VirshHypervisor};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = ResolverConfig::from_env().context("invalid configuration")?;
    info!(
        endpoints = config.endpoints.len(),
        active_only = config.active_only,
        "starting MAC conflict resolution pass"
    );

    let mut backends = Vec::with_capacity(config.endpoints.len());
    for endpoint in &config.endpoints {
        let backend = VirshHypervisor::connect(endpoint)
            .await
            .with_context(|| format!("cannot connect to {}", endpoint.uri()))?;
        backends.push(backend);
    }

    let handles: Vec<&dyn Hypervisor> = backends.iter().map(|b| b as &dyn Hypervisor).collect();
    let report = resolver::run_pass(&handles, config.active_only)
        .await
        .context("resolution pass failed")?;

    info!(
        scanned = report.scanned,
        conflicts = report.conflicts,
        resolved = report.resolved,
        skipped = report.skipped,
        "done"
    );

    for backend in &backends {
        backend.disconnect().await?;
    }

    Ok(())
}
