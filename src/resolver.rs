// Copyright (c) 2025 - Cowboy AI, Inc.
//! Conflict resolution
//!
//! One resolution pass: scan every endpoint's machine set into a global
//! address space, then fix each conflicting machine through the
//! stop → rewrite → redefine → restart sequence. Strictly sequential — one
//! machine at a time, one request in flight; the only suspension point is
//! the bounded poll loop waiting for a machine to finish stopping.
//!
//! Per-machine failures (lookup, address mismatch) abort only that machine's
//! resolution; any other backend failure terminates the pass.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::MacAddress;
use crate::errors::{ResolverError, ResolverResult};
use crate::generator;
use crate::hypervisor::Hypervisor;
use crate::scanner::{self, AddressSpace, ConflictRecord};
use crate::xml;

/// Maximum activity polls while waiting for a graceful stop
pub const STOP_POLL_LIMIT: usize = 20;

/// Interval between activity polls
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal outcome of a graceful-stop attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The machine was observed inactive
    Confirmed,
    /// The machine was still active after the poll bound and one reissued
    /// stop request; no further escalation is attempted
    StillRunning,
}

/// Which interface address holder a targeted reassignment applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacSelector {
    /// The first interface in the document
    FirstInterface,
    /// The interface currently holding this address
    Address(MacAddress),
}

/// Summary of one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Machines scanned across all endpoints
    pub scanned: usize,
    /// Conflicts detected
    pub conflicts: usize,
    /// Conflicts fixed end to end
    pub resolved: usize,
    /// Conflicting machines skipped (lookup failure or address mismatch)
    pub skipped: usize,
}

/// Run one full resolution pass over the given endpoints.
///
/// Endpoints are scanned in slice order into one global address space, so
/// two machines on different endpoints sharing an address are still flagged.
/// Conflicting machines are then resolved one at a time in lexicographic
/// name order, each against the endpoint that owns it.
pub async fn run_pass(
    endpoints: &[&dyn Hypervisor],
    active_only: bool,
) -> ResolverResult<PassReport> {
    let mut space = AddressSpace::new();
    let mut conflicts = ConflictRecord::new();
    let mut report = PassReport::default();

    for (index, endpoint) in endpoints.iter().enumerate() {
        info!(uri = %endpoint.endpoint(), "scanning machine set");
        report.scanned +=
            scanner::scan_endpoint(*endpoint, index, active_only, &mut space, &mut conflicts)
                .await?;
    }
    report.conflicts = conflicts.len();

    if conflicts.is_empty() {
        info!("no conflicting MAC addresses found");
        return Ok(report);
    }

    for (machine, entry) in conflicts.iter() {
        let endpoint = endpoints[entry.endpoint];
        match resolve_machine(endpoint, machine, &entry.mac, &mut space).await {
            Ok(()) => report.resolved += 1,
            Err(ResolverError::Lookup(reason)) => {
                warn!(%machine, %reason, "skipping conflict, machine no longer resolvable");
                report.skipped += 1;
            }
            Err(ResolverError::AttributeMismatch { machine, expected }) => {
                warn!(
                    %machine,
                    %expected,
                    "skipping conflict, expected address no longer present; machine left stopped"
                );
                report.skipped += 1;
            }
            Err(other) => {
                error!(%machine, error = %other, "aborting resolution pass");
                return Err(other);
            }
        }
    }

    info!(
        scanned = report.scanned,
        conflicts = report.conflicts,
        resolved = report.resolved,
        skipped = report.skipped,
        "resolution pass complete"
    );
    Ok(report)
}

/// Resolve conflicts on a single endpoint. Convenience over [`run_pass`].
pub async fn resolve_conflicts(
    hypervisor: &dyn Hypervisor,
    active_only: bool,
) -> ResolverResult<PassReport> {
    run_pass(&[hypervisor], active_only).await
}

/// Fix one conflicting machine: pick a fresh unique address, claim it in the
/// pass-wide address space, then apply it.
async fn resolve_machine(
    hypervisor: &dyn Hypervisor,
    machine: &str,
    old: &MacAddress,
    space: &mut AddressSpace,
) -> ResolverResult<()> {
    hypervisor.lookup_by_name(machine).await?;

    let new = generator::generate_unique(|candidate| space.contains(candidate))?;
    // Claimed before the apply so later resolutions in this pass cannot
    // collide with it, even if the apply is skipped.
    space.claim(new.clone(), machine);

    update_machine_mac(hypervisor, machine, old, &new).await?;
    info!(%machine, %old, %new, "resolved MAC conflict");
    Ok(())
}

/// Apply a replacement address to one machine: stop, rewrite the one
/// matching holder, redefine, restart.
///
/// When the expected old address is absent from the freshly fetched XML the
/// rewrite and restart are skipped and the machine stays stopped; callers
/// see [`ResolverError::AttributeMismatch`].
pub async fn update_machine_mac(
    hypervisor: &dyn Hypervisor,
    machine: &str,
    old: &MacAddress,
    new: &MacAddress,
) -> ResolverResult<()> {
    if ensure_stopped(hypervisor, machine).await? == ShutdownOutcome::StillRunning {
        warn!(%machine, "machine still active after graceful stop attempts");
    }

    let domain_xml = hypervisor.fetch_xml(machine).await?;
    let rewritten = xml::rewrite_interface_mac(&domain_xml, old, new)?.ok_or_else(|| {
        ResolverError::AttributeMismatch {
            machine: machine.to_string(),
            expected: old.to_string(),
        }
    })?;

    hypervisor.define_xml(&rewritten).await?;
    hypervisor.start(machine).await?;
    Ok(())
}

/// Reassign a machine's interface address outside of a conflict pass.
///
/// `restart` controls whether the machine is started again after the
/// configuration is replaced.
pub async fn reassign_mac(
    hypervisor: &dyn Hypervisor,
    machine: &str,
    selector: MacSelector,
    new: &MacAddress,
    restart: bool,
) -> ResolverResult<()> {
    hypervisor.lookup_by_name(machine).await?;

    if ensure_stopped(hypervisor, machine).await? == ShutdownOutcome::StillRunning {
        warn!(%machine, "machine still active after graceful stop attempts");
    }

    let domain_xml = hypervisor.fetch_xml(machine).await?;
    let rewritten = match &selector {
        MacSelector::FirstInterface => xml::rewrite_first_interface_mac(&domain_xml, new)?,
        MacSelector::Address(old) => xml::rewrite_interface_mac(&domain_xml, old, new)?,
    };
    let rewritten = rewritten.ok_or_else(|| ResolverError::AttributeMismatch {
        machine: machine.to_string(),
        expected: match &selector {
            MacSelector::FirstInterface => "first interface".to_string(),
            MacSelector::Address(old) => old.to_string(),
        },
    })?;

    hypervisor.define_xml(&rewritten).await?;
    info!(%machine, %new, "interface address reassigned");

    if restart {
        hypervisor.start(machine).await?;
        info!(%machine, "machine restarted");
    }
    Ok(())
}

/// Drive a machine to the stopped state, best effort.
///
/// A no-op when the machine is already stopped. Otherwise issues one
/// graceful stop request and polls activity at [`STOP_POLL_INTERVAL`] up to
/// [`STOP_POLL_LIMIT`] times; if the machine is still active the stop
/// request is reissued once and the outcome reported — never a forced kill.
pub async fn ensure_stopped(
    hypervisor: &dyn Hypervisor,
    machine: &str,
) -> ResolverResult<ShutdownOutcome> {
    if !hypervisor.is_active(machine).await? {
        return Ok(ShutdownOutcome::Confirmed);
    }

    info!(%machine, "requesting graceful stop");
    hypervisor.stop(machine).await?;

    for _ in 0..STOP_POLL_LIMIT {
        sleep(STOP_POLL_INTERVAL).await;
        if !hypervisor.is_active(machine).await? {
            return Ok(ShutdownOutcome::Confirmed);
        }
    }

    hypervisor.stop(machine).await?;
    if hypervisor.is_active(machine).await? {
        Ok(ShutdownOutcome::StillRunning)
    } else {
        Ok(ShutdownOutcome::Confirmed)
    }
}
