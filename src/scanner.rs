// Copyright (c) 2025 - Cowboy AI, Inc.
//! Conflict scanning
//!
//! Walks a machine set in list order, reading every interface address out of
//! each machine's domain XML. The first machine observed with an address
//! claims it; every later observation is recorded as a conflict against the
//! observing machine. The scan is purely observational — no machine is
//! mutated here.
//!
//! Both maps live for one resolution pass and are discarded with it.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::domain::MacAddress;
use crate::errors::ResolverResult;
use crate::hypervisor::Hypervisor;
use crate::xml;

/// Mapping from link-layer address to the name of the machine holding it
///
/// Invariant: at the end of a successful pass every address maps to exactly
/// one machine and no two machines share an address.
#[derive(Debug, Default)]
pub struct AddressSpace {
    owners: HashMap<MacAddress, String>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the address is already claimed
    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.owners.contains_key(mac)
    }

    /// Name of the machine holding the address
    pub fn owner(&self, mac: &MacAddress) -> Option<&str> {
        self.owners.get(mac).map(String::as_str)
    }

    /// Claim an address for a machine
    pub fn claim(&mut self, mac: MacAddress, owner: impl Into<String>) {
        self.owners.insert(mac, owner.into());
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// One machine's conflicting address and the endpoint that owns the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    /// The offending (old) address
    pub mac: MacAddress,
    /// Index of the owning endpoint in the caller's endpoint order
    pub endpoint: usize,
}

/// Mapping from conflicting machine name to its offending address
///
/// A machine appears here only on the second and later observations of an
/// address; the first claimant is never marked. Keyed by a BTreeMap so
/// resolution order is explicit: lexicographic machine-name order.
#[derive(Debug, Default)]
pub struct ConflictRecord {
    entries: BTreeMap<String, ConflictEntry>,
}

impl ConflictRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conflict for a machine
    pub fn record(&mut self, machine: impl Into<String>, mac: MacAddress, endpoint: usize) {
        self.entries.insert(machine.into(), ConflictEntry { mac, endpoint });
    }

    pub fn get(&self, machine: &str) -> Option<&ConflictEntry> {
        self.entries.get(machine)
    }

    /// Conflicting machines in resolution order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConflictEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan one endpoint's machine set into the pass-wide maps.
///
/// Returns the number of machines scanned. Machines are visited in the
/// order the backend lists them; interfaces in document order.
pub async fn scan_endpoint(
    hypervisor: &dyn Hypervisor,
    endpoint: usize,
    active_only: bool,
    space: &mut AddressSpace,
    conflicts: &mut ConflictRecord,
) -> ResolverResult<usize> {
    let machines = hypervisor.list_machines(active_only).await?;

    for machine in &machines {
        let domain_xml = hypervisor.fetch_xml(&machine.name).await?;
        for mac in xml::interface_macs(&domain_xml)? {
            debug!(
                machine = %machine.name,
                id = ?machine.id,
                %mac,
                "observed interface address"
            );
            if space.contains(&mac) {
                warn!(
                    machine = %machine.name,
                    %mac,
                    first_owner = ?space.owner(&mac),
                    "MAC conflict detected"
                );
                conflicts.record(&machine.name, mac, endpoint);
            } else {
                space.claim(mac, &machine.name);
            }
        }
    }

    Ok(machines.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::InMemoryHypervisor;

    fn domain_xml(name: &str, macs: &[&str]) -> String {
        let interfaces: String = macs
            .iter()
            .map(|mac| {
                format!(
                    "<interface type='network'><mac address=\"{mac}\"/><source network='default'/></interface>"
                )
            })
            .collect();
        format!("<domain type='kvm'><name>{name}</name><devices>{interfaces}</devices></domain>")
    }

    fn mac(s: &str) -> MacAddress {
        MacAddress::new(s).unwrap()
    }

    #[test]
    fn test_first_claimant_is_never_flagged() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("a", domain_xml("a", &["52:54:00:aa:aa:aa"]), true);
            hv.add_machine("b", domain_xml("b", &["52:54:00:aa:aa:aa"]), true);
            hv.add_machine("c", domain_xml("c", &["52:54:00:bb:bb:bb"]), true);

            let mut space = AddressSpace::new();
            let mut conflicts = ConflictRecord::new();
            let scanned = scan_endpoint(&hv, 0, true, &mut space, &mut conflicts)
                .await
                .unwrap();

            assert_eq!(scanned, 3);
            assert_eq!(space.owner(&mac("52:54:00:aa:aa:aa")), Some("a"));
            assert_eq!(space.owner(&mac("52:54:00:bb:bb:bb")), Some("c"));
            assert_eq!(conflicts.len(), 1);
            let entry = conflicts.get("b").unwrap();
            assert_eq!(entry.mac, mac("52:54:00:aa:aa:aa"));
            assert_eq!(entry.endpoint, 0);
        });
    }

    #[test]
    fn test_third_collision_still_blames_later_machines_only() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("a", domain_xml("a", &["52:54:00:aa:aa:aa"]), true);
            hv.add_machine("b", domain_xml("b", &["52:54:00:aa:aa:aa"]), true);
            hv.add_machine("c", domain_xml("c", &["52:54:00:aa:aa:aa"]), true);

            let mut space = AddressSpace::new();
            let mut conflicts = ConflictRecord::new();
            scan_endpoint(&hv, 0, true, &mut space, &mut conflicts)
                .await
                .unwrap();

            assert!(conflicts.get("a").is_none());
            assert!(conflicts.get("b").is_some());
            assert!(conflicts.get("c").is_some());
        });
    }

    #[test]
    fn test_scan_is_observational() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("a", domain_xml("a", &["52:54:00:aa:aa:aa"]), true);
            hv.add_machine("b", domain_xml("b", &["52:54:00:aa:aa:aa"]), true);

            let mut space = AddressSpace::new();
            let mut conflicts = ConflictRecord::new();
            scan_endpoint(&hv, 0, true, &mut space, &mut conflicts)
                .await
                .unwrap();

            assert!(hv.operations().is_empty());
        });
    }

    #[test]
    fn test_inactive_machines_skipped_when_active_only() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("a", domain_xml("a", &["52:54:00:aa:aa:aa"]), true);
            hv.add_machine("b", domain_xml("b", &["52:54:00:aa:aa:aa"]), false);

            let mut space = AddressSpace::new();
            let mut conflicts = ConflictRecord::new();
            let scanned = scan_endpoint(&hv, 0, true, &mut space, &mut conflicts)
                .await
                .unwrap();

            assert_eq!(scanned, 1);
            assert!(conflicts.is_empty());
        });
    }

    #[test]
    fn test_duplicate_interfaces_within_one_machine_conflict_with_themselves() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine(
                "a",
                domain_xml("a", &["52:54:00:aa:aa:aa", "52:54:00:aa:aa:aa"]),
                true,
            );

            let mut space = AddressSpace::new();
            let mut conflicts = ConflictRecord::new();
            scan_endpoint(&hv, 0, true, &mut space, &mut conflicts)
                .await
                .unwrap();

            assert_eq!(space.owner(&mac("52:54:00:aa:aa:aa")), Some("a"));
            assert_eq!(conflicts.get("a").unwrap().mac, mac("52:54:00:aa:aa:aa"));
        });
    }
}
