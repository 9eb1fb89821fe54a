// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory hypervisor backend
//!
//! A mutex-guarded machine table implementing the full [`Hypervisor`]
//! operation set, used by the test suite and useful for dry runs. Machines
//! list in name order, so scans over this backend are reproducible.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::errors::{ResolverError, ResolverResult};
use crate::hypervisor::{Hypervisor, MachineInfo};
use crate::xml;

#[derive(Debug, Clone)]
struct MachineEntry {
    xml: String,
    active: bool,
    id: Option<u32>,
}

/// In-memory stand-in for a libvirt endpoint
#[derive(Debug)]
pub struct InMemoryHypervisor {
    endpoint: String,
    machines: Mutex<BTreeMap<String, MachineEntry>>,
    /// Machines that ignore graceful stop requests
    stubborn: Mutex<HashSet<String>>,
    /// Machines that fail name lookup even while listed, simulating
    /// deletion between scan and resolution
    unresolvable: Mutex<HashSet<String>>,
    operations: Mutex<Vec<String>>,
    next_id: AtomicU32,
}

impl InMemoryHypervisor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            machines: Mutex::new(BTreeMap::new()),
            stubborn: Mutex::new(HashSet::new()),
            unresolvable: Mutex::new(HashSet::new()),
            operations: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Register a machine with the given domain XML
    pub fn add_machine(&self, name: impl Into<String>, xml: impl Into<String>, active: bool) {
        let id = active.then(|| self.next_id.fetch_add(1, Ordering::Relaxed));
        self.machines.lock().expect("machine table poisoned").insert(
            name.into(),
            MachineEntry {
                xml: xml.into(),
                active,
                id,
            },
        );
    }

    /// Unregister a machine
    pub fn remove_machine(&self, name: &str) {
        self.machines
            .lock()
            .expect("machine table poisoned")
            .remove(name);
    }

    /// Make a machine ignore graceful stop requests
    pub fn make_stubborn(&self, name: impl Into<String>) {
        self.stubborn
            .lock()
            .expect("stubborn set poisoned")
            .insert(name.into());
    }

    /// Make name lookup fail for a machine that still appears in listings
    pub fn make_unresolvable(&self, name: impl Into<String>) {
        self.unresolvable
            .lock()
            .expect("unresolvable set poisoned")
            .insert(name.into());
    }

    /// Current domain XML of a machine
    pub fn xml_of(&self, name: &str) -> Option<String> {
        self.machines
            .lock()
            .expect("machine table poisoned")
            .get(name)
            .map(|m| m.xml.clone())
    }

    /// Whether a machine is currently active
    pub fn is_running(&self, name: &str) -> bool {
        self.machines
            .lock()
            .expect("machine table poisoned")
            .get(name)
            .map(|m| m.active)
            .unwrap_or(false)
    }

    /// Every mutating operation issued against this endpoint, in order
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().expect("operation log poisoned").clone()
    }

    fn record(&self, operation: String) {
        self.operations
            .lock()
            .expect("operation log poisoned")
            .push(operation);
    }
}

#[async_trait]
impl Hypervisor for InMemoryHypervisor {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn list_machines(&self, active_only: bool) -> ResolverResult<Vec<MachineInfo>> {
        let machines = self.machines.lock().expect("machine table poisoned");
        Ok(machines
            .iter()
            .filter(|(_, m)| m.active || !active_only)
            .map(|(name, m)| MachineInfo {
                name: name.clone(),
                id: m.id,
                active: m.active,
            })
            .collect())
    }

    async fn lookup_by_name(&self, name: &str) -> ResolverResult<MachineInfo> {
        if self
            .unresolvable
            .lock()
            .expect("unresolvable set poisoned")
            .contains(name)
        {
            return Err(ResolverError::Lookup(format!(
                "machine {name} not found on {}",
                self.endpoint
            )));
        }
        let machines = self.machines.lock().expect("machine table poisoned");
        machines
            .get(name)
            .map(|m| MachineInfo {
                name: name.to_string(),
                id: m.id,
                active: m.active,
            })
            .ok_or_else(|| {
                ResolverError::Lookup(format!("machine {name} not found on {}", self.endpoint))
            })
    }

    async fn fetch_xml(&self, name: &str) -> ResolverResult<String> {
        self.xml_of(name).ok_or_else(|| {
            ResolverError::Lookup(format!("machine {name} not found on {}", self.endpoint))
        })
    }

    async fn define_xml(&self, domain_xml: &str) -> ResolverResult<()> {
        let name = xml::domain_name(domain_xml)?;
        self.record(format!("define {name}"));
        let mut machines = self.machines.lock().expect("machine table poisoned");
        match machines.get_mut(&name) {
            Some(entry) => entry.xml = domain_xml.to_string(),
            None => {
                machines.insert(
                    name,
                    MachineEntry {
                        xml: domain_xml.to_string(),
                        active: false,
                        id: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn start(&self, name: &str) -> ResolverResult<()> {
        self.record(format!("start {name}"));
        let mut machines = self.machines.lock().expect("machine table poisoned");
        let entry = machines.get_mut(name).ok_or_else(|| {
            ResolverError::Hypervisor(format!("cannot start unknown machine {name}"))
        })?;
        entry.active = true;
        entry.id = Some(self.next_id.fetch_add(1, Ordering::Relaxed));
        Ok(())
    }

    async fn stop(&self, name: &str) -> ResolverResult<()> {
        self.record(format!("stop {name}"));
        if self
            .stubborn
            .lock()
            .expect("stubborn set poisoned")
            .contains(name)
        {
            return Ok(());
        }
        let mut machines = self.machines.lock().expect("machine table poisoned");
        let entry = machines.get_mut(name).ok_or_else(|| {
            ResolverError::Hypervisor(format!("cannot stop unknown machine {name}"))
        })?;
        entry.active = false;
        entry.id = None;
        Ok(())
    }

    async fn is_active(&self, name: &str) -> ResolverResult<bool> {
        let machines = self.machines.lock().expect("machine table poisoned");
        machines.get(name).map(|m| m.active).ok_or_else(|| {
            ResolverError::Lookup(format!("machine {name} not found on {}", self.endpoint))
        })
    }

    async fn disconnect(&self) -> ResolverResult<()> {
        self.record("disconnect".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<domain type='kvm'>
  <name>vm-a</name>
  <devices><interface type='network'><mac address="52:54:00:aa:aa:aa"/></interface></devices>
</domain>"#;

    #[test]
    fn test_lifecycle_round_trip() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("vm-a", XML, true);

            assert!(hv.is_active("vm-a").await.unwrap());
            hv.stop("vm-a").await.unwrap();
            assert!(!hv.is_active("vm-a").await.unwrap());
            hv.start("vm-a").await.unwrap();
            assert!(hv.is_active("vm-a").await.unwrap());

            assert_eq!(hv.operations(), vec!["stop vm-a", "start vm-a"]);
        });
    }

    #[test]
    fn test_define_replaces_configuration_by_domain_name() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("vm-a", XML, false);

            let updated = XML.replace("52:54:00:aa:aa:aa", "52:54:00:bb:bb:bb");
            hv.define_xml(&updated).await.unwrap();
            assert_eq!(hv.xml_of("vm-a").unwrap(), updated);
        });
    }

    #[test]
    fn test_active_only_listing() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("vm-a", XML, true);
            hv.add_machine("vm-b", XML.replace("vm-a", "vm-b"), false);

            let active = hv.list_machines(true).await.unwrap();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].name, "vm-a");

            let all = hv.list_machines(false).await.unwrap();
            assert_eq!(all.len(), 2);
        });
    }

    #[test]
    fn test_stubborn_machine_ignores_stop() {
        tokio_test::block_on(async {
            let hv = InMemoryHypervisor::new("test:///default");
            hv.add_machine("vm-a", XML, true);
            hv.make_stubborn("vm-a");

            hv.stop("vm-a").await.unwrap();
            assert!(hv.is_active("vm-a").await.unwrap());
        });
    }
}
