// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hypervisor connection boundary
//!
//! Everything the conflict pass needs from the external virtualization
//! service, behind one explicit handle. No ambient global connection: every
//! operation takes the handle it runs against, which is what makes the pass
//! testable against [`InMemoryHypervisor`].

use async_trait::async_trait;

use crate::errors::ResolverResult;

pub mod memory;
pub mod virsh;

pub use memory::InMemoryHypervisor;
pub use virsh::VirshHypervisor;

/// Descriptor of a machine registered with a management endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInfo {
    /// Machine name, unique per endpoint
    pub name: String,
    /// Numeric id assigned by the hypervisor while the machine runs
    pub id: Option<u32>,
    /// Whether the machine is currently active
    pub active: bool,
}

/// Operations required from a management endpoint
///
/// One request in flight at a time; implementations do not need their own
/// concurrency control beyond what the underlying service provides.
#[async_trait]
pub trait Hypervisor: Send + Sync {
    /// Connection URI of this endpoint, for diagnostics
    fn endpoint(&self) -> &str;

    /// List registered machines, active-only or all
    async fn list_machines(&self, active_only: bool) -> ResolverResult<Vec<MachineInfo>>;

    /// Resolve a machine name to a fresh descriptor
    ///
    /// Fails with [`crate::ResolverError::Lookup`] when the machine no
    /// longer exists on this endpoint.
    async fn lookup_by_name(&self, name: &str) -> ResolverResult<MachineInfo>;

    /// Fetch the machine's persisted domain XML
    async fn fetch_xml(&self, name: &str) -> ResolverResult<String>;

    /// Replace a machine's persisted configuration with the given domain XML
    async fn define_xml(&self, xml: &str) -> ResolverResult<()>;

    /// Start a machine
    async fn start(&self, name: &str) -> ResolverResult<()>;

    /// Request a graceful shutdown; returns once the request is issued, not
    /// once the machine has stopped
    async fn stop(&self, name: &str) -> ResolverResult<()>;

    /// Whether the machine is currently active
    async fn is_active(&self, name: &str) -> ResolverResult<bool>;

    /// Release the connection
    async fn disconnect(&self) -> ResolverResult<()>;
}
