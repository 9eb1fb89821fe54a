//! MAC address conflict detection and resolution for libvirt-managed
//! virtual machines
//!
//! This crate scans the machines registered with one or more management
//! endpoints, detects duplicate link-layer addresses across the union of
//! their machine sets, generates locally-administered unique replacements,
//! and rewrites each affected machine's persisted domain XML through a
//! shutdown → redefine → restart cycle.
//!
//! # Architecture
//!
//! ```text
//! Endpoints → Scanner → (AddressSpace, ConflictRecord)
//!                             ↓
//!                         Resolver ← Address Generator
//!                             ↓
//!              stop → rewrite XML → redefine → restart
//! ```
//!
//! The management service sits behind the [`Hypervisor`] trait: one
//! implementation drives libvirt through `virsh`, one is an in-memory fake
//! for tests and dry runs.

pub mod config;
pub mod domain;
pub mod errors;
pub mod generator;
pub mod hypervisor;
pub mod resolver;
pub mod scanner;
pub mod xml;

// Re-export commonly used types
pub use config::{EndpointConfig, ResolverConfig};
pub use domain::{AddressError, MacAddress};
pub use errors::{ResolverError, ResolverResult};
pub use hypervisor::{Hypervisor, InMemoryHypervisor, MachineInfo, VirshHypervisor};
pub use resolver::{
    reassign_mac, resolve_conflicts, run_pass, MacSelector, PassReport, ShutdownOutcome,
};
pub use scanner::{AddressSpace, ConflictEntry, ConflictRecord};
