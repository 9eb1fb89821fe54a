// Copyright (c) 2025 - Cowboy AI, Inc.
//! Endpoint and resolver configuration

use serde::{Deserialize, Serialize};

use crate::errors::{ResolverError, ResolverResult};

/// Default local endpoint URI
pub const LOCAL_URI: &str = "qemu:///system";

/// Identity of one management endpoint
///
/// Composes into a libvirt connection URI. When any component is absent the
/// identity falls back to the default local endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// User principal on the remote host
    pub username: Option<String>,
    /// Network address of the remote host
    pub address: Option<String>,
    /// Transport protocol, e.g. "ssh" or "tls"
    pub protocol: Option<String>,
}

impl EndpointConfig {
    /// A remote endpoint with all components present
    pub fn remote(
        username: impl Into<String>,
        address: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            address: Some(address.into()),
            protocol: Some(protocol.into()),
        }
    }

    /// Connection URI for this endpoint
    pub fn uri(&self) -> String {
        match (&self.username, &self.address, &self.protocol) {
            (Some(username), Some(address), Some(protocol)) => {
                format!("qemu+{protocol}://{username}@{address}/system")
            }
            _ => LOCAL_URI.to_string(),
        }
    }
}

/// Configuration for one resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Endpoints to scan, in order; conflicts are detected globally across
    /// all of them
    pub endpoints: Vec<EndpointConfig>,
    /// Restrict the pass to active machines
    pub active_only: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![EndpointConfig::default()],
            active_only: true,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from environment variables
    ///
    /// - `MACFIX_ENDPOINTS`: JSON array of endpoint identities, e.g.
    ///   `[{"username":"vmadm","address":"192.168.38.16","protocol":"ssh"}]`
    /// - `MACFIX_ACTIVE_ONLY`: `true` (default) or `false`
    pub fn from_env() -> ResolverResult<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("MACFIX_ENDPOINTS") {
            config.endpoints = serde_json::from_str(&raw)?;
            if config.endpoints.is_empty() {
                return Err(ResolverError::Config(
                    "MACFIX_ENDPOINTS must list at least one endpoint".to_string(),
                ));
            }
        }

        if let Ok(raw) = std::env::var("MACFIX_ACTIVE_ONLY") {
            config.active_only = raw.parse().map_err(|_| {
                ResolverError::Config(format!("MACFIX_ACTIVE_ONLY must be true or false, got {raw}"))
            })?;
        }

        Ok(config)
    }
}
