// Copyright (c) 2025 - Cowboy AI, Inc.
//! Real management backend shelling out to `virsh`
//!
//! Every operation is one `virsh -c <uri> …` invocation. The connection is
//! verified once at construction; a failure there is fatal for the pass.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::EndpointConfig;
use crate::errors::{ResolverError, ResolverResult};
use crate::hypervisor::{Hypervisor, MachineInfo};

/// Hypervisor backend driving a libvirt endpoint through the `virsh` CLI
#[derive(Debug, Clone)]
pub struct VirshHypervisor {
    uri: String,
}

impl VirshHypervisor {
    /// Connect to the endpoint described by `config`
    ///
    /// Verifies the connection with `virsh version`; failure is
    /// [`ResolverError::Connection`].
    pub async fn connect(config: &EndpointConfig) -> ResolverResult<Self> {
        let uri = config.uri();
        let output = Command::new("virsh")
            .args(["-c", &uri, "version"])
            .output()
            .await
            .map_err(|e| ResolverError::Connection(format!("failed to run virsh: {e}")))?;

        if !output.status.success() {
            return Err(ResolverError::Connection(format!(
                "cannot open connection to {uri}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(%uri, "connection established");
        Ok(Self { uri })
    }

    async fn virsh(&self, args: &[&str]) -> ResolverResult<String> {
        let output = Command::new("virsh")
            .arg("-c")
            .arg(&self.uri)
            .args(args)
            .output()
            .await
            .map_err(|e| ResolverError::Hypervisor(format!("failed to run virsh: {e}")))?;

        if !output.status.success() {
            return Err(ResolverError::Hypervisor(format!(
                "virsh {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Parse one row of `virsh list --all` output: ` Id  Name  State`.
    ///
    /// Inactive machines carry `-` in the id column, matching libvirt's
    /// "active means positive id" convention.
    fn parse_list_row(row: &str) -> Option<MachineInfo> {
        let mut fields = row.split_whitespace();
        let id_field = fields.next()?;
        let name = fields.next()?.to_string();
        let id = id_field.parse::<u32>().ok();
        Some(MachineInfo {
            name,
            id,
            active: id.is_some(),
        })
    }
}

#[async_trait]
impl Hypervisor for VirshHypervisor {
    fn endpoint(&self) -> &str {
        &self.uri
    }

    async fn list_machines(&self, active_only: bool) -> ResolverResult<Vec<MachineInfo>> {
        let output = self.virsh(&["list", "--all"]).await?;
        let machines = output
            .lines()
            .skip_while(|line| !line.trim_start().starts_with('-'))
            .skip(1)
            .filter_map(Self::parse_list_row)
            .filter(|m| m.active || !active_only)
            .collect();
        Ok(machines)
    }

    async fn lookup_by_name(&self, name: &str) -> ResolverResult<MachineInfo> {
        self.list_machines(false)
            .await?
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                ResolverError::Lookup(format!("machine {name} not found on {}", self.uri))
            })
    }

    async fn fetch_xml(&self, name: &str) -> ResolverResult<String> {
        self.virsh(&["dumpxml", name]).await
    }

    async fn define_xml(&self, xml: &str) -> ResolverResult<()> {
        let mut child = Command::new("virsh")
            .args(["-c", &self.uri, "define", "/dev/stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ResolverError::Hypervisor(format!("failed to run virsh define: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ResolverError::Hypervisor("virsh define stdin unavailable".into()))?;
        stdin
            .write_all(xml.as_bytes())
            .await
            .map_err(|e| ResolverError::Hypervisor(format!("failed to write domain XML: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ResolverError::Hypervisor(format!("virsh define failed: {e}")))?;

        if !output.status.success() {
            return Err(ResolverError::Hypervisor(format!(
                "virsh define: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(uri = %self.uri, "domain redefined");
        Ok(())
    }

    async fn start(&self, name: &str) -> ResolverResult<()> {
        self.virsh(&["start", name]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> ResolverResult<()> {
        self.virsh(&["shutdown", name]).await?;
        Ok(())
    }

    async fn is_active(&self, name: &str) -> ResolverResult<bool> {
        let state = self.virsh(&["domstate", name]).await?;
        Ok(!matches!(state.trim(), "shut off" | "crashed"))
    }

    async fn disconnect(&self) -> ResolverResult<()> {
        // virsh opens a fresh connection per invocation; nothing to release.
        debug!(uri = %self.uri, "connection closed");
        Ok(())
    }
}
