//! SSH client for Ubiquiti EdgeRouter (EdgeOS)
//!
//! Uses `tokio::process::Command` with `sshpass` for password-based SSH.
//! Every command goes through the EdgeOS operational-mode wrapper so that
//! `show ...` commands run non-interactively.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;

use crate::config::RouterConfig;
use crate::edgerouter::parser::{self, ArpEntry, DhcpLease};
use crate::edgerouter::registry::Registry;
use crate::error::{ChannelError, UpdateFailed};

/// EdgeOS CLI wrapper for operational-mode commands
pub const OP_CMD_WRAPPER: &str = "/opt/vyatta/bin/vyatta-op-cmd-wrapper";

pub const CMD_SHOW_VERSION: &str = "show version";
pub const CMD_SHOW_ARP: &str = "show arp";
pub const CMD_SHOW_DHCP_LEASES: &str = "show dhcp leases";

// sshpass exit codes
const SSHPASS_BAD_PASSWORD: i32 = 5;
const SSHPASS_HOST_KEY_UNKNOWN: i32 = 6;
// ssh reserves 255 for its own errors; a remote command exiting 255 after
// writing output is left to the caller
const SSH_ERROR: i32 = 255;

// ============================================================================
// Channel
// ============================================================================

/// Runs one operational command on the router and returns its stdout
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn exec(&self, command: &str) -> Result<String, ChannelError>;

    /// `user@host` for log lines
    fn target(&self) -> String;
}

/// SSH channel to a single EdgeRouter
pub struct SshRouterClient {
    pub host: String,
    pub port: u16,
    pub username: String,
    password: String,
    pub timeout: Duration,
}

impl SshRouterClient {
    pub fn new(host: String, port: u16, username: String, password: String, timeout: Duration) -> Self {
        Self {
            host,
            port,
            username,
            password,
            timeout,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.username.clone(),
            config.password.clone(),
            config.timeout(),
        )
    }

    /// Arguments passed to `sshpass` (password travels via `SSHPASS`)
    fn ssh_args(&self, command: &str) -> Vec<String> {
        let connect_timeout = self.timeout.as_secs().max(1);
        vec![
            "-e".to_string(),
            "ssh".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", connect_timeout),
            "-o".to_string(),
            "PubkeyAuthentication=no".to_string(),
            "-o".to_string(),
            "NumberOfPasswordPrompts=1".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            format!("{}@{}", self.username, self.host),
            wrap_command(command),
        ]
    }

    fn auth_error(&self) -> ChannelError {
        ChannelError::Authentication {
            username: self.username.clone(),
            host: self.host.clone(),
        }
    }

    fn connection_error(&self, reason: impl Into<String>) -> ChannelError {
        ChannelError::Connection {
            host: self.host.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CommandChannel for SshRouterClient {
    async fn exec(&self, command: &str) -> Result<String, ChannelError> {
        let child = Command::new("sshpass")
            .args(self.ssh_args(command))
            .env("SSHPASS", &self.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.connection_error(format!("{} (is sshpass installed?)", e)))?;

        tracing::debug!("[EdgeRouter] Running '{}' on {}", command, self.host);

        // dropping the future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.connection_error(format!("Network error: {}", e))),
            Err(_) => {
                return Err(ChannelError::Timeout {
                    host: self.host.clone(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);

        match classify_exit(output.status.code(), stdout.trim().is_empty(), &stderr) {
            Some(ExitKind::Authentication) => return Err(self.auth_error()),
            Some(ExitKind::Connection(reason)) => return Err(self.connection_error(reason)),
            None => {}
        }

        if !stderr.trim().is_empty() {
            tracing::warn!(
                "[EdgeRouter] Command '{}' produced error: {}",
                command,
                stderr.trim()
            );
        }

        Ok(stdout)
    }

    fn target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

pub fn wrap_command(command: &str) -> String {
    format!("{} {}", OP_CMD_WRAPPER, command)
}

#[derive(Debug, PartialEq, Eq)]
enum ExitKind {
    Authentication,
    Connection(String),
}

/// Map an `sshpass`/`ssh` exit status to a channel failure.
///
/// Any other non-zero status belongs to the remote command and is not a
/// channel failure.
fn classify_exit(code: Option<i32>, stdout_empty: bool, stderr: &str) -> Option<ExitKind> {
    let stderr = stderr.trim();
    match code {
        Some(0) => None,
        None => Some(ExitKind::Connection("ssh terminated by signal".to_string())),
        Some(SSH_ERROR) if stdout_empty && stderr.contains("Permission denied") => {
            Some(ExitKind::Authentication)
        }
        Some(SSH_ERROR) if stdout_empty && stderr.is_empty() => {
            Some(ExitKind::Connection(format!("ssh exited with status {}", SSH_ERROR)))
        }
        Some(SSH_ERROR) if stdout_empty => Some(ExitKind::Connection(stderr.to_string())),
        Some(SSHPASS_BAD_PASSWORD) if stdout_empty => Some(ExitKind::Authentication),
        Some(SSHPASS_HOST_KEY_UNKNOWN) if stdout_empty => {
            Some(ExitKind::Connection("host key verification failed".to_string()))
        }
        Some(_) => None,
    }
}

// ============================================================================
// EdgeRouter API
// ============================================================================

/// Router-level operations on top of a command channel
#[derive(Clone)]
pub struct EdgeRouterApi {
    channel: Arc<dyn CommandChannel>,
}

impl EdgeRouterApi {
    pub fn new(channel: Arc<dyn CommandChannel>) -> Self {
        Self { channel }
    }

    pub fn target(&self) -> String {
        self.channel.target()
    }

    /// Test the connection with `show version`
    pub async fn test_connection(&self) -> bool {
        match self.channel.exec(CMD_SHOW_VERSION).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("[EdgeRouter] Connection test failed: {}", e);
                false
            }
        }
    }

    /// `show version` as `key: value` pairs, keys lowercased with `_` for spaces
    pub async fn get_system_info(&self) -> Result<BTreeMap<String, String>, ChannelError> {
        let output = self.channel.exec(CMD_SHOW_VERSION).await?;
        Ok(parse_system_info(&output))
    }

    pub async fn get_arp_table(&self) -> Result<Vec<ArpEntry>, ChannelError> {
        let output = self.channel.exec(CMD_SHOW_ARP).await?;
        tracing::debug!("[EdgeRouter] ARP table output:\n{}", output);
        Ok(parser::parse_arp_table(&output))
    }

    pub async fn get_dhcp_leases(&self) -> Result<Vec<DhcpLease>, ChannelError> {
        let output = self.channel.exec(CMD_SHOW_DHCP_LEASES).await?;
        tracing::debug!("[EdgeRouter] DHCP leases output:\n{}", output);
        Ok(parser::parse_dhcp_leases(&output))
    }

    /// Fetch both tables and merge them.
    ///
    /// One failed table is logged and treated as empty. The cycle fails when
    /// both tables fail or when the router rejects the credentials.
    pub async fn get_all_clients(&self, now: DateTime<Utc>) -> Result<Registry, UpdateFailed> {
        let arp = self.get_arp_table().await;
        if let Err(e) = &arp {
            if e.is_auth() {
                return Err(UpdateFailed::Channel(e.clone()));
            }
        }

        let dhcp = self.get_dhcp_leases().await;

        let (arp, leases) = match (arp, dhcp) {
            (Err(arp), Err(dhcp)) => return Err(UpdateFailed::AllSourcesFailed { arp, dhcp }),
            (_, Err(e)) if e.is_auth() => return Err(UpdateFailed::Channel(e)),
            (Ok(arp), Err(e)) => {
                tracing::warn!("[EdgeRouter] Error getting DHCP leases: {}", e);
                (arp, Vec::new())
            }
            (Err(e), Ok(leases)) => {
                tracing::warn!("[EdgeRouter] Error getting ARP table: {}", e);
                (Vec::new(), leases)
            }
            (Ok(arp), Ok(leases)) => (arp, leases),
        };

        let registry = Registry::merge(&arp, &leases, now);
        tracing::info!("[EdgeRouter] Found {} unique clients", registry.len());
        Ok(registry)
    }
}

pub fn parse_system_info(output: &str) -> BTreeMap<String, String> {
    output
        .trim()
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| {
            (
                key.trim().to_lowercase().replace(' ', "_"),
                value.trim().to_string(),
            )
        })
        .collect()
}
