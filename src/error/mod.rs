//! Error handling module

use thiserror::Error;

/// Failure of a single remote command over the SSH channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Authentication failed for {username}@{host}")]
    Authentication { username: String, host: String },

    #[error("SSH error connecting to {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("Timeout connecting to {host}")]
    Timeout { host: String },
}

impl ChannelError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ChannelError::Authentication { .. })
    }
}

/// A polling cycle that produced no registry at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateFailed {
    #[error("Error communicating with EdgeRouter: {0}")]
    Channel(#[from] ChannelError),

    #[error("Error communicating with EdgeRouter: ARP table ({arp}); DHCP leases ({dhcp})")]
    AllSourcesFailed { arp: ChannelError, dhcp: ChannelError },
}

impl UpdateFailed {
    /// True when the operator has to fix credentials rather than wait
    pub fn is_auth(&self) -> bool {
        match self {
            UpdateFailed::Channel(e) => e.is_auth(),
            UpdateFailed::AllSourcesFailed { arp, dhcp } => arp.is_auth() || dhcp.is_auth(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0} is required")]
    Missing(&'static str),

    #[error("Configuration error: {field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}
