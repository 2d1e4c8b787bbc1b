//! Presence evaluation with a grace window ("consider home")
//!
//! A client is home while it is in the current ARP snapshot, and for
//! `consider_home` after its last ARP sighting. DHCP leases never keep a
//! client home on their own.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::edgerouter::registry::{ClientRecord, ConnectionType, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Home,
    NotHome,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Home => "home",
            PresenceState::NotHome => "not_home",
        }
    }

    pub fn is_home(&self) -> bool {
        *self == PresenceState::Home
    }
}

/// Last ARP sighting per MAC, carried across polling cycles.
///
/// Immutable once built: `observe` returns the next tracker so it can be
/// published together with the registry it was derived from.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    consider_home: Duration,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl PresenceTracker {
    pub fn new(consider_home: Duration) -> Self {
        Self {
            consider_home,
            last_seen: HashMap::new(),
        }
    }

    pub fn consider_home(&self) -> Duration {
        self.consider_home
    }

    /// Fold one registry snapshot into the carried-forward sightings.
    ///
    /// Sightings older than `consider_home` are dropped once their MAC has
    /// left the registry; they can no longer keep anything home.
    pub fn observe(&self, registry: &Registry, now: DateTime<Utc>) -> Self {
        let mut last_seen = self.last_seen.clone();

        for client in registry.connected() {
            if let Some(seen) = client.last_seen {
                let slot = last_seen.entry(client.mac.clone()).or_insert(seen);
                if seen > *slot {
                    *slot = seen;
                }
            }
        }

        last_seen.retain(|mac, seen| registry.get(mac).is_some() || now - *seen < self.consider_home);

        Self {
            consider_home: self.consider_home,
            last_seen,
        }
    }

    pub fn last_seen(&self, mac: &str) -> Option<DateTime<Utc>> {
        self.last_seen.get(mac).copied()
    }

    /// MACs with a retained ARP sighting
    pub fn known_macs(&self) -> impl Iterator<Item = &str> {
        self.last_seen.keys().map(String::as_str)
    }

    /// State against `registry` taken as the current ARP snapshot
    pub fn state(&self, registry: &Registry, mac: &str, now: DateTime<Utc>) -> PresenceState {
        if registry.get(mac).is_some_and(|c| c.in_arp) {
            return PresenceState::Home;
        }
        self.grace_state(mac, now)
    }

    /// State from the last sighting alone, for when no current ARP snapshot
    /// exists (the latest cycle failed)
    pub fn grace_state(&self, mac: &str, now: DateTime<Utc>) -> PresenceState {
        if self.consider_home <= Duration::zero() {
            return PresenceState::NotHome;
        }

        match self.last_seen(mac) {
            Some(seen) if now - seen < self.consider_home => PresenceState::Home,
            _ => PresenceState::NotHome,
        }
    }

    pub fn is_home(&self, registry: &Registry, mac: &str, now: DateTime<Utc>) -> bool {
        self.state(registry, mac, now).is_home()
    }

    /// Tracker-facing view of one client
    pub fn view(&self, registry: &Registry, mac: &str, now: DateTime<Utc>) -> ClientView {
        let client = registry.get(mac);
        ClientView {
            mac: mac.to_string(),
            name: client.map_or_else(|| mac.to_string(), |c| c.name().to_string()),
            state: self.state(registry, mac, now),
            ip_address: client.and_then(|c| c.ip.clone()),
            hostname: client.and_then(|c| c.hostname.clone()),
            interface: client.and_then(|c| c.interface.clone()),
            lease_expires: client.and_then(|c| c.lease_expires.clone()),
            last_seen: self.last_seen(mac).map(|t| t.to_rfc3339()),
            connection_type: client.and_then(ClientRecord::connection_type),
        }
    }
}

/// Per-client attributes exposed to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientView {
    pub mac: String,
    pub name: String,
    pub state: PresenceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
}
