//! Client registry: ARP + DHCP rows merged into one record per MAC

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::edgerouter::parser::{ArpEntry, DhcpLease, UNKNOWN_HOSTNAME};

/// How a client is attached, derived from its provenance flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// In ARP with a lease
    Dhcp,
    /// In ARP without a lease
    Static,
    /// Lease only, not currently in ARP
    DhcpInactive,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Dhcp => "dhcp",
            ConnectionType::Static => "static",
            ConnectionType::DhcpInactive => "dhcp_inactive",
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single client as seen in one fetch cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub mac: String,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub interface: Option<String>,
    pub lease_expires: Option<String>,
    pub in_arp: bool,
    pub has_lease: bool,
    /// Only set by an ARP sighting
    pub last_seen: Option<DateTime<Utc>>,
}

impl ClientRecord {
    fn new(mac: &str) -> Self {
        Self {
            mac: mac.to_string(),
            ip: None,
            hostname: None,
            interface: None,
            lease_expires: None,
            in_arp: false,
            has_lease: false,
            last_seen: None,
        }
    }

    /// Best display name: hostname, then IP, then MAC
    pub fn name(&self) -> &str {
        match (&self.hostname, &self.ip) {
            (Some(hostname), _) if hostname != UNKNOWN_HOSTNAME => hostname,
            (_, Some(ip)) => ip,
            _ => &self.mac,
        }
    }

    pub fn connection_type(&self) -> Option<ConnectionType> {
        match (self.in_arp, self.has_lease) {
            (true, true) => Some(ConnectionType::Dhcp),
            (true, false) => Some(ConnectionType::Static),
            (false, true) => Some(ConnectionType::DhcpInactive),
            (false, false) => None,
        }
    }
}

/// Snapshot of every client seen in one fetch cycle, keyed by MAC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    clients: BTreeMap<String, ClientRecord>,
}

impl Registry {
    /// Build a registry from one cycle's rows.
    ///
    /// ARP rows are applied first and own `ip`/`interface`; lease rows only
    /// fill the IP of clients ARP did not report, and always supply hostname
    /// and expiration.
    pub fn merge(arp: &[ArpEntry], leases: &[DhcpLease], now: DateTime<Utc>) -> Self {
        let mut clients: BTreeMap<String, ClientRecord> = BTreeMap::new();

        for entry in arp {
            let client = clients
                .entry(entry.mac.clone())
                .or_insert_with(|| ClientRecord::new(&entry.mac));
            client.ip = Some(entry.ip.clone());
            client.interface = entry.interface.clone();
            client.in_arp = true;
            client.last_seen = Some(now);
        }

        for lease in leases {
            let client = clients.entry(lease.mac.clone()).or_insert_with(|| {
                let mut client = ClientRecord::new(&lease.mac);
                client.ip = Some(lease.ip.clone());
                client
            });
            client.hostname = lease.hostname.clone();
            client.lease_expires = lease.expires.clone();
            client.has_lease = true;
            if client.in_arp {
                client.last_seen = Some(now);
            }
        }

        clients.retain(|_, c| c.in_arp || c.has_lease);

        Self { clients }
    }

    pub fn get(&self, mac: &str) -> Option<&ClientRecord> {
        self.clients.get(mac)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }

    pub fn macs(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Clients currently in the ARP cache
    pub fn connected(&self) -> impl Iterator<Item = &ClientRecord> {
        self.iter().filter(|c| c.in_arp)
    }

    pub fn leased(&self) -> impl Iterator<Item = &ClientRecord> {
        self.iter().filter(|c| c.has_lease)
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            connected_clients: self.connected().count(),
            arp_entries: self.connected().count(),
            dhcp_leases: self.leased().count(),
            total_clients: self.len(),
        }
    }
}

/// Router-level counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub connected_clients: usize,
    pub arp_entries: usize,
    pub dhcp_leases: usize,
    pub total_clients: usize,
}
