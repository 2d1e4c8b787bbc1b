//! Turns published snapshots into presence changes and router summaries

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::edgerouter::presence::{ClientView, PresenceState};
use crate::edgerouter::registry::Registry;
use crate::edgerouter::sync::RouterSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// First time this MAC shows up
    Discovered(ClientView),
    Changed { from: PresenceState, view: ClientView },
}

/// Remembers the last reported state per client
#[derive(Debug, Default)]
pub struct PresenceReporter {
    states: HashMap<String, PresenceState>,
}

impl PresenceReporter {
    pub fn update(&mut self, snapshot: &RouterSnapshot, now: DateTime<Utc>) -> Vec<PresenceChange> {
        let mut changes = Vec::new();

        for view in snapshot.views(now) {
            match self.states.insert(view.mac.clone(), view.state) {
                None => changes.push(PresenceChange::Discovered(view)),
                Some(from) if from != view.state => {
                    changes.push(PresenceChange::Changed { from, view })
                }
                Some(_) => {}
            }
        }

        // expired sightings drop out of the snapshot; report them once as gone
        let tracked = snapshot.tracked_macs();
        let mut dropped: Vec<String> = self
            .states
            .keys()
            .filter(|mac| !tracked.contains(mac.as_str()))
            .cloned()
            .collect();
        dropped.sort();

        for mac in dropped {
            if let Some(PresenceState::Home) = self.states.remove(&mac) {
                changes.push(PresenceChange::Changed {
                    from: PresenceState::Home,
                    view: snapshot.view(&mac, now),
                });
            }
        }

        changes
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

/// Connected-client, ARP and lease counters with their attribute lists
pub fn router_summary(registry: &Registry) -> Value {
    let summary = registry.summary();

    let clients: Vec<Value> = registry
        .connected()
        .map(|c| {
            json!({
                "mac": c.mac,
                "ip": c.ip,
                "hostname": c.hostname,
                "interface": c.interface,
            })
        })
        .collect();

    let leases: Vec<Value> = registry
        .leased()
        .map(|c| {
            json!({
                "mac": c.mac,
                "ip": c.ip,
                "hostname": c.hostname,
                "expires": c.lease_expires,
            })
        })
        .collect();

    json!({
        "connected_clients": summary.connected_clients,
        "arp_entries": summary.arp_entries,
        "dhcp_leases": summary.dhcp_leases,
        "clients": clients,
        "leases": leases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgerouter::parser::{ArpEntry, DhcpLease};
    use crate::edgerouter::presence::PresenceTracker;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn snapshot(previous: Option<&RouterSnapshot>, arp: &[ArpEntry], leases: &[DhcpLease], now: DateTime<Utc>) -> RouterSnapshot {
        let registry = Registry::merge(arp, leases, now);
        let presence = previous
            .map(|s| s.presence.clone())
            .unwrap_or_else(|| PresenceTracker::new(Duration::seconds(30)))
            .observe(&registry, now);
        RouterSnapshot {
            registry,
            presence,
            updated_at: Some(now),
            stale: false,
        }
    }

    fn laptop() -> ArpEntry {
        ArpEntry {
            ip: "192.168.1.10".to_string(),
            mac: "aa:bb:cc:dd:ee:10".to_string(),
            interface: Some("eth1".to_string()),
        }
    }

    fn phone_lease() -> DhcpLease {
        DhcpLease {
            ip: "192.168.1.20".to_string(),
            mac: "aa:bb:cc:dd:ee:20".to_string(),
            hostname: Some("phone".to_string()),
            expires: Some("2024/01/01 13:00:00".to_string()),
        }
    }

    #[test]
    fn test_discovery_then_transition() {
        let mut reporter = PresenceReporter::default();

        let first = snapshot(None, &[laptop()], &[phone_lease()], t(0));
        let changes = reporter.update(&first, t(0));
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, PresenceChange::Discovered(_))));
        assert_eq!(reporter.tracked(), 2);

        // still inside the 30s window: nothing to report
        let second = snapshot(Some(&first), &[], &[phone_lease()], t(20));
        assert!(reporter.update(&second, t(20)).is_empty());

        // the laptop's sighting expires and it leaves the snapshot
        let third = snapshot(Some(&second), &[], &[phone_lease()], t(30));
        assert!(!third.tracked_macs().contains("aa:bb:cc:dd:ee:10"));
        let changes = reporter.update(&third, t(30));
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            PresenceChange::Changed { from, view } => {
                assert_eq!(*from, PresenceState::Home);
                assert_eq!(view.mac, "aa:bb:cc:dd:ee:10");
                assert_eq!(view.state, PresenceState::NotHome);
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert_eq!(reporter.tracked(), 1);

        let fourth = snapshot(Some(&third), &[], &[phone_lease()], t(40));
        assert!(reporter.update(&fourth, t(40)).is_empty());
    }

    #[test]
    fn test_dropped_not_home_client_is_forgotten_quietly() {
        let mut reporter = PresenceReporter::default();

        let first = snapshot(None, &[], &[phone_lease()], t(0));
        assert_eq!(reporter.update(&first, t(0)).len(), 1);

        // lease gone, never sighted in ARP
        let second = snapshot(Some(&first), &[], &[], t(10));
        assert!(reporter.update(&second, t(10)).is_empty());
        assert_eq!(reporter.tracked(), 0);
    }

    #[test]
    fn test_router_summary() {
        let registry = Registry::merge(&[laptop()], &[phone_lease()], t(0));

        let summary = router_summary(&registry);

        assert_eq!(summary["connected_clients"], 1);
        assert_eq!(summary["arp_entries"], 1);
        assert_eq!(summary["dhcp_leases"], 1);
        assert_eq!(summary["clients"][0]["interface"], "eth1");
        assert_eq!(summary["leases"][0]["hostname"], "phone");
        assert_eq!(summary["leases"][0]["expires"], "2024/01/01 13:00:00");
    }
}
