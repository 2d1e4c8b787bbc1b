//! RouterSyncer: periodic SSH polling of one EdgeRouter
//!
//! Runs in a background tokio task. Each cycle fetches ARP + DHCP, merges
//! them and publishes a new snapshot. A failed cycle keeps the previous
//! registry for attributes, marks it stale and records the error.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::edgerouter::client::EdgeRouterApi;
use crate::edgerouter::presence::{ClientView, PresenceState, PresenceTracker};
use crate::edgerouter::registry::Registry;
use crate::error::UpdateFailed;

/// Registry of one cycle plus the sightings carried up to it
#[derive(Debug, Clone)]
pub struct RouterSnapshot {
    pub registry: Registry,
    pub presence: PresenceTracker,
    pub updated_at: Option<DateTime<Utc>>,
    /// The latest cycle failed; `registry` is from an earlier one
    pub stale: bool,
}

impl RouterSnapshot {
    fn empty(consider_home: chrono::Duration) -> Self {
        Self {
            registry: Registry::default(),
            presence: PresenceTracker::new(consider_home),
            updated_at: None,
            stale: false,
        }
    }

    /// A stale registry is no ARP sighting; only the grace window counts
    pub fn state(&self, mac: &str, now: DateTime<Utc>) -> PresenceState {
        if self.stale {
            self.presence.grace_state(mac, now)
        } else {
            self.presence.state(&self.registry, mac, now)
        }
    }

    pub fn view(&self, mac: &str, now: DateTime<Utc>) -> ClientView {
        let mut view = self.presence.view(&self.registry, mac, now);
        view.state = self.state(mac, now);
        view
    }

    /// Every client still worth reporting: in the registry now, or sighted
    /// in ARP within the grace window
    pub fn tracked_macs(&self) -> BTreeSet<&str> {
        self.registry
            .macs()
            .chain(self.presence.known_macs())
            .collect()
    }

    pub fn views(&self, now: DateTime<Utc>) -> Vec<ClientView> {
        self.tracked_macs()
            .into_iter()
            .map(|mac| self.view(mac, now))
            .collect()
    }
}

/// What consumers observe after every cycle
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub snapshot: Arc<RouterSnapshot>,
    pub last_update_success: bool,
    pub last_error: Option<UpdateFailed>,
}

/// Background synchronization service for one EdgeRouter
pub struct RouterSyncer {
    api: EdgeRouterApi,
    interval: Duration,
    status: watch::Sender<SyncStatus>,
    cycle: Mutex<()>,
}

impl RouterSyncer {
    pub fn new(api: EdgeRouterApi, interval: Duration, consider_home: chrono::Duration) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            snapshot: Arc::new(RouterSnapshot::empty(consider_home)),
            last_update_success: false,
            last_error: None,
        });

        Self {
            api,
            interval,
            status,
            cycle: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn current(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Start the background sync loop (runs forever)
    pub async fn start(self: Arc<Self>) {
        tracing::info!(
            "[RouterSync] Starting background sync for {} (interval: {}s)",
            self.api.target(),
            self.interval.as_secs()
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        // a slow cycle swallows the ticks it overran
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let _ = self.refresh().await;
        }
    }

    pub async fn refresh(&self) -> Result<Arc<RouterSnapshot>, UpdateFailed> {
        self.refresh_at(Utc::now()).await
    }

    /// Run one fetch-and-merge cycle stamped with `now`
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Result<Arc<RouterSnapshot>, UpdateFailed> {
        let _guard = self.cycle.lock().await;

        match self.api.get_all_clients(now).await {
            Ok(registry) => {
                let previous = self.status.borrow().snapshot.clone();
                let snapshot = Arc::new(RouterSnapshot {
                    presence: previous.presence.observe(&registry, now),
                    registry,
                    updated_at: Some(now),
                    stale: false,
                });

                self.status.send_replace(SyncStatus {
                    snapshot: snapshot.clone(),
                    last_update_success: true,
                    last_error: None,
                });

                tracing::debug!(
                    "[RouterSync] {} synced: {} clients",
                    self.api.target(),
                    snapshot.registry.len()
                );
                Ok(snapshot)
            }
            Err(e) => {
                if e.is_auth() {
                    tracing::error!("[RouterSync] {} sync failed: {}", self.api.target(), e);
                } else {
                    tracing::warn!("[RouterSync] {} sync failed: {}", self.api.target(), e);
                }

                let previous = self.status.borrow().snapshot.clone();
                self.status.send_replace(SyncStatus {
                    snapshot: Arc::new(RouterSnapshot {
                        stale: true,
                        ..(*previous).clone()
                    }),
                    last_update_success: false,
                    last_error: Some(e.clone()),
                });
                Err(e)
            }
        }
    }
}
