//! EdgeRouter Presence - LAN client tracker
//!
//! Polls a Ubiquiti EdgeRouter over SSH, merges its ARP cache and DHCP
//! lease table into one client registry, and reports which clients are
//! home using a grace window after their last ARP sighting.

mod config;
mod edgerouter;
mod error;

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::edgerouter::report::{router_summary, PresenceChange, PresenceReporter};
use crate::edgerouter::sync::SyncStatus;
use crate::edgerouter::{EdgeRouterApi, RouterSyncer, SshRouterClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edgerouter_presence=info".into()),
        )
        .init();

    tracing::info!("Starting EdgeRouter Presence...");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Configuration loaded (scan interval: {}s, consider home: {}s)",
        config.tracking.scan_interval_secs,
        config.tracking.consider_home_secs
    );

    let api = EdgeRouterApi::new(Arc::new(SshRouterClient::from_config(&config.router)));

    if !api.test_connection().await {
        anyhow::bail!("Cannot connect to EdgeRouter at {}", api.target());
    }

    match api.get_system_info().await {
        Ok(info) => tracing::info!(
            "[EdgeRouter] {} ({}) version {}",
            info.get("hw_model").map(String::as_str).unwrap_or("EdgeRouter"),
            config.router.host,
            info.get("version").map(String::as_str).unwrap_or("Unknown"),
        ),
        Err(e) => tracing::warn!("[EdgeRouter] System info unavailable: {}", e),
    }

    let syncer = Arc::new(RouterSyncer::new(
        api,
        config.tracking.scan_interval(),
        config.tracking.consider_home(),
    ));

    // First refresh must succeed before tracking starts
    syncer.refresh().await?;

    let mut updates = syncer.subscribe();
    let mut reporter = PresenceReporter::default();
    report(&syncer.current(), &mut reporter);

    start_background_tasks(syncer);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = updates.borrow_and_update().clone();
                report(&status, &mut reporter);
            }
        }
    }

    Ok(())
}

/// Start background tasks (router syncer)
fn start_background_tasks(syncer: Arc<RouterSyncer>) {
    tokio::spawn(async move {
        syncer.start().await;
    });
}

fn report(status: &SyncStatus, reporter: &mut PresenceReporter) {
    if let Some(e) = &status.last_error {
        if e.is_auth() {
            tracing::error!("Update failed, check credentials: {}", e);
        } else {
            tracing::warn!("Update failed, keeping last known clients: {}", e);
        }
    }

    let now = Utc::now();
    for change in reporter.update(&status.snapshot, now) {
        match change {
            PresenceChange::Discovered(view) => tracing::info!(
                "New client {} ({}) is {}: {}",
                view.name,
                view.mac,
                view.state.as_str(),
                serde_json::to_string(&view).unwrap_or_default()
            ),
            PresenceChange::Changed { from, view } => tracing::info!(
                "Client {} ({}) {} -> {}",
                view.name,
                view.mac,
                from.as_str(),
                view.state.as_str()
            ),
        }
    }

    let summary = router_summary(&status.snapshot.registry);
    tracing::info!(
        "Connected clients: {}, ARP entries: {}, DHCP leases: {}",
        summary["connected_clients"],
        summary["arp_entries"],
        summary["dhcp_leases"]
    );
    tracing::debug!("Router summary: {}", summary);
}
