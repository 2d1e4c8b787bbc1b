//! EdgeRouter SSH integration module
//!
//! - `client`: SSH command channel and router-level fetches
//! - `parser`: `show arp` / `show dhcp leases` text parsers
//! - `registry`: ARP + DHCP merge into one record per MAC
//! - `presence`: home/not_home with a grace window
//! - `sync`: Background polling synchronization
//! - `report`: presence changes and router summaries

pub mod client;
pub mod parser;
pub mod presence;
pub mod registry;
pub mod report;
pub mod sync;

pub use client::{EdgeRouterApi, SshRouterClient};
pub use sync::RouterSyncer;
