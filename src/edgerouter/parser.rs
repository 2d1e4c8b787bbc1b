//! Text parsers for EdgeOS `show arp` and `show dhcp leases` output
//!
//! Both parsers are lenient: heading rows, dashed rules, blank lines and any
//! line without a recognisable MAC address are skipped, never reported.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MAC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9a-fA-F]{2}[:-]){5}[0-9a-fA-F]{2}").unwrap());

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}/\d{2}/\d{2}").unwrap());

/// `YYYY/MM/DD HH:MM:SS`
const EXPIRATION_WIDTH: usize = 19;

/// Hostname placeholder EdgeOS prints for clients that sent none
pub const UNKNOWN_HOSTNAME: &str = "?";

/// One row of the ARP cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArpEntry {
    pub ip: String,
    pub mac: String,
    pub interface: Option<String>,
}

/// One row of the DHCP lease table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpLease {
    pub ip: String,
    pub mac: String,
    pub hostname: Option<String>,
    pub expires: Option<String>,
}

/// Normalize a MAC address to lowercase, colon-delimited form
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_lowercase().replace('-', ":")
}

/// Parse `show arp` output.
///
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 192.168.1.10     0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth1
/// ```
pub fn parse_arp_table(output: &str) -> Vec<ArpEntry> {
    let mut entries = Vec::new();

    for line in output.trim().lines() {
        if line.is_empty() || line.contains("Address") || line.contains("---") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }

        let Some(mac) = MAC_RE.find(line) else {
            continue;
        };

        // narrow rows are padded without the device column
        let interface = if parts.len() > 4 {
            parts.last().map(|s| s.to_string())
        } else {
            None
        };

        entries.push(ArpEntry {
            ip: parts[0].to_string(),
            mac: normalize_mac(mac.as_str()),
            interface,
        });
    }

    tracing::debug!("[EdgeRouter] Parsed {} ARP entries", entries.len());
    entries
}

/// Parse `show dhcp leases` output.
///
/// ```text
/// IP address      Hardware Address   Lease expiration     Pool       Client Name
/// ----------      ----------------   ----------------     ----       -----------
/// 192.168.1.50    00:11:22:33:44:55  2024/01/01 12:00:00  pool0      myhost
/// ```
pub fn parse_dhcp_leases(output: &str) -> Vec<DhcpLease> {
    let mut leases = Vec::new();
    let mut in_data = false;

    for line in output.trim().lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.contains("IP address") || line.contains("---") {
            in_data = true;
            continue;
        }
        if !in_data {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let Some(mac) = MAC_RE.find(line) else {
            continue;
        };

        let remaining = line[mac.end()..].trim();

        leases.push(DhcpLease {
            ip: parts[0].to_string(),
            mac: normalize_mac(mac.as_str()),
            hostname: extract_hostname(remaining),
            expires: extract_expiration(remaining),
        });
    }

    tracing::debug!("[EdgeRouter] Parsed {} DHCP leases", leases.len());
    leases
}

/// Last token after the MAC, when expiration and pool columns precede it
fn extract_hostname(remaining: &str) -> Option<String> {
    let tokens: Vec<&str> = remaining.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    tokens
        .last()
        .filter(|name| **name != UNKNOWN_HOSTNAME)
        .map(|name| name.to_string())
}

fn extract_expiration(remaining: &str) -> Option<String> {
    let date = DATE_RE.find(remaining)?;
    Some(
        remaining[date.start()..]
            .chars()
            .take(EXPIRATION_WIDTH)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARP_OUTPUT: &str = "\
IP address               HW type     Flags       HW address            Mask     Device
192.168.1.10             0x1         0x2         AA:BB:CC:DD:EE:01     *        eth1
192.168.1.11             0x1         0x2         aa-bb-cc-dd-ee-02     *        switch0

192.168.1.12     (incomplete)                                                    eth1
192.168.1.50   ether   00:11:22:33:44:55   eth0
";

    const DHCP_OUTPUT: &str = "\
IP address      Hardware Address   Lease expiration     Pool       Client Name
----------      ----------------   ----------------     ----       -----------
192.168.1.50    00:11:22:33:44:55  2024/01/01 12:00:00  pool0      myhost
192.168.1.60    AA-BB-CC-DD-EE-60  2024/01/02 08:30:15  pool0      ?
192.168.1.70    aa:bb:cc:dd:ee:70  pool0
garbage line
";

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_arp_table() {
        let entries = parse_arp_table(ARP_OUTPUT);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].ip, "192.168.1.10");
        assert_eq!(entries[0].mac, "aa:bb:cc:dd:ee:01");
        assert_eq!(entries[0].interface.as_deref(), Some("eth1"));
        assert_eq!(entries[1].mac, "aa:bb:cc:dd:ee:02");
        assert_eq!(entries[1].interface.as_deref(), Some("switch0"));
    }

    #[test]
    fn test_arp_narrow_row_has_no_interface() {
        let entries = parse_arp_table("192.168.1.50   ether   00:11:22:33:44:55   eth0");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, "192.168.1.50");
        assert_eq!(entries[0].mac, "00:11:22:33:44:55");
        assert_eq!(entries[0].interface, None);
    }

    #[test]
    fn test_arp_idempotent() {
        assert_eq!(parse_arp_table(ARP_OUTPUT), parse_arp_table(ARP_OUTPUT));
    }

    #[test]
    fn test_arp_skips_separator_and_junk() {
        let output = "------------------------------\n\n   \nnot an arp row at all\n";
        assert!(parse_arp_table(output).is_empty());
        assert!(parse_arp_table("").is_empty());
    }

    #[test]
    fn test_dhcp_leases() {
        let leases = parse_dhcp_leases(DHCP_OUTPUT);

        assert_eq!(leases.len(), 3);

        assert_eq!(leases[0].ip, "192.168.1.50");
        assert_eq!(leases[0].mac, "00:11:22:33:44:55");
        assert_eq!(leases[0].hostname.as_deref(), Some("myhost"));
        assert_eq!(leases[0].expires.as_deref(), Some("2024/01/01 12:00:00"));

        assert_eq!(leases[1].mac, "aa:bb:cc:dd:ee:60");
        assert_eq!(leases[1].hostname, None);
        assert_eq!(leases[1].expires.as_deref(), Some("2024/01/02 08:30:15"));

        assert_eq!(leases[2].ip, "192.168.1.70");
        assert_eq!(leases[2].hostname, None);
        assert_eq!(leases[2].expires, None);
    }

    #[test]
    fn test_dhcp_preamble_is_ignored() {
        let output = "\
192.168.1.99    00:11:22:33:44:99  2024/01/01 12:00:00  pool0      early
IP address      Hardware Address   Lease expiration     Pool       Client Name
192.168.1.50    00:11:22:33:44:55  2024/01/01 12:00:00  pool0      myhost
";
        let leases = parse_dhcp_leases(output);

        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].mac, "00:11:22:33:44:55");
    }

    #[test]
    fn test_dhcp_without_header_yields_nothing() {
        let output = "192.168.1.50    00:11:22:33:44:55  2024/01/01 12:00:00  pool0  myhost";
        assert!(parse_dhcp_leases(output).is_empty());
    }

    #[test]
    fn test_dhcp_truncated_expiration() {
        let output = "IP address\n192.168.1.50 00:11:22:33:44:55 2024/01/01 12:00";
        let leases = parse_dhcp_leases(output);

        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].expires.as_deref(), Some("2024/01/01 12:00"));
        // only two tokens after the MAC
        assert_eq!(leases[0].hostname, None);
    }
}
