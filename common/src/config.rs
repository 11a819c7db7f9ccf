//! Runtime configuration, loaded from TOML. Every section falls back to its defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::network::range::Subnet;

/// Candidate ports tried by the port prober.
pub const DEFAULT_PORTS: [u16; 8] = [22, 80, 443, 3000, 3001, 8080, 8443, 5173];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub probe: ProbeConfig,
    pub store: StoreConfig,
    pub vendor: VendorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Ranges scanned by the periodic trigger when none are given explicitly.
    pub subnets: Vec<Subnet>,
    pub interval_secs: u64,
    /// Maximum number of probe tasks in flight.
    pub window: usize,
    pub port_scan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReachabilityMethod {
    Ping,
    Handshake,
    Both,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub reachability: ReachabilityMethod,
    pub reachability_timeout_ms: u64,
    pub dns_timeout_ms: u64,
    pub port_timeout_ms: u64,
    pub ports: Vec<u16>,
    /// Disables reverse DNS lookups.
    ///
    /// Hosts are still reported, just without a hostname.
    pub no_dns: bool,
    /// Resolver used for PTR queries. Falls back to the system resolver when unset.
    pub dns_server: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// Consult the bundled IEEE OUI database after the static prefix table.
    pub oui_database: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            subnets: Vec::new(),
            interval_secs: 300,
            window: 50,
            port_scan: true,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            reachability: ReachabilityMethod::Both,
            reachability_timeout_ms: 1_500,
            dns_timeout_ms: 3_000,
            port_timeout_ms: 1_000,
            ports: DEFAULT_PORTS.to_vec(),
            no_dns: false,
            dns_server: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ledgr.db"),
        }
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self { oui_database: true }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

impl ScanConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn window(&self) -> usize {
        self.window.max(1)
    }
}

impl ProbeConfig {
    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_millis(self.reachability_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.scan.window(), 50);
        assert_eq!(cfg.scan.interval(), Duration::from_secs(300));
        assert_eq!(cfg.probe.ports, DEFAULT_PORTS.to_vec());
        assert_eq!(cfg.probe.dns_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.probe.reachability, ReachabilityMethod::Both);
        assert!(cfg.vendor.oui_database);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[scan]
subnets = ["10.0.0.0/24"]
window = 8

[probe]
reachability = "handshake"
dns_server = "10.0.0.1:53"
"#
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.scan.subnets, vec!["10.0.0.0/24".parse::<Subnet>().unwrap()]);
        assert_eq!(cfg.scan.window(), 8);
        assert_eq!(cfg.scan.interval_secs, 300);
        assert_eq!(cfg.probe.reachability, ReachabilityMethod::Handshake);
        assert_eq!(cfg.probe.dns_server, Some("10.0.0.1:53".parse().unwrap()));
        assert_eq!(cfg.probe.port_timeout_ms, 1_000);
    }

    #[test]
    fn zero_window_is_clamped() {
        let cfg: Config = toml::from_str("[scan]\nwindow = 0\n").unwrap();
        assert_eq!(cfg.scan.window(), 1);
    }

    #[test]
    fn malformed_subnet_is_rejected_at_load() {
        assert!(toml::from_str::<Config>("[scan]\nsubnets = [\"10.0.0.0/40\"]\n").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load("/definitely/not/here.toml").is_err());
    }
}
