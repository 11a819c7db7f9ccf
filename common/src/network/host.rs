use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::inventory::{ServiceKind, TransportProtocol};
use crate::network::mac::MacAddr;

/// A reachable host as observed by one scan, before it is merged into the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub ip: IpAddr,
    pub mac: Option<MacAddr>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub open_ports: Vec<OpenPort>,
}

/// A port that answered the application-layer probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPort {
    pub port: u16,
    pub protocol: TransportProtocol,
    pub kind: ServiceKind,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl Host {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            mac: None,
            hostname: None,
            vendor: None,
            open_ports: Vec::new(),
        }
    }

    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_port(mut self, port: OpenPort) -> Self {
        self.open_ports.push(port);
        self
    }
}
