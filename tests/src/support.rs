use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ledgr_common::error::ProbeError;
use ledgr_common::inventory::{InventoryRepository, ServiceKind, TransportProtocol};
use ledgr_common::network::host::{Host, OpenPort};
use ledgr_common::network::mac::MacAddr;
use ledgr_common::network::neighbors::ArpTable;
use ledgr_common::scanning::{HostProber, NeighborTable, ProbeOutcome, ScanContext};
use ledgr_core::discovery::DiscoveryService;
use ledgr_core::vendors::VendorLookup;

struct Machine {
    mac: MacAddr,
    ports: Vec<OpenPort>,
}

/// A LAN whose machines can be plugged in, moved and unplugged between scans.
///
/// It plays both the prober and the neighbor table, so hardware addresses reach hosts the same
/// way they do on a real network: through the snapshot taken at scan start.
#[derive(Clone, Default)]
pub struct FakeLan {
    machines: Arc<Mutex<HashMap<Ipv4Addr, Machine>>>,
}

impl FakeLan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plug(&self, ip: Ipv4Addr, mac: MacAddr, ports: &[u16]) {
        let ports = ports.iter().map(|port| http_port(ip, *port)).collect();
        self.machines
            .lock()
            .unwrap()
            .insert(ip, Machine { mac, ports });
    }

    pub fn unplug(&self, ip: Ipv4Addr) {
        self.machines.lock().unwrap().remove(&ip);
    }

    pub fn service(&self, store: Arc<dyn InventoryRepository>) -> DiscoveryService {
        DiscoveryService::new(store, Arc::new(self.clone()), Arc::new(self.clone()), 50)
    }
}

fn http_port(ip: Ipv4Addr, port: u16) -> OpenPort {
    OpenPort {
        port,
        protocol: TransportProtocol::Tcp,
        kind: ServiceKind::Http,
        url: Some(format!("http://{ip}:{port}")),
        title: None,
    }
}

#[async_trait]
impl HostProber for FakeLan {
    async fn probe(&self, ip: Ipv4Addr, ctx: &ScanContext) -> ProbeOutcome {
        let ports = {
            let machines = self.machines.lock().unwrap();
            match machines.get(&ip) {
                Some(machine) => machine.ports.clone(),
                None => {
                    return ProbeOutcome::Unreachable(ProbeError::Timeout {
                        ip: IpAddr::V4(ip),
                        timeout: Duration::from_millis(1),
                    });
                }
            }
        };
        tokio::task::yield_now().await;

        let mut host = Host::new(IpAddr::V4(ip));
        if let Ok(mac) = ctx.neighbors.lookup(IpAddr::V4(ip)) {
            host = host
                .with_mac(mac)
                .with_vendor(VendorLookup::standard(false).label(mac));
        }
        if ctx.port_scan {
            host.open_ports = ports;
        }
        ProbeOutcome::Found(host)
    }
}

#[async_trait]
impl NeighborTable for FakeLan {
    async fn snapshot(&self) -> anyhow::Result<ArpTable> {
        let machines = self.machines.lock().unwrap();
        Ok(machines
            .iter()
            .map(|(ip, machine)| (*ip, machine.mac))
            .collect())
    }
}

pub fn mac(last: u8) -> MacAddr {
    MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, last)
}

pub fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, last)
}
