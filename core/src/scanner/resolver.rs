use std::net::IpAddr;

use tracing::debug;

use ledgr_common::error::ProbeError;
use ledgr_common::network::host::Host;
use ledgr_common::scanning::ScanContext;

use crate::network::dns::ReverseResolver;
use crate::network::reachability::Reachability;
use crate::vendors::VendorLookup;

/// Turns an address into a [`Host`]: proves it is up, then fills in what it can.
///
/// Only the reachability check can fail the host. Hardware address, hostname and vendor are
/// each best-effort and left empty when their source has nothing.
pub struct HostResolver {
    reachability: Reachability,
    dns: Option<ReverseResolver>,
    vendors: VendorLookup,
}

impl HostResolver {
    pub fn new(reachability: Reachability, dns: Option<ReverseResolver>, vendors: VendorLookup) -> Self {
        Self {
            reachability,
            dns,
            vendors,
        }
    }

    pub async fn resolve(&self, ip: IpAddr, ctx: &ScanContext) -> Result<Host, ProbeError> {
        self.reachability.check(ip).await?;
        let mut host = Host::new(ip);

        match ctx.neighbors.lookup(ip) {
            Ok(mac) => {
                host.mac = Some(mac);
                host.vendor = Some(self.vendors.label(mac));
            }
            Err(err) => debug!(%ip, "{err}"),
        }

        if let Some(dns) = &self.dns {
            match dns.lookup(ip).await {
                Ok(hostname) => host.hostname = Some(hostname),
                Err(err) => debug!(%ip, "{err}"),
            }
        }

        Ok(host)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use ledgr_common::config::ReachabilityMethod;
    use ledgr_common::network::mac::MacAddr;
    use ledgr_common::network::neighbors::ArpTable;

    fn resolver(dns: Option<ReverseResolver>) -> HostResolver {
        HostResolver::new(
            Reachability::new(ReachabilityMethod::Handshake, Duration::from_secs(1)),
            dns,
            VendorLookup::standard(false),
        )
    }

    #[tokio::test]
    async fn enriches_from_neighbor_snapshot() {
        let loopback = Ipv4Addr::LOCALHOST;
        let neighbors: ArpTable = [(loopback, MacAddr::new(0x08, 0x00, 0x27, 0xaa, 0xbb, 0xcc))]
            .into_iter()
            .collect();
        let ctx = ScanContext::new(neighbors, false);

        let host = resolver(None).resolve(IpAddr::V4(loopback), &ctx).await.unwrap();
        assert_eq!(host.mac, Some(MacAddr::new(0x08, 0x00, 0x27, 0xaa, 0xbb, 0xcc)));
        assert_eq!(host.vendor.as_deref(), Some("VirtualBox"));
        assert_eq!(host.hostname, None);
    }

    #[tokio::test]
    async fn failed_enrichment_leaves_fields_empty() {
        // Nothing listens on the resolver port, so the lookup fails or times out.
        let dns = ReverseResolver::new(Some("127.0.0.1:9".parse().unwrap()), Duration::from_millis(200));
        let ctx = ScanContext::new(ArpTable::new(), false);

        let host = resolver(Some(dns))
            .resolve(IpAddr::V4(Ipv4Addr::LOCALHOST), &ctx)
            .await
            .unwrap();
        assert_eq!(host.mac, None);
        assert_eq!(host.vendor, None);
        assert_eq!(host.hostname, None);
    }
}
