use std::sync::OnceLock;

use mac_oui::Oui;
use tracing::warn;

use ledgr_common::network::mac::{self, MacAddr};
use ledgr_common::vendors::{UNKNOWN_VENDOR, VendorRepository};

/// Prefixes worth naming even without the OUI database: hypervisors and common lab hardware.
const KNOWN_PREFIXES: &[([u8; 3], &str)] = &[
    ([0x08, 0x00, 0x27], "VirtualBox"),
    ([0x52, 0x54, 0x00], "QEMU/KVM"),
    ([0x00, 0x0c, 0x29], "VMware"),
    ([0x00, 0x50, 0x56], "VMware"),
    ([0x00, 0x05, 0x69], "VMware"),
    ([0x00, 0x15, 0x5d], "Microsoft Hyper-V"),
    ([0x00, 0x1c, 0x42], "Parallels"),
    ([0x00, 0x16, 0x3e], "Xen"),
    ([0xb8, 0x27, 0xeb], "Raspberry Pi"),
    ([0xdc, 0xa6, 0x32], "Raspberry Pi"),
    ([0xe4, 0x5f, 0x01], "Raspberry Pi"),
    ([0x00, 0x11, 0x32], "Synology"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPrefixRepo;

impl VendorRepository for StaticPrefixRepo {
    fn get_vendor(&self, mac_addr: MacAddr) -> Option<String> {
        let oui = mac::oui(mac_addr);
        KNOWN_PREFIXES
            .iter()
            .find(|(prefix, _)| *prefix == oui)
            .map(|(_, vendor)| vendor.to_string())
    }
}

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn get_oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("failed to load OUI database, vendor labels limited to known prefixes: {e}");
                None
            }
        })
        .as_ref()
}

/// The IEEE registry bundled with `mac_oui`, loaded on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacOuiRepo;

impl VendorRepository for MacOuiRepo {
    fn get_vendor(&self, mac: MacAddr) -> Option<String> {
        let db = get_oui_db()?;
        let mac_str = mac.to_string();
        match db.lookup_by_mac(&mac_str) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Consults each source in order; the first answer wins.
pub struct VendorLookup {
    sources: Vec<Box<dyn VendorRepository>>,
}

impl VendorLookup {
    pub fn new(sources: Vec<Box<dyn VendorRepository>>) -> Self {
        Self { sources }
    }

    /// Static prefixes, then the OUI database when `oui_database` is set.
    pub fn standard(oui_database: bool) -> Self {
        let mut sources: Vec<Box<dyn VendorRepository>> = vec![Box::new(StaticPrefixRepo)];
        if oui_database {
            sources.push(Box::new(MacOuiRepo));
        }
        Self::new(sources)
    }

    /// Always yields a label, [`UNKNOWN_VENDOR`] when no source knows the prefix.
    pub fn label(&self, mac: MacAddr) -> String {
        self.get_vendor(mac)
            .unwrap_or_else(|| UNKNOWN_VENDOR.to_string())
    }
}

impl VendorRepository for VendorLookup {
    fn get_vendor(&self, mac_addr: MacAddr) -> Option<String> {
        self.sources
            .iter()
            .find_map(|source| source.get_vendor(mac_addr))
    }
}
