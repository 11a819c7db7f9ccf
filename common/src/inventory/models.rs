//! # Inventory Models
//!
//! The persisted side of discovery: devices, the IP leases bound to them, the services they
//! expose, operator reservations, and the append-only event log.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::network::mac::{self, MacAddr};

/// Namespace for deriving device identifiers from hardware addresses.
const DEVICE_NAMESPACE: Uuid = Uuid::from_u128(0x5f1c_8e2a_73d4_4b6e_9a0f_2c8d_41e7_b390);

/// Identity of a [`Device`].
///
/// Derived from the hardware address when one is known, so every scan that sees the same MAC
/// arrives at the same identifier without consulting the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    pub fn from_mac(mac: MacAddr) -> Self {
        DeviceId(Uuid::new_v5(&DEVICE_NAMESPACE, &mac::octets(mac)))
    }

    /// An identifier that is not tied to any hardware address and is never reproduced.
    pub fn ephemeral() -> Self {
        DeviceId(Uuid::new_v4())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(DeviceId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub mac: Option<MacAddr>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// First sighting of a hardware address.
    pub fn discovered(
        mac: MacAddr,
        hostname: Option<String>,
        vendor: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeviceId::from_mac(mac),
            mac: Some(mac),
            hostname,
            vendor,
            first_seen: now,
            last_seen: now,
        }
    }

    /// A sighting without a hardware address; the identifier is scan-local.
    pub fn transient(hostname: Option<String>, vendor: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: DeviceId::ephemeral(),
            mac: None,
            hostname,
            vendor,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Merges a re-observation. Known values are never replaced by absent ones and
    /// `last_seen` never moves backwards.
    pub fn observe(&mut self, hostname: Option<&str>, vendor: Option<&str>, now: DateTime<Utc>) {
        if let Some(hostname) = hostname {
            self.hostname = Some(hostname.to_string());
        }
        if let Some(vendor) = vendor {
            self.vendor = Some(vendor.to_string());
        }
        self.last_seen = self.last_seen.max(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpLease {
    pub id: Uuid,
    pub device_id: DeviceId,
    pub ip: IpAddr,
    pub mac: Option<MacAddr>,
    pub acquired_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl IpLease {
    pub fn acquire(device_id: DeviceId, ip: IpAddr, mac: Option<MacAddr>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            ip,
            mac,
            acquired_at: now,
            released_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    Tcp,
}

impl TransportProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportProtocol::Tcp),
            other => Err(format!("unknown transport protocol: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Http,
    Https,
    Ssh,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Http => "http",
            ServiceKind::Https => "https",
            ServiceKind::Ssh => "ssh",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ServiceKind::Http),
            "https" => Ok(ServiceKind::Https),
            "ssh" => Ok(ServiceKind::Ssh),
            other => Err(format!("unknown service kind: {other}")),
        }
    }
}

/// Identity of a [`Service`]: re-observing the same key updates the row in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub device_id: DeviceId,
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: TransportProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub device_id: DeviceId,
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: TransportProtocol,
    pub kind: ServiceKind,
    pub url: Option<String>,
    pub title: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl Service {
    pub fn key(&self) -> ServiceKey {
        ServiceKey {
            device_id: self.device_id,
            ip: self.ip,
            port: self.port,
            protocol: self.protocol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub ip: IpAddr,
    pub mac: MacAddr,
    pub hostname: Option<String>,
    pub notes: Option<String>,
}

impl Reservation {
    pub fn new(ip: IpAddr, mac: MacAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip,
            mac,
            hostname: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewDevice,
    IpChange,
    Conflict,
    ServiceDown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewDevice => "new_device",
            EventKind::IpChange => "ip_change",
            EventKind::Conflict => "conflict",
            EventKind::ServiceDown => "service_down",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "new_device" => Ok(EventKind::NewDevice),
            "ip_change" => Ok(EventKind::IpChange),
            "conflict" => Ok(EventKind::Conflict),
            "service_down" => Ok(EventKind::ServiceDown),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub device_id: Option<DeviceId>,
    pub ip: Option<IpAddr>,
    pub mac: Option<MacAddr>,
    pub title: String,
    pub description: String,
    pub acknowledged: bool,
}

impl Event {
    pub fn new(kind: EventKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            device_id: None,
            ip: None,
            mac: None,
            title: title.into(),
            description: description.into(),
            acknowledged: false,
        }
    }

    /// Stamps the event with the time of the observation that caused it.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_mac(mut self, mac: Option<MacAddr>) -> Self {
        self.mac = mac;
        self
    }

    pub fn new_device(device: &Device, ip: IpAddr) -> Self {
        let label = device_label(device);
        Event::new(
            EventKind::NewDevice,
            format!("New device {label}"),
            format!(
                "First sighting of {label} at {ip} (vendor: {})",
                device.vendor.as_deref().unwrap_or("Unknown")
            ),
        )
        .with_device(device.id)
        .with_ip(ip)
        .with_mac(device.mac)
    }

    pub fn ip_change(device: &Device, previous_ip: IpAddr, ip: IpAddr) -> Self {
        let label = device_label(device);
        Event::new(
            EventKind::IpChange,
            format!("{label} moved to {ip}"),
            format!("{label} released {previous_ip} and now holds {ip}"),
        )
        .with_device(device.id)
        .with_ip(ip)
        .with_mac(device.mac)
    }

    /// `ip` was actively leased by `previous` when `device` was observed on it.
    pub fn conflict(ip: IpAddr, previous: DeviceId, device: &Device) -> Self {
        Event::new(
            EventKind::Conflict,
            format!("Address conflict on {ip}"),
            format!(
                "{ip} was leased by device {previous} and is now claimed by {} ({})",
                device.id,
                device_label(device)
            ),
        )
        .with_device(device.id)
        .with_ip(ip)
        .with_mac(device.mac)
    }

    pub fn reservation_violation(reservation: &Reservation, device: &Device) -> Self {
        let observed = device
            .mac
            .map(|mac| mac.to_string())
            .unwrap_or_else(|| "an unknown device".to_string());
        Event::new(
            EventKind::Conflict,
            format!("Reservation violated on {}", reservation.ip),
            format!(
                "{} is reserved for {} but was acquired by {observed}",
                reservation.ip, reservation.mac
            ),
        )
        .with_device(device.id)
        .with_ip(reservation.ip)
        .with_mac(device.mac)
    }
}

/// Hostname, then MAC, then identifier.
pub fn device_label(device: &Device) -> String {
    match (&device.hostname, device.mac) {
        (Some(hostname), _) => hostname.clone(),
        (None, Some(mac)) => mac.to_string(),
        (None, None) => device.id.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    /// Case-insensitive substring match on the vendor label.
    pub vendor: Option<String>,
    /// Case-insensitive substring match on the hostname.
    pub hostname: Option<String>,
    pub seen_since: Option<DateTime<Utc>>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        let contains = |value: &Option<String>, needle: &Option<String>| match needle {
            None => true,
            Some(needle) => value
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle.to_lowercase())),
        };

        contains(&device.vendor, &self.vendor)
            && contains(&device.hostname, &self.hostname)
            && self.seen_since.is_none_or(|since| device.last_seen >= since)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub acknowledged: Option<bool>,
    pub device_id: Option<DeviceId>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn unacknowledged() -> Self {
        Self {
            acknowledged: Some(false),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.kind.is_none_or(|kind| event.kind == kind)
            && self.acknowledged.is_none_or(|ack| event.acknowledged == ack)
            && self.device_id.is_none_or(|id| event.device_id == Some(id))
    }
}
