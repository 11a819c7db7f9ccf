use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::{debug, warn};
use uuid::Uuid;

use ledgr_common::error::StoreError;
use ledgr_common::inventory::{
    Device, DeviceFilter, DeviceId, Event, EventFilter, InventoryRepository, IpLease, Reservation,
    Service, ServiceKey,
};
use ledgr_common::network::mac::{self, MacAddr};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id          TEXT PRIMARY KEY,
    mac         TEXT UNIQUE,
    hostname    TEXT,
    vendor      TEXT,
    first_seen  TEXT NOT NULL,
    last_seen   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS services (
    id          TEXT PRIMARY KEY,
    device_id   TEXT NOT NULL,
    ip          TEXT NOT NULL,
    port        INTEGER NOT NULL,
    protocol    TEXT NOT NULL,
    kind        TEXT NOT NULL,
    url         TEXT,
    title       TEXT,
    last_seen   TEXT NOT NULL,
    UNIQUE (device_id, ip, port, protocol)
);

CREATE TABLE IF NOT EXISTS leases (
    id          TEXT PRIMARY KEY,
    device_id   TEXT NOT NULL,
    ip          TEXT NOT NULL,
    mac         TEXT,
    acquired_at TEXT NOT NULL,
    released_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_leases_active_ip ON leases(ip) WHERE released_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_leases_device ON leases(device_id);

CREATE TABLE IF NOT EXISTS reservations (
    id          TEXT PRIMARY KEY,
    ip          TEXT NOT NULL UNIQUE,
    mac         TEXT NOT NULL,
    hostname    TEXT,
    notes       TEXT
);

CREATE TABLE IF NOT EXISTS events (
    id           TEXT PRIMARY KEY,
    timestamp    TEXT NOT NULL,
    kind         TEXT NOT NULL,
    device_id    TEXT,
    ip           TEXT,
    mac          TEXT,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
"#;

const DEVICE_COLUMNS: &str = "id, mac, hostname, vendor, first_seen, last_seen";
const SERVICE_COLUMNS: &str = "id, device_id, ip, port, protocol, kind, url, title, last_seen";
const LEASE_COLUMNS: &str = "id, device_id, ip, mac, acquired_at, released_at";
const RESERVATION_COLUMNS: &str = "id, ip, mac, hostname, notes";
const EVENT_COLUMNS: &str =
    "id, timestamp, kind, device_id, ip, mac, title, description, acknowledged";

/// SQLite-backed inventory.
///
/// The connection is shared behind a mutex and every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("failed to enable WAL mode")?;
        debug!(path = %path.display(), "database opened in WAL mode");

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to create database schema")?;
        debug!("inventory schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(StoreError::backend)?
    }
}

#[async_trait]
impl InventoryRepository for SqliteStore {
    async fn save_device(&self, device: &Device) -> Result<(), StoreError> {
        let device = device.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO devices (id, mac, hostname, vendor, first_seen, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    mac = excluded.mac,
                    hostname = excluded.hostname,
                    vendor = excluded.vendor,
                    first_seen = excluded.first_seen,
                    last_seen = excluded.last_seen",
                params![
                    device.id.to_string(),
                    device.mac.map(|m| m.to_string()),
                    device.hostname,
                    device.vendor,
                    timestamp(&device.first_seen),
                    timestamp(&device.last_seen),
                ],
            )
            .map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, StoreError> {
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
                params![id.to_string()],
                row_to_device,
            )
            .optional()
            .map_err(StoreError::backend)
        })
        .await
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        let filter = filter.clone();
        self.call(move |conn| {
            let devices = query_all(
                conn,
                &format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY first_seen, id"),
                [],
                row_to_device,
            )?;
            Ok(devices.into_iter().filter(|d| filter.matches(d)).collect())
        })
        .await
    }

    async fn save_service(&self, service: &Service) -> Result<(), StoreError> {
        let service = service.clone();
        self.call(move |conn| {
            // The existing id wins on conflict.
            conn.execute(
                "INSERT INTO services (id, device_id, ip, port, protocol, kind, url, title, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(device_id, ip, port, protocol) DO UPDATE SET
                    kind = excluded.kind,
                    url = excluded.url,
                    title = excluded.title,
                    last_seen = excluded.last_seen",
                params![
                    service.id.to_string(),
                    service.device_id.to_string(),
                    service.ip.to_string(),
                    service.port,
                    service.protocol.as_str(),
                    service.kind.as_str(),
                    service.url,
                    service.title,
                    timestamp(&service.last_seen),
                ],
            )
            .map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }

    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, StoreError> {
        let key = *key;
        self.call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SERVICE_COLUMNS} FROM services
                     WHERE device_id = ?1 AND ip = ?2 AND port = ?3 AND protocol = ?4"
                ),
                params![
                    key.device_id.to_string(),
                    key.ip.to_string(),
                    key.port,
                    key.protocol.as_str()
                ],
                row_to_service,
            )
            .optional()
            .map_err(StoreError::backend)
        })
        .await
    }

    async fn services_by_device(&self, id: DeviceId) -> Result<Vec<Service>, StoreError> {
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {SERVICE_COLUMNS} FROM services WHERE device_id = ?1 ORDER BY ip, port"
                ),
                params![id.to_string()],
                row_to_service,
            )
        })
        .await
    }

    async fn create_lease(&self, lease: &IpLease) -> Result<(), StoreError> {
        let lease = lease.clone();
        self.call(move |conn| {
            conn.execute(
                &format!("INSERT INTO leases ({LEASE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    lease.id.to_string(),
                    lease.device_id.to_string(),
                    lease.ip.to_string(),
                    lease.mac.map(|m| m.to_string()),
                    timestamp(&lease.acquired_at),
                    lease.released_at.as_ref().map(timestamp),
                ],
            )
            .map_err(|err| match err.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => {
                    warn!(ip = %lease.ip, "rejected second active lease");
                    StoreError::ActiveLeaseExists(lease.ip)
                }
                _ => StoreError::backend(err),
            })?;
            Ok(())
        })
        .await
    }

    async fn leases_by_device(&self, id: DeviceId) -> Result<Vec<IpLease>, StoreError> {
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {LEASE_COLUMNS} FROM leases WHERE device_id = ?1 ORDER BY acquired_at"
                ),
                params![id.to_string()],
                row_to_lease,
            )
        })
        .await
    }

    async fn active_lease_by_ip(&self, ip: IpAddr) -> Result<Option<IpLease>, StoreError> {
        self.call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {LEASE_COLUMNS} FROM leases WHERE ip = ?1 AND released_at IS NULL"
                ),
                params![ip.to_string()],
                row_to_lease,
            )
            .optional()
            .map_err(StoreError::backend)
        })
        .await
    }

    async fn release_lease(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.call(move |conn| {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM leases WHERE id = ?1",
                    params![id.to_string()],
                    |_| Ok(()),
                )
                .optional()
                .map_err(StoreError::backend)?;
            if exists.is_none() {
                return Err(StoreError::NotFound {
                    entity: "lease",
                    id: id.to_string(),
                });
            }

            conn.execute(
                "UPDATE leases SET released_at = ?1 WHERE id = ?2 AND released_at IS NULL",
                params![timestamp(&at), id.to_string()],
            )
            .map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }

    async fn create_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let reservation = reservation.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO reservations (id, ip, mac, hostname, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(ip) DO UPDATE SET
                    id = excluded.id,
                    mac = excluded.mac,
                    hostname = excluded.hostname,
                    notes = excluded.notes",
                params![
                    reservation.id.to_string(),
                    reservation.ip.to_string(),
                    reservation.mac.to_string(),
                    reservation.hostname,
                    reservation.notes,
                ],
            )
            .map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }

    async fn list_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        self.call(|conn| {
            let mut reservations = query_all(
                conn,
                &format!("SELECT {RESERVATION_COLUMNS} FROM reservations"),
                [],
                row_to_reservation,
            )?;
            // Text order would put 10.0.0.10 before 10.0.0.2.
            reservations.sort_by_key(|r| r.ip);
            Ok(reservations)
        })
        .await
    }

    async fn reservation_for_ip(&self, ip: IpAddr) -> Result<Option<Reservation>, StoreError> {
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE ip = ?1"),
                params![ip.to_string()],
                row_to_reservation,
            )
            .optional()
            .map_err(StoreError::backend)
        })
        .await
    }

    async fn create_event(&self, event: &Event) -> Result<(), StoreError> {
        let event = event.clone();
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    event.id.to_string(),
                    timestamp(&event.timestamp),
                    event.kind.as_str(),
                    event.device_id.map(|id| id.to_string()),
                    event.ip.map(|ip| ip.to_string()),
                    event.mac.map(|m| m.to_string()),
                    event.title,
                    event.description,
                    event.acknowledged,
                ],
            )
            .map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.call(move |conn| select_event(conn, id)).await
    }

    async fn acknowledge_event(&self, id: Uuid) -> Result<Event, StoreError> {
        self.call(move |conn| {
            conn.execute(
                "UPDATE events SET acknowledged = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(StoreError::backend)?;

            select_event(conn, id)?.ok_or_else(|| StoreError::NotFound {
                entity: "event",
                id: id.to_string(),
            })
        })
        .await
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let filter = filter.clone();
        self.call(move |conn| {
            let events = query_all(
                conn,
                &format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY timestamp DESC, rowid DESC"),
                [],
                row_to_event,
            )?;
            Ok(events
                .into_iter()
                .filter(|e| filter.matches(e))
                .take(filter.limit.unwrap_or(usize::MAX))
                .collect())
        })
        .await
    }
}

fn select_event(conn: &Connection, id: Uuid) -> Result<Option<Event>, StoreError> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
        params![id.to_string()],
        row_to_event,
    )
    .optional()
    .map_err(StoreError::backend)
}

fn query_all<T, P>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError>
where
    P: rusqlite::Params,
{
    let mut stmt = conn.prepare(sql).map_err(StoreError::backend)?;
    let rows = stmt
        .query_map(params, map)
        .map_err(StoreError::backend)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::backend)?;
    Ok(rows)
}

/// Fixed-width RFC 3339 so that text ordering in SQL matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}

fn parse_mac(raw: &str) -> Result<MacAddr, String> {
    mac::parse_lenient(raw).ok_or_else(|| format!("invalid MAC address: {raw}"))
}

fn column<T, E>(row: &Row<'_>, idx: usize, parse: impl FnOnce(&str) -> Result<T, E>) -> rusqlite::Result<T>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn optional_column<T, E>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> rusqlite::Result<Option<T>>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        parse(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    })
    .transpose()
}

fn row_to_device(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: column(row, 0, str::parse::<DeviceId>)?,
        mac: optional_column(row, 1, parse_mac)?,
        hostname: row.get(2)?,
        vendor: row.get(3)?,
        first_seen: column(row, 4, parse_timestamp)?,
        last_seen: column(row, 5, parse_timestamp)?,
    })
}

fn row_to_service(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: column(row, 0, Uuid::parse_str)?,
        device_id: column(row, 1, str::parse::<DeviceId>)?,
        ip: column(row, 2, str::parse::<IpAddr>)?,
        port: row.get(3)?,
        protocol: column(row, 4, str::parse)?,
        kind: column(row, 5, str::parse)?,
        url: row.get(6)?,
        title: row.get(7)?,
        last_seen: column(row, 8, parse_timestamp)?,
    })
}

fn row_to_lease(row: &Row<'_>) -> rusqlite::Result<IpLease> {
    Ok(IpLease {
        id: column(row, 0, Uuid::parse_str)?,
        device_id: column(row, 1, str::parse::<DeviceId>)?,
        ip: column(row, 2, str::parse::<IpAddr>)?,
        mac: optional_column(row, 3, parse_mac)?,
        acquired_at: column(row, 4, parse_timestamp)?,
        released_at: optional_column(row, 5, parse_timestamp)?,
    })
}

fn row_to_reservation(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: column(row, 0, Uuid::parse_str)?,
        ip: column(row, 1, str::parse::<IpAddr>)?,
        mac: column(row, 2, parse_mac)?,
        hostname: row.get(3)?,
        notes: row.get(4)?,
    })
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: column(row, 0, Uuid::parse_str)?,
        timestamp: column(row, 1, parse_timestamp)?,
        kind: column(row, 2, str::parse)?,
        device_id: optional_column(row, 3, str::parse::<DeviceId>)?,
        ip: optional_column(row, 4, str::parse::<IpAddr>)?,
        mac: optional_column(row, 5, parse_mac)?,
        title: row.get(6)?,
        description: row.get(7)?,
        acknowledged: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgr_common::inventory::EventKind;

    fn device(last: u8) -> Device {
        Device::discovered(
            MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, last),
            Some("nas".into()),
            Some("Synology".into()),
            Utc::now(),
        )
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn device_round_trips_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut original = device(1);
        store.save_device(&original).await.unwrap();

        original.observe(Some("nas.lan"), None, Utc::now());
        store.save_device(&original).await.unwrap();

        let loaded = store.get_device(original.id).await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(store.list_devices(&DeviceFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_index_allows_one_active_lease_per_ip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = device(1);
        let b = device(2);

        let first = IpLease::acquire(a.id, ip("10.0.0.5"), a.mac, Utc::now());
        store.create_lease(&first).await.unwrap();

        let second = IpLease::acquire(b.id, ip("10.0.0.5"), b.mac, Utc::now());
        assert_eq!(
            store.create_lease(&second).await,
            Err(StoreError::ActiveLeaseExists(ip("10.0.0.5")))
        );

        store.release_lease(first.id, Utc::now()).await.unwrap();
        store.release_lease(first.id, Utc::now()).await.unwrap();
        store.create_lease(&second).await.unwrap();

        let active = store.active_lease_by_ip(ip("10.0.0.5")).await.unwrap().unwrap();
        assert_eq!(active, second);
        let history = store.leases_by_device(a.id).await.unwrap();
        assert!(!history[0].is_active());
    }

    #[tokio::test]
    async fn acknowledging_unknown_event_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = device(1);
        let event = Event::new_device(&a, ip("10.0.0.5"));
        store.create_event(&event).await.unwrap();

        let acked = store.acknowledge_event(event.id).await.unwrap();
        assert!(acked.acknowledged);
        assert_eq!(acked.kind, EventKind::NewDevice);
        assert_eq!(acked.mac, a.mac);

        assert!(matches!(
            store.acknowledge_event(Uuid::new_v4()).await,
            Err(StoreError::NotFound { entity: "event", .. })
        ));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledgr.db");
        let a = device(1);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_device(&a).await.unwrap();
            store
                .create_reservation(&Reservation::new(ip("10.0.0.10"), a.mac.unwrap()))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_device(a.id).await.unwrap(), Some(a.clone()));
        let reservation = store.reservation_for_ip(ip("10.0.0.10")).await.unwrap().unwrap();
        assert_eq!(Some(reservation.mac), a.mac);
    }
}
