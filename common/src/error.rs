//! # Error Taxonomy
//!
//! Every failure a scan can observe is a value of one of these types.
//!
//! * [`ProbeError`]: the host did not prove it is up. Non-fatal, the host is omitted.
//! * [`ResolutionError`]: an enrichment step came back empty. Non-fatal, the field stays empty.
//! * [`StoreError`]: the persistence gateway refused or failed a call.
//! * [`ScanError`]: the umbrella type surfaced by the discovery service.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{ip} did not answer within {timeout:?}")]
    Timeout { ip: IpAddr, timeout: Duration },

    #[error("{ip} is unreachable: {reason}")]
    Unreachable { ip: IpAddr, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no neighbor table entry for {0}")]
    NoNeighborEntry(IpAddr),

    #[error("no DNS resolver configured")]
    NoResolver,

    #[error("reverse lookup for {ip} failed: {reason}")]
    LookupFailed { ip: IpAddr, reason: String },

    #[error("reverse lookup for {ip} timed out after {timeout:?}")]
    Timeout { ip: IpAddr, timeout: Duration },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0} already has an active lease")]
    ActiveLeaseExists(IpAddr),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid address range '{input}': {reason}")]
    Validation { input: String, reason: String },

    #[error("scan task failed: {0}")]
    Task(String),
}
