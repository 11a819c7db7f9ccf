//! Wire-level helpers for the probes: DNS PTR queries, HTTP page titles and SSH banners.

pub mod dns;
pub mod http;
pub mod ssh;
