use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

use ledgr_common::inventory::ServiceKind;

/// Longest page title kept on a service.
const MAX_TITLE_CHARS: usize = 200;

static TITLE_RE: OnceLock<Regex> = OnceLock::new();

fn title_regex() -> &'static Regex {
    TITLE_RE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is a valid regex")
    })
}

/// The URL a service is reachable at, e.g. `http://192.168.1.100:80`.
///
/// Only web services have one.
pub fn service_url(kind: ServiceKind, ip: IpAddr, port: u16) -> Option<String> {
    let scheme = match kind {
        ServiceKind::Http => "http",
        ServiceKind::Https => "https",
        ServiceKind::Ssh => return None,
    };
    let host = match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    };
    Some(format!("{scheme}://{host}:{port}"))
}

/// Extracts the `<title>` of an HTML document, whitespace collapsed.
pub fn extract_title(body: &str) -> Option<String> {
    let raw = title_regex().captures(body)?.get(1)?.as_str();
    let title: String = raw.split_whitespace().collect::<Vec<&str>>().join(" ");
    if title.is_empty() {
        return None;
    }
    Some(title.chars().take(MAX_TITLE_CHARS).collect())
}
