pub use pnet::util::MacAddr;

/// The **Organizationally unique identifier** of a MAC address (its first three octets).
pub fn oui(mac: MacAddr) -> [u8; 3] {
    [mac.0, mac.1, mac.2]
}

pub fn octets(mac: MacAddr) -> [u8; 6] {
    [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
}

/// All-zero and broadcast addresses never identify a device.
pub fn is_assignable(mac: MacAddr) -> bool {
    mac != MacAddr::zero() && mac != MacAddr::broadcast()
}

/// Parses a MAC address, accepting `:` or `-` separators and unpadded octets (`0:1a:2:...`).
pub fn parse_lenient(s: &str) -> Option<MacAddr> {
    let parts: Vec<u8> = s
        .trim()
        .split([':', '-'])
        .map(|part| {
            if part.is_empty() || part.len() > 2 {
                None
            } else {
                u8::from_str_radix(part, 16).ok()
            }
        })
        .collect::<Option<Vec<u8>>>()?;

    match parts.as_slice() {
        [a, b, c, d, e, f] => Some(MacAddr::new(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_and_unpadded_forms() {
        let expected = MacAddr::new(0x00, 0x1a, 0x02, 0xbb, 0x0c, 0xff);
        assert_eq!(parse_lenient("00:1a:02:bb:0c:ff"), Some(expected));
        assert_eq!(parse_lenient("0:1a:2:bb:c:ff"), Some(expected));
        assert_eq!(parse_lenient("00-1A-02-BB-0C-FF"), Some(expected));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(parse_lenient("00:1a:02:bb:0c"), None);
        assert_eq!(parse_lenient("00:1a:02:bb:0c:ff:10"), None);
        assert_eq!(parse_lenient("zz:1a:02:bb:0c:ff"), None);
        assert_eq!(parse_lenient("(incomplete)"), None);
    }

    #[test]
    fn zero_and_broadcast_are_not_assignable() {
        assert!(!is_assignable(MacAddr::zero()));
        assert!(!is_assignable(MacAddr::broadcast()));
        assert!(is_assignable(MacAddr::new(0x08, 0x00, 0x27, 1, 2, 3)));
    }
}
