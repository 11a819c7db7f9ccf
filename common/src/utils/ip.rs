use std::net::IpAddr;

/// Builds the reverse-lookup name for an address
/// (`192.168.1.10` → `10.1.168.192.in-addr.arpa`).
pub fn reverse_address_to_ptr(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa")
        }
        IpAddr::V6(v6) => {
            let mut labels: Vec<String> = Vec::with_capacity(34);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0f));
                labels.push(format!("{:x}", byte >> 4));
            }
            labels.push("ip6.arpa".to_string());
            labels.join(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_ptr_name_reverses_octets() {
        let ip: IpAddr = "192.168.1.10".parse().unwrap();
        assert_eq!(reverse_address_to_ptr(&ip), "10.1.168.192.in-addr.arpa");
    }

    #[test]
    fn ipv6_ptr_name_reverses_nibbles() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        let ptr = reverse_address_to_ptr(&ip);
        assert!(ptr.starts_with("1.0.0.0.0.0.0.0"));
        assert!(ptr.ends_with("8.b.d.0.1.0.0.2.ip6.arpa"));
    }
}
