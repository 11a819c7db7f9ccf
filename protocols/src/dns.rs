use std::net::IpAddr;

use anyhow::{Context, ensure};
use dns_parser::{Builder, Packet, QueryClass, QueryType, RData, ResponseCode};

use ledgr_common::utils::ip;

/// Answer to a reverse lookup, keyed by the transaction id it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrAnswer {
    pub id: u16,
    /// `None` when the server answered but holds no PTR record (e.g. NXDOMAIN).
    pub hostname: Option<String>,
}

/// Builds a recursive PTR query for `ip_addr`.
pub fn create_ptr_packet(ip_addr: &IpAddr, id: u16) -> anyhow::Result<Vec<u8>> {
    let ptr_name: String = ip::reverse_address_to_ptr(ip_addr);
    let mut builder = Builder::new_query(id, true);
    builder.add_question(&ptr_name, false, QueryType::PTR, QueryClass::IN);
    builder
        .build()
        .map_err(|_| anyhow::anyhow!("PTR query for {ip_addr} does not fit a single packet"))
}

pub fn get_hostname(payload: &[u8]) -> anyhow::Result<PtrAnswer> {
    let packet = Packet::parse(payload).context("failed to parse DNS packet")?;
    ensure!(!packet.header.query, "expected a DNS response, got a query");

    let id = packet.header.id;
    if packet.header.response_code != ResponseCode::NoError {
        return Ok(PtrAnswer { id, hostname: None });
    }

    let hostname = packet.answers.iter().find_map(|record| match &record.data {
        RData::PTR(ptr) => {
            let name = ptr.0.to_string();
            let name = name.trim_end_matches('.');
            (!name.is_empty()).then(|| name.to_string())
        }
        _ => None,
    });

    Ok(PtrAnswer { id, hostname })
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

    fn encode_dns_name(name: &str) -> Vec<u8> {
        let mut encoded: Vec<u8> = Vec::new();
        for label in name.split('.') {
            if label.is_empty() {
                continue;
            }
            encoded.push(label.len() as u8);
            encoded.extend_from_slice(label.as_bytes());
        }
        encoded.push(0);
        encoded
    }

    fn ptr_response(id: u16, qname: &str, answer: Option<&str>, rcode: u8) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&[0x81, 0x80 | rcode]);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&(answer.is_some() as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);

        buf.extend_from_slice(&encode_dns_name(qname));
        buf.extend_from_slice(&12u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());

        if let Some(answer) = answer {
            let rdata = encode_dns_name(answer);
            // Pointer to the question name at offset 12.
            buf.extend_from_slice(&[0xc0, 0x0c]);
            buf.extend_from_slice(&12u16.to_be_bytes());
            buf.extend_from_slice(&1u16.to_be_bytes());
            buf.extend_from_slice(&300u32.to_be_bytes());
            buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata);
        }
        buf
    }

    #[test]
    fn query_asks_for_the_reverse_name() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        let bytes = create_ptr_packet(&ip, 0x1234).unwrap();

        let packet = Packet::parse(&bytes).unwrap();
        assert_eq!(packet.header.id, 0x1234);
        assert!(packet.header.query);
        assert!(packet.header.recursion_desired);
        assert_eq!(packet.questions.len(), 1);
        assert_eq!(packet.questions[0].qname.to_string(), "100.1.168.192.in-addr.arpa");
        assert_eq!(packet.questions[0].qtype, QueryType::PTR);
    }

    #[test]
    fn parses_ptr_answer() {
        let bytes = ptr_response(7, "100.1.168.192.in-addr.arpa", Some("nas.lan."), 0);
        let answer = get_hostname(&bytes).unwrap();
        assert_eq!(
            answer,
            PtrAnswer {
                id: 7,
                hostname: Some("nas.lan".to_string())
            }
        );
    }

    #[test]
    fn nxdomain_yields_no_hostname() {
        let bytes = ptr_response(9, "5.0.0.10.in-addr.arpa", None, 3);
        let answer = get_hostname(&bytes).unwrap();
        assert_eq!(answer.id, 9);
        assert_eq!(answer.hostname, None);
    }

    #[test]
    fn rejects_queries_and_garbage() {
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        let query = create_ptr_packet(&ip, 1).unwrap();
        assert!(get_hostname(&query).is_err());
        assert!(get_hostname(&[0x00, 0x01, 0x02]).is_err());
    }
}
