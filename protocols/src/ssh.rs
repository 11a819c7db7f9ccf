/// Returns the identification line if `line` is an SSH server banner (`SSH-2.0-...`).
pub fn parse_banner(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?;
    let text = text.trim_end_matches(['\r', '\n']);
    text.starts_with("SSH-").then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_openssh_banner() {
        assert_eq!(
            parse_banner(b"SSH-2.0-OpenSSH_9.6p1 Ubuntu-3\r\n").as_deref(),
            Some("SSH-2.0-OpenSSH_9.6p1 Ubuntu-3")
        );
    }

    #[test]
    fn rejects_other_protocols() {
        assert_eq!(parse_banner(b"HTTP/1.1 400 Bad Request\r\n"), None);
        assert_eq!(parse_banner(b"220 mail ESMTP\r\n"), None);
        assert_eq!(parse_banner(&[0xff, 0xfe]), None);
    }
}
