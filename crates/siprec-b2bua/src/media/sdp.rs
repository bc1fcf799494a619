//! Small SDP inspections used while routing a call

/// True when an audio m-line asks for a secure RTP profile
pub fn sdp_wants_srtp(sdp: &str) -> bool {
    sdp.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("m=audio"))
        .any(|line| line.contains("SAVP"))
}

/// IPv4 address of the first connection line
pub fn parse_connection_ip(sdp: &str) -> Option<String> {
    sdp.lines().map(str::trim).find_map(|line| {
        let addr = line.strip_prefix("c=IN IP4 ")?;
        let addr: String = addr
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if addr.is_empty() {
            None
        } else {
            Some(addr)
        }
    })
}
