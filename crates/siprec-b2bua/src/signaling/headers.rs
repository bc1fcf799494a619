//! Address header helpers
//!
//! `From`, `To` and `P-Asserted-Identity` share the name-addr grammar and are
//! parsed with `rvoip-sip-core`. Only the outbound `From` is formatted here.

use std::str::FromStr;

use rvoip_sip_core::types::address::Address;
use rvoip_sip_core::types::to::To;
use rvoip_sip_core::types::uri::{Scheme, Uri};

/// Host used in the rewritten outbound `From`
pub const OUTBOUND_FROM_HOST: &str = "localhost";

/// Parse a `From`, `To` or `P-Asserted-Identity` value
pub fn parse_address(value: &str) -> Option<Address> {
    To::from_str(value.trim()).ok().map(|to| to.0)
}

pub fn parse_uri(value: &str) -> Option<Uri> {
    Uri::from_str(value.trim()).ok()
}

/// User part of a SIP URI, or the number of a TEL URI
pub fn uri_user(uri: &Uri) -> Option<String> {
    let user = match uri.scheme {
        Scheme::Tel => uri.host.to_string(),
        _ => uri.user.clone()?,
    };
    if user.is_empty() {
        None
    } else {
        Some(user)
    }
}

/// Address of record: scheme, user and host, without parameters
pub fn address_of_record(uri: &Uri) -> String {
    match &uri.user {
        Some(user) if uri.scheme != Scheme::Tel => {
            format!("{}:{}@{}", uri.scheme, user, uri.host_port())
        }
        _ => format!("{}:{}", uri.scheme, uri.host_port()),
    }
}

/// `From` header for the outbound leg
///
/// Built from the user part of the inbound `From`, never from an asserted
/// identity, so the trunk sees the number the caller actually sent.
pub fn outbound_from_header(inbound_from: &Address) -> String {
    let display = inbound_from
        .display_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(|name| format!("{} ", quoted(name)))
        .unwrap_or_default();
    let user = uri_user(&inbound_from.uri).unwrap_or_else(|| "anonymous".to_string());

    format!("{}<sip:{}@{}>", display, user, OUTBOUND_FROM_HOST)
}

fn quoted(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
