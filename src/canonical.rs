//! Key Canonicalizer Module
//!
//! Turns a client address into the fixed-length lowercase hexadecimal key that
//! names its cache file. IPv4 addresses produce 8 hex digits; IPv6 addresses
//! produce 32 hex digits, with an embedded dotted IPv4 tail folded into the
//! last two groups.
use crate::error::{GeoError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const V4_KEY_LEN: usize = 8;
const V6_KEY_LEN: usize = 32;
const V6_GROUPS: usize = 8;

/// Hexadecimal cache key for one address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns the first element of a comma-separated forwarding chain, trimmed.
pub fn first_address(raw: &str) -> &str {
    raw.split(',').next().unwrap_or("").trim()
}

/// Canonicalizes a raw address value, which may be a forwarding chain.
pub fn canonical_key(raw: &str) -> Result<CanonicalKey> {
    canonicalize(first_address(raw))
}

/// Canonicalizes a single address.
pub fn canonicalize(address: &str) -> Result<CanonicalKey> {
    let (text, hex, key_len) = if address.parse::<Ipv6Addr>().is_ok() {
        let groups = expand_v6_groups(address)?;
        (groups.join(":"), groups.concat(), V6_KEY_LEN)
    } else if let Ok(v4) = address.parse::<Ipv4Addr>() {
        let octets = v4_hex_octets(&v4);
        let text = format!("::{}{}:{}{}", octets[0], octets[1], octets[2], octets[3]);
        (text, octets.concat(), V4_KEY_LEN)
    } else {
        return Err(GeoError::InvalidAddress(address.to_string()));
    };

    if text.parse::<IpAddr>().is_err() {
        return Err(GeoError::InvalidAddress(address.to_string()));
    }
    Ok(CanonicalKey(format!("{:0>width$}", hex, width = key_len).to_lowercase()))
}

fn v4_hex_octets(v4: &Ipv4Addr) -> [String; 4] {
    v4.octets().map(|o| format!("{:02x}", o))
}

/// Splits an IPv6 literal into eight zero-padded groups.
///
/// Only the first empty segment stands for the `::` run; any later empty
/// segment is kept as a single literal group.
fn expand_v6_groups(address: &str) -> Result<Vec<String>> {
    let mut parts: Vec<String> = address.split(':').map(str::to_string).collect();

    if let Some(v4) = parts.last().and_then(|tail| tail.parse::<Ipv4Addr>().ok()) {
        let octets = v4_hex_octets(&v4);
        parts.pop();
        parts.push(format!("{}{}", octets[0], octets[1]));
        parts.push(format!("{}{}", octets[2], octets[3]));
    }

    let run = (V6_GROUPS + 1)
        .checked_sub(parts.len())
        .ok_or_else(|| GeoError::InvalidAddress(address.to_string()))?;

    let mut groups = Vec::with_capacity(V6_GROUPS);
    let mut expanded = false;
    for part in parts {
        if !expanded && part.is_empty() {
            groups.extend(std::iter::repeat("0000".to_string()).take(run));
            expanded = true;
        } else {
            groups.push(format!("{:0>4}", part));
        }
    }
    Ok(groups)
}
