//! CIDR to match-condition compiler
//!
//! Turns `address/prefix` text into the single condition every filter carries:
//! the remote address of the connection attempt must equal `{addr, mask}`.
//! Nothing here talks to the engine.

use crate::core::error::{Error, Result};
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

/// Field a condition tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    /// Remote IP address of the connection attempt
    RemoteAddress,
}

/// How the field is compared with the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Equal,
}

/// IPv4 address and contiguous prefix mask.
///
/// Both words hold the big-endian reading of the octets, so `10.0.0.0/24`
/// is `{ addr: 0x0A00_0000, mask: 0xFFFF_FF00 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddrMask {
    pub addr: u32,
    pub mask: u32,
}

impl AddrMask {
    pub fn address(self) -> Ipv4Addr {
        Ipv4Addr::from(self.addr)
    }

    pub fn netmask(self) -> Ipv4Addr {
        Ipv4Addr::from(self.mask)
    }

    /// Number of leading one bits in the mask
    pub fn prefix_len(self) -> u8 {
        // at most 32
        self.mask.leading_ones() as u8
    }
}

impl fmt::Display for AddrMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address(), self.prefix_len())
    }
}

/// Typed condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionValue {
    V4AddrMask(AddrMask),
}

/// A compiled match condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub field: ConditionField,
    pub match_type: MatchType,
    pub value: ConditionValue,
    /// Network as parsed, kept for labels
    pub network: Ipv4Network,
}

impl Condition {
    pub fn addr_mask(&self) -> AddrMask {
        match self.value {
            ConditionValue::V4AddrMask(am) => am,
        }
    }
}

/// Compiles CIDR text into a remote-address condition.
///
/// The address is kept as written; host bits are not cleared.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the text is not `a.b.c.d/p` with `p` a
/// decimal integer in `0..=32`.
pub fn translate(cidr: &str) -> Result<Condition> {
    let invalid = |reason: &str| Error::Parse {
        input: cidr.to_string(),
        reason: reason.to_string(),
    };

    let (addr_text, prefix_text) = cidr
        .split_once('/')
        .ok_or_else(|| invalid("expected address/prefix"))?;

    let addr: Ipv4Addr = addr_text
        .parse()
        .map_err(|_| invalid("not an IPv4 address"))?;

    let prefix = parse_prefix(prefix_text)
        .ok_or_else(|| invalid("prefix length must be a decimal number"))?;
    if prefix > 32 {
        return Err(invalid("prefix length must be between 0 and 32"));
    }

    let network = Ipv4Network::new(addr, prefix).map_err(|e| invalid(&e.to_string()))?;

    Ok(Condition {
        field: ConditionField::RemoteAddress,
        match_type: MatchType::Equal,
        value: ConditionValue::V4AddrMask(AddrMask {
            addr: u32::from(addr),
            mask: u32::from(network.mask()),
        }),
        network,
    })
}

/// Compiles every entry, stopping at the first bad one.
///
/// # Errors
///
/// Returns the [`Error::Parse`] of the first entry that does not compile.
pub fn compile_all<S: AsRef<str>>(cidrs: &[S]) -> Result<Vec<Condition>> {
    cidrs.iter().map(|cidr| translate(cidr.as_ref())).collect()
}

/// Decimal prefix without sign or leading zeros ("0" itself is allowed).
fn parse_prefix(text: &str) -> Option<u8> {
    if text.is_empty() || text.len() > 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_slash_24() {
        let cond = translate("10.0.0.0/24").unwrap();
        assert_eq!(cond.field, ConditionField::RemoteAddress);
        assert_eq!(cond.match_type, MatchType::Equal);
        let am = cond.addr_mask();
        assert_eq!(am.addr, 0x0A00_0000);
        assert_eq!(am.mask, 0xFFFF_FF00);
        assert_eq!(am.netmask(), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn test_translate_host_route() {
        let am = translate("192.168.1.5/32").unwrap().addr_mask();
        assert_eq!(am.address(), Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(am.mask, u32::MAX);
    }

    #[test]
    fn test_translate_any_address() {
        let am = translate("0.0.0.0/0").unwrap().addr_mask();
        assert_eq!(am.addr, 0);
        assert_eq!(am.mask, 0);
    }

    #[test]
    fn test_translate_keeps_host_bits() {
        let am = translate("10.1.2.3/8").unwrap().addr_mask();
        assert_eq!(am.address(), Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(am.netmask(), Ipv4Addr::new(255, 0, 0, 0));
    }

    #[test]
    fn test_translate_rejects_malformed() {
        for input in [
            "",
            "10.0.0.0",
            "10.0.0.0/",
            "/24",
            "10.0.0/24",
            "10.0.0.256/24",
            "10.0.0.0/33",
            "10.0.0.0/-1",
            "10.0.0.0/+8",
            "10.0.0.0/08",
            "10.0.0.0/2 4",
            " 10.0.0.0/24",
            "10.0.0.0/24/8",
            "::1/128",
            "2001:db8::/32",
            "example.com/24",
        ] {
            let err = translate(input).unwrap_err();
            assert!(
                matches!(&err, Error::Parse { input: i, .. } if i == input),
                "{input:?} should be a parse error, got {err:?}"
            );
        }
    }

    #[test]
    fn test_mask_edges() {
        for (prefix, mask) in [
            (0, 0),
            (1, 0x8000_0000),
            (16, 0xFFFF_0000),
            (31, 0xFFFF_FFFE),
            (32, 0xFFFF_FFFF),
        ] {
            let am = translate(&format!("10.0.0.0/{prefix}")).unwrap().addr_mask();
            assert_eq!(am.mask, mask, "/{prefix}");
        }
    }

    #[test]
    fn test_compile_all_in_order() {
        let conditions = compile_all(&["10.0.0.0/8", "192.168.1.0/24"]).unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[1].addr_mask().addr, 0xC0A8_0100);
        assert!(compile_all::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_compile_all_reports_first_bad_entry() {
        let err = compile_all(&["10.0.0.0/8", "bogus", "10.0.0.0/40"]).unwrap_err();
        assert!(matches!(err, Error::Parse { ref input, .. } if input == "bogus"));
    }

    #[test]
    fn test_addr_mask_display() {
        let am = translate("172.16.0.0/16").unwrap().addr_mask();
        assert_eq!(am.to_string(), "172.16.0.0/16");
    }
}
