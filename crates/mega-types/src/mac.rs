//! MAC address type with strict parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Only the six-octet, colon-separated form is accepted, and every octet must
/// be exactly two hex digits. Upper and lower case are both accepted on input;
/// output is always lowercase.
///
/// # Examples
///
/// ```
/// use mega_types::MacAddress;
///
/// let mac: MacAddress = "00:1B:21:AA:bb:0c".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:1b:21:aa:bb:0c");
///
/// assert!("00-11-22-33-44-55".parse::<MacAddress>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The zero/null MAC address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0, 0, 0, 0, 0, 0]);

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Creates a MAC address from a vendor prefix and a device suffix.
    pub const fn from_parts(prefix: [u8; 3], suffix: [u8; 3]) -> Self {
        MacAddress([
            prefix[0], prefix[1], prefix[2], suffix[0], suffix[1], suffix[2],
        ])
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns the 3-byte vendor prefix (OUI).
    pub const fn prefix(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Returns true if this is a locally administered address.
    pub const fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = parse_octet(part).ok_or_else(invalid)?;
        }

        Ok(MacAddress(bytes))
    }
}

/// Parses exactly two hex digits. `u8::from_str_radix` alone would also take
/// "+f" or "a", which are not valid MAC octets.
pub(crate) fn parse_octet(s: &str) -> Option<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}

/// Returns true if `s` is a syntactically valid MAC address.
pub fn is_mac(s: &str) -> bool {
    s.parse::<MacAddress>().is_ok()
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}
