//! VLAN ID type with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IEEE 802.1Q VLAN identifier (1-4094).
///
/// VLAN 0 and 4095 are reserved by the standard and never handed out.
///
/// # Examples
///
/// ```
/// use mega_types::VlanId;
///
/// let vlan = VlanId::new(101).unwrap();
/// assert_eq!(vlan.as_u16(), 101);
///
/// assert!(VlanId::new(0).is_err());
/// assert!(VlanId::new(4095).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Minimum valid VLAN ID.
    pub const MIN: u16 = 1;

    /// Maximum valid VLAN ID.
    pub const MAX: u16 = 4094;

    /// Creates a new VLAN ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the VLAN ID is not in the valid range (1-4094).
    pub fn new(id: u16) -> Result<Self, ParseError> {
        if (Self::MIN..=Self::MAX).contains(&id) {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id.to_string()))
        }
    }

    /// Returns the VLAN ID as a u16.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u16 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidVlanId(s.to_string()))?;

        VlanId::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_vlan_ids() {
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(101).is_ok());
        assert!(VlanId::new(4094).is_ok());
    }

    #[test]
    fn test_invalid_vlan_ids() {
        assert!(VlanId::new(0).is_err());
        assert!(VlanId::new(4095).is_err());
        assert!(VlanId::new(65535).is_err());
    }

    #[test]
    fn test_parse_numeric() {
        let vlan: VlanId = "101".parse().unwrap();
        assert_eq!(vlan.as_u16(), 101);
        assert!("DMZ".parse::<VlanId>().is_err());
        assert!("-1".parse::<VlanId>().is_err());
    }

    #[test]
    fn test_display() {
        let vlan = VlanId::new(100).unwrap();
        assert_eq!(vlan.to_string(), "100");
    }

    #[test]
    fn test_serde_rejects_reserved() {
        let ok: VlanId = serde_json::from_str("200").unwrap();
        assert_eq!(ok.as_u16(), 200);
        assert!(serde_json::from_str::<VlanId>("4095").is_err());
    }
}
