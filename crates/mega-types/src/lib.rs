//! Common network types for the minimega control plane.
//!
//! This crate provides type-safe representations of the network primitives
//! used when configuring VM interfaces:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses with strict parsing
//! - [`MacPrefixRegistry`]: administratively valid vendor prefixes (OUIs)
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers

mod mac;
mod oui;
mod vlan;

pub use mac::{is_mac, MacAddress};
pub use oui::{MacPrefixRegistry, Oui};
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid MAC prefix format: {0}")]
    InvalidMacPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(String),
}
