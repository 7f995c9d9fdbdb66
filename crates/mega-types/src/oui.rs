//! Registry of administratively valid MAC vendor prefixes.
//!
//! The registry is loaded once when a node starts and then shared read-only.
//! It backs two operations: classifying a MAC as "allocated" (its OUI is
//! registered to some vendor) and generating random MACs that look like real
//! hardware.

use crate::mac::{parse_octet, MacAddress};
use crate::ParseError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// A 3-byte organizationally unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oui(pub [u8; 3]);

impl fmt::Display for Oui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}:{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Oui {
    type Err = ParseError;

    /// Accepts `xx:xx:xx`, `xx-xx-xx` and `xxxxxx`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacPrefix(s.to_string());

        let parts: Vec<&str> = if s.contains(':') {
            s.split(':').collect()
        } else if s.contains('-') {
            s.split('-').collect()
        } else if s.len() == 6 && s.is_char_boundary(2) && s.is_char_boundary(4) {
            vec![&s[0..2], &s[2..4], &s[4..6]]
        } else {
            return Err(invalid());
        };

        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 3];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = parse_octet(part).ok_or_else(invalid)?;
        }
        Ok(Oui(bytes))
    }
}

/// Prefixes used when no registry file is configured.
const BUILTIN_PREFIXES: &[[u8; 3]] = &[
    [0x00, 0x00, 0x0c], // Cisco
    [0x00, 0x0c, 0x29], // VMware
    [0x00, 0x15, 0x5d], // Microsoft
    [0x00, 0x16, 0x3e], // Xensource
    [0x00, 0x1b, 0x21], // Intel
    [0x00, 0x1c, 0x42], // Parallels
    [0x00, 0x25, 0x90], // Super Micro
    [0x00, 0x50, 0x56], // VMware
    [0x00, 0xe0, 0x4c], // Realtek
    [0x08, 0x00, 0x27], // PCS Systemtechnik (VirtualBox)
    [0x3c, 0xfd, 0xfe], // Intel
    [0x90, 0xe2, 0xba], // Intel
];

/// Table of administratively valid MAC prefixes.
///
/// Keeps both a vector (for uniform random draws) and a set (for lookups).
#[derive(Debug, Clone, Default)]
pub struct MacPrefixRegistry {
    prefixes: Vec<Oui>,
    index: HashSet<Oui>,
}

impl MacPrefixRegistry {
    /// Builds a registry from a list of prefixes, dropping duplicates.
    pub fn from_prefixes(prefixes: impl IntoIterator<Item = Oui>) -> Self {
        let mut registry = Self::default();
        for oui in prefixes {
            if registry.index.insert(oui) {
                registry.prefixes.push(oui);
            }
        }
        registry
    }

    /// The compiled-in table of well-known vendor prefixes.
    pub fn builtin() -> Self {
        Self::from_prefixes(BUILTIN_PREFIXES.iter().copied().map(Oui))
    }

    /// Parses registry text.
    ///
    /// Understands IEEE `oui.txt` lines (`00-1B-21   (hex)\t\tIntel`) and
    /// plain lines starting with a prefix. Blank lines, `#` comments and
    /// lines that do not start with a prefix are skipped.
    pub fn parse(text: &str) -> Self {
        let prefixes = text.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let token = line.split_whitespace().next()?;
            token.parse::<Oui>().ok()
        });
        Self::from_prefixes(prefixes)
    }

    /// Loads a registry file from disk.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let registry = Self::parse(&content);
        info!(
            path = %path.display(),
            prefixes = registry.len(),
            "Loaded MAC prefix registry"
        );
        Ok(registry)
    }

    /// Number of known prefixes.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Returns true if the registry has no prefixes.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Returns true if the prefix is registered.
    pub fn contains(&self, oui: &Oui) -> bool {
        self.index.contains(oui)
    }

    /// Returns true if `s` is a valid MAC whose vendor prefix is registered.
    pub fn allocated_mac(&self, s: &str) -> bool {
        match s.parse::<MacAddress>() {
            Ok(mac) => self.contains(&Oui(mac.prefix())),
            Err(_) => false,
        }
    }

    /// Generates a MAC with a registered prefix and three random trailing bytes.
    ///
    /// Returns `None` when the registry is empty.
    pub fn random_mac(&self) -> Option<MacAddress> {
        self.random_mac_with(&mut rand::thread_rng())
    }

    /// Same as [`random_mac`](Self::random_mac) with a caller supplied RNG.
    pub fn random_mac_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<MacAddress> {
        let oui = self.prefixes.choose(rng)?;
        let suffix: [u8; 3] = rng.gen();
        let mac = MacAddress::from_parts(oui.0, suffix);
        debug!(%mac, "Generated MAC");
        Some(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn test_oui_formats() {
        let expected = Oui([0x00, 0x1b, 0x21]);
        assert_eq!("00:1b:21".parse::<Oui>().unwrap(), expected);
        assert_eq!("00-1B-21".parse::<Oui>().unwrap(), expected);
        assert_eq!("001B21".parse::<Oui>().unwrap(), expected);
        assert!("001B2".parse::<Oui>().is_err());
        assert!("00:1b".parse::<Oui>().is_err());
        assert!("zz:1b:21".parse::<Oui>().is_err());
    }

    #[test]
    fn test_parse_ieee_format() {
        let text = "\
OUI/MA-L                                                    Organization
company_id                                                  Organization
                                                            Address

00-1B-21   (hex)\t\tIntel Corporate
001B21     (base 16)\t\tIntel Corporate
\t\t\t\tLot 8, Jalan Hi-Tech 2/3

08-00-27   (hex)\t\tPCS Systemtechnik GmbH
080027     (base 16)\t\tPCS Systemtechnik GmbH
";
        let registry = MacPrefixRegistry::parse(text);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&Oui([0x00, 0x1b, 0x21])));
        assert!(registry.contains(&Oui([0x08, 0x00, 0x27])));
    }

    #[test]
    fn test_parse_skips_comments() {
        let registry = MacPrefixRegistry::parse("# local table\n00:50:56\n\nnot-a-prefix\n");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_allocated_mac() {
        let registry = MacPrefixRegistry::builtin();
        assert!(registry.allocated_mac("00:1b:21:12:34:56"));
        assert!(registry.allocated_mac("00:1B:21:12:34:56"));
        assert!(!registry.allocated_mac("00:00:00:00:00:00"));
        assert!(!registry.allocated_mac("not a mac"));
    }

    #[test]
    fn test_random_mac_uses_registered_prefix() {
        let registry = MacPrefixRegistry::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let mac = registry.random_mac_with(&mut rng).unwrap();
            assert!(registry.allocated_mac(&mac.to_string()));
            assert_eq!(mac.to_string(), mac.to_string().to_lowercase());
        }
    }

    #[test]
    fn test_random_mac_empty_registry() {
        assert!(MacPrefixRegistry::default().random_mac().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "52-54-00   (hex)\t\tQEMU").unwrap();
        let registry = MacPrefixRegistry::load(file.path()).unwrap();
        assert!(registry.allocated_mac("52:54:00:aa:bb:cc"));
    }
}
