//! Netspec parsing.
//!
//! A netspec is a comma-separated interface description. Which position
//! holds which field depends on the field count and on what the fields look
//! like:
//!
//! | fields | layout |
//! |---|---|
//! | 1 | `vlan` |
//! | 2 | `vlan,mac`, else `vlan,driver`, else `bridge,vlan` |
//! | 3 | `bridge,vlan,mac`, else `vlan,mac,driver`, else `bridge,vlan,driver` |
//! | 4 | `bridge,vlan,mac,driver` |
//!
//! [`classify`] does the layout step without touching any state, and
//! [`NetSpecParser`] validates the result and resolves the VLAN alias.

use crate::error::NetSpecError;
use crate::resolver::VlanAliasResolver;
use crate::types::NetConfig;
use mega_types::{is_mac, MacPrefixRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Known NIC driver names.
#[derive(Debug, Clone, Default)]
pub struct DriverSet(HashSet<String>);

impl DriverSet {
    pub fn contains(&self, driver: &str) -> bool {
        self.0.contains(driver)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DriverSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        DriverSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Netspec fields by role. Empty fields count as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetSpecFields<'a> {
    pub bridge: Option<&'a str>,
    pub vlan: &'a str,
    pub mac: Option<&'a str>,
    pub driver: Option<&'a str>,
}

fn present(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Assigns roles to the fields of `spec`.
pub fn classify<'a>(spec: &'a str, drivers: &DriverSet) -> Result<NetSpecFields<'a>, NetSpecError> {
    let f: Vec<&str> = spec.split(',').collect();

    let fields = match f[..] {
        [vlan] => NetSpecFields {
            vlan,
            ..Default::default()
        },
        [vlan, mac] if is_mac(mac) => NetSpecFields {
            vlan,
            mac: present(mac),
            ..Default::default()
        },
        [vlan, driver] if drivers.contains(driver) => NetSpecFields {
            vlan,
            driver: present(driver),
            ..Default::default()
        },
        [bridge, vlan] => NetSpecFields {
            bridge: present(bridge),
            vlan,
            ..Default::default()
        },
        [bridge, vlan, mac] if is_mac(mac) => NetSpecFields {
            bridge: present(bridge),
            vlan,
            mac: present(mac),
            driver: None,
        },
        [vlan, mac, driver] if is_mac(mac) => NetSpecFields {
            bridge: None,
            vlan,
            mac: present(mac),
            driver: present(driver),
        },
        [bridge, vlan, driver] => NetSpecFields {
            bridge: present(bridge),
            vlan,
            mac: None,
            driver: present(driver),
        },
        [bridge, vlan, mac, driver] => NetSpecFields {
            bridge: present(bridge),
            vlan,
            mac: present(mac),
            driver: present(driver),
        },
        _ => return Err(NetSpecError::Malformed { fields: f.len() }),
    };
    Ok(fields)
}

/// Turns netspecs into [`NetConfig`]s.
pub struct NetSpecParser {
    resolver: Arc<VlanAliasResolver>,
    registry: Arc<MacPrefixRegistry>,
    drivers: DriverSet,
    default_bridge: String,
    default_driver: String,
}

impl NetSpecParser {
    pub fn new(
        resolver: Arc<VlanAliasResolver>,
        registry: Arc<MacPrefixRegistry>,
        drivers: DriverSet,
        default_bridge: impl Into<String>,
        default_driver: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            registry,
            drivers,
            default_bridge: default_bridge.into(),
            default_driver: default_driver.into(),
        }
    }

    /// Parses one netspec in `namespace`, allocating its VLAN if needed.
    ///
    /// Checks run in order: driver, VLAN resolution, MAC syntax. A MAC with an
    /// unregistered vendor prefix only logs a warning.
    pub async fn parse(&self, namespace: &str, spec: &str) -> Result<NetConfig, NetSpecError> {
        let fields = classify(spec, &self.drivers)?;

        if let Some(driver) = fields.driver {
            if !self.drivers.contains(driver) {
                return Err(NetSpecError::InvalidDriver(driver.to_string()));
            }
        }

        debug!(
            bridge = ?fields.bridge,
            vlan = fields.vlan,
            mac = ?fields.mac,
            driver = ?fields.driver,
            "got netspec fields"
        );

        let vlan = self.resolver.resolve(namespace, fields.vlan).await?;

        if let Some(mac) = fields.mac {
            if !is_mac(mac) {
                return Err(NetSpecError::InvalidMac(mac.to_string()));
            }
            if !self.registry.allocated_mac(mac) {
                warn!(mac, "unallocated mac address");
            }
        }

        Ok(NetConfig {
            vlan,
            bridge: fields.bridge.unwrap_or(self.default_bridge.as_str()).to_string(),
            mac: fields.mac.map(str::to_lowercase).unwrap_or_default(),
            driver: fields.driver.unwrap_or(self.default_driver.as_str()).to_string(),
            raw: spec.to_string(),
        })
    }

    /// Parses a VM's netspecs, stopping at the first bad one.
    pub async fn parse_all<S: AsRef<str>>(
        &self,
        namespace: &str,
        specs: &[S],
    ) -> Result<Vec<NetConfig>, NetSpecError> {
        let mut nets = Vec::with_capacity(specs.len());
        for spec in specs {
            nets.push(self.parse(namespace, spec.as_ref()).await?);
        }
        Ok(nets)
    }

    /// Re-derives records from their raw specs, as done when cloning a VM.
    pub async fn reparse(
        &self,
        namespace: &str,
        nets: &[NetConfig],
    ) -> Result<Vec<NetConfig>, NetSpecError> {
        let mut out = Vec::with_capacity(nets.len());
        for net in nets {
            out.push(self.parse(namespace, &net.raw).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{AllocatedVlans, VlanAllocator};
    use crate::broadcast::{AliasBroadcaster, LocalMesh};
    use crate::error::VlandError;
    use crate::persist::AliasTableWriter;
    use mega_common::LockMode;
    use pretty_assertions::assert_eq;

    fn drivers() -> DriverSet {
        ["e1000", "virtio-net-pci", "i82559c"].into_iter().collect()
    }

    fn fields<'a>(
        bridge: Option<&'a str>,
        vlan: &'a str,
        mac: Option<&'a str>,
        driver: Option<&'a str>,
    ) -> NetSpecFields<'a> {
        NetSpecFields {
            bridge,
            vlan,
            mac,
            driver,
        }
    }

    #[test]
    fn test_classify_table() {
        let d = drivers();
        let mac = "00:11:22:33:44:55";
        let cases = [
            ("100", fields(None, "100", None, None)),
            ("100,00:11:22:33:44:55", fields(None, "100", Some(mac), None)),
            ("100,e1000", fields(None, "100", None, Some("e1000"))),
            ("br0,100", fields(Some("br0"), "100", None, None)),
            ("br0,100,00:11:22:33:44:55", fields(Some("br0"), "100", Some(mac), None)),
            ("100,00:11:22:33:44:55,e1000", fields(None, "100", Some(mac), Some("e1000"))),
            ("br0,100,e1000", fields(Some("br0"), "100", None, Some("e1000"))),
            ("br0,100,00:11:22:33:44:55,e1000", fields(Some("br0"), "100", Some(mac), Some("e1000"))),
            ("100,bogus-driver", fields(Some("100"), "bogus-driver", None, None)),
            ("br0,100,,e1000", fields(Some("br0"), "100", None, Some("e1000"))),
        ];
        for (spec, expected) in cases {
            assert_eq!(classify(spec, &d).unwrap(), expected, "spec {spec:?}");
        }
    }

    #[test]
    fn test_classify_three_fields_mac_in_last_slot_wins() {
        // both field[1] and field[2] look like MACs
        let spec = "00:00:00:00:00:01,00:00:00:00:00:02,00:00:00:00:00:03";
        assert_eq!(
            classify(spec, &drivers()).unwrap(),
            fields(
                Some("00:00:00:00:00:01"),
                "00:00:00:00:00:02",
                Some("00:00:00:00:00:03"),
                None
            )
        );
    }

    #[test]
    fn test_classify_three_fields_unknown_driver_kept() {
        assert_eq!(
            classify("br0,100,tulip", &drivers()).unwrap(),
            fields(Some("br0"), "100", None, Some("tulip"))
        );
    }

    #[test]
    fn test_classify_bad_field_counts() {
        for spec in ["1,2,3,4,5", "a,b,c,d,e,f"] {
            assert!(matches!(
                classify(spec, &drivers()),
                Err(NetSpecError::Malformed { .. })
            ));
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        allocator: Arc<AllocatedVlans>,
        parser: NetSpecParser,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let allocator = Arc::new(AllocatedVlans::default());
        let resolver = Arc::new(VlanAliasResolver::new(
            allocator.clone(),
            Arc::new(AliasTableWriter::new(dir.path().join("vlans"))),
            Arc::new(AliasBroadcaster::new(Arc::new(LocalMesh::new("n1", 4)))),
            LockMode::Plain,
        ));
        let parser = NetSpecParser::new(
            resolver,
            Arc::new(MacPrefixRegistry::builtin()),
            drivers(),
            "mega_bridge",
            "e1000",
        );
        Harness {
            _dir: dir,
            allocator,
            parser,
        }
    }

    #[tokio::test]
    async fn test_single_field_uses_defaults() {
        let h = harness();
        let net = h.parser.parse("alpha", "5").await.unwrap();
        assert_eq!(
            net,
            NetConfig {
                vlan: h.allocator.parse_vlan("alpha", "5").unwrap(),
                bridge: "mega_bridge".to_string(),
                mac: String::new(),
                driver: "e1000".to_string(),
                raw: "5".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_vlan_mac() {
        let h = harness();
        let net = h
            .parser
            .parse("alpha", "100,00:00:00:00:00:00")
            .await
            .unwrap();
        assert_eq!(net.vlan, h.allocator.parse_vlan("alpha", "100").unwrap());
        assert_eq!(net.mac, "00:00:00:00:00:00");
        assert_eq!(net.bridge, "mega_bridge");
    }

    #[tokio::test]
    async fn test_mac_is_lowercased() {
        let h = harness();
        let net = h
            .parser
            .parse("alpha", "DMZ,00:1B:21:AA:BB:CC,virtio-net-pci")
            .await
            .unwrap();
        assert_eq!(net.mac, "00:1b:21:aa:bb:cc");
        assert_eq!(net.driver, "virtio-net-pci");
        assert_eq!(net.raw, "DMZ,00:1B:21:AA:BB:CC,virtio-net-pci");
    }

    #[tokio::test]
    async fn test_bridge_vlan() {
        let h = harness();
        let net = h.parser.parse("alpha", "bridge0,1").await.unwrap();
        assert_eq!(net.bridge, "bridge0");
        assert_eq!(net.vlan, h.allocator.parse_vlan("alpha", "1").unwrap());
    }

    #[tokio::test]
    async fn test_unknown_token_becomes_alias() {
        let h = harness();
        let net = h.parser.parse("alpha", "100,bogus-driver").await.unwrap();
        assert_eq!(net.bridge, "100");
        assert_eq!(net.driver, "e1000");
        assert_eq!(
            net.vlan,
            h.allocator.parse_vlan("alpha", "bogus-driver").unwrap()
        );
        assert!(h.allocator.parse_vlan("alpha", "100").is_err());
    }

    #[tokio::test]
    async fn test_too_many_fields() {
        let h = harness();
        let err = h.parser.parse("alpha", "1,2,3,4,5").await.unwrap_err();
        assert!(matches!(err, NetSpecError::Malformed { fields: 5 }));
        assert!(h.allocator.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_driver_does_not_allocate() {
        let h = harness();
        let err = h.parser.parse("alpha", "br0,100,tulip").await.unwrap_err();
        assert!(matches!(err, NetSpecError::InvalidDriver(d) if d == "tulip"));
        assert!(h.allocator.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mac_in_strict_slot() {
        let h = harness();
        let err = h
            .parser
            .parse("alpha", "br0,100,00:11:22,e1000")
            .await
            .unwrap_err();
        assert!(matches!(err, NetSpecError::InvalidMac(m) if m == "00:11:22"));
    }

    #[tokio::test]
    async fn test_unregistered_mac_is_accepted() {
        let h = harness();
        let net = h
            .parser
            .parse("alpha", "br0,100,de:ad:be:ef:00:01,e1000")
            .await
            .unwrap();
        assert_eq!(net.mac, "de:ad:be:ef:00:01");
    }

    #[tokio::test]
    async fn test_empty_alias() {
        let h = harness();
        let err = h.parser.parse("alpha", "br0,").await.unwrap_err();
        assert!(matches!(err, NetSpecError::Resolve(VlandError::EmptyAlias)));
        assert!(!err.is_syntax());
    }

    #[tokio::test]
    async fn test_full_spec_reparses_equal() {
        let h = harness();
        let net = h
            .parser
            .parse("alpha", "br0,100,00:11:22:33:44:55,e1000")
            .await
            .unwrap();
        let again = h.parser.reparse("alpha", &[net.clone()]).await.unwrap();
        assert_eq!(again, vec![net.clone()]);

        let shown = net.display_spec("alpha", h.allocator.as_ref());
        assert_eq!(shown, "br0,100,00:11:22:33:44:55,e1000");
        assert_eq!(h.parser.parse("alpha", &shown).await.unwrap(), net);
    }

    #[tokio::test]
    async fn test_parse_all_stops_at_first_error() {
        let h = harness();
        let nets = h
            .parser
            .parse_all("alpha", &["A", "br0,B,e1000"])
            .await
            .unwrap();
        assert_eq!(nets.len(), 2);
        assert_ne!(nets[0].vlan, nets[1].vlan);

        let err = h
            .parser
            .parse_all("alpha", &["C", "1,2,3,4,5", "D"])
            .await
            .unwrap_err();
        assert!(err.is_syntax());
        assert!(h.allocator.parse_vlan("alpha", "C").is_ok());
        assert!(h.allocator.parse_vlan("alpha", "D").is_err());
    }
}
