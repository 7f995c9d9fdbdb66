//! Network interface records.

use crate::allocator::VlanAllocator;
use mega_types::VlanId;
use serde::{Deserialize, Serialize};

/// One VM network interface, as produced by the netspec parser.
///
/// `raw` keeps the netspec the record was parsed from so that a cloned VM can
/// re-derive its interfaces instead of copying resolved IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    pub vlan: VlanId,
    pub bridge: String,
    /// Lowercase colon-hex, or empty when none was given.
    pub mac: String,
    pub driver: String,
    pub raw: String,
}

impl NetConfig {
    pub fn has_mac(&self) -> bool {
        !self.mac.is_empty()
    }

    /// Renders the record back into netspec form, with the VLAN shown as the
    /// alias it has in `namespace`.
    pub fn display_spec(&self, namespace: &str, allocator: &dyn VlanAllocator) -> String {
        let vlan = allocator.print_vlan(namespace, self.vlan);
        if self.has_mac() {
            format!("{},{},{},{}", self.bridge, vlan, self.mac, self.driver)
        } else {
            format!("{},{},{}", self.bridge, vlan, self.driver)
        }
    }
}

/// Renders a VM's interfaces as `[netspec netspec ...]`.
pub fn network_table(namespace: &str, nets: &[NetConfig], allocator: &dyn VlanAllocator) -> String {
    let specs: Vec<String> = nets
        .iter()
        .map(|net| net.display_spec(namespace, allocator))
        .collect();
    format!("[{}]", specs.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocatedVlans;
    use pretty_assertions::assert_eq;

    fn net(vlan: VlanId, mac: &str) -> NetConfig {
        NetConfig {
            vlan,
            bridge: "mega_bridge".to_string(),
            mac: mac.to_string(),
            driver: "e1000".to_string(),
            raw: String::new(),
        }
    }

    #[test]
    fn test_display_spec() {
        let vlans = AllocatedVlans::default();
        let (id, _) = vlans.allocate("alpha", "DMZ").unwrap();

        assert_eq!(
            net(id, "").display_spec("alpha", &vlans),
            "mega_bridge,DMZ,e1000"
        );
        assert_eq!(
            net(id, "00:11:22:33:44:55").display_spec("beta", &vlans),
            "mega_bridge,alpha//DMZ,00:11:22:33:44:55,e1000"
        );
    }

    #[test]
    fn test_network_table() {
        let vlans = AllocatedVlans::default();
        let (id, _) = vlans.allocate("alpha", "DMZ").unwrap();
        let unbound = VlanId::new(4000).unwrap();
        assert_eq!(
            network_table("alpha", &[net(id, ""), net(unbound, "")], &vlans),
            "[mega_bridge,DMZ,e1000 mega_bridge,4000,e1000]"
        );
        assert_eq!(network_table("alpha", &[], &vlans), "[]");
    }
}
