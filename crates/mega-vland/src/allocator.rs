//! VLAN ID allocation keyed by namespaced alias.
//!
//! [`VlanAllocator`] is the seam between the resolver and whatever owns the
//! numeric VLAN space. [`AllocatedVlans`] is the in-memory implementation a
//! node runs with: aliases are stored fully qualified (`namespace//alias`) and
//! IDs are handed out from a configured range.

use mega_types::VlanId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, error};

/// Separator between namespace and alias in a qualified alias.
pub const ALIAS_SEP: &str = "//";

/// Allocator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VlanError {
    /// The alias has no binding yet.
    #[error("unallocated")]
    Unallocated,

    /// Every ID in the range is bound.
    #[error("no VLANs left in range {min}-{max}")]
    Exhausted { min: u16, max: u16 },

    /// The alias cannot be stored.
    #[error("invalid alias: {0:?}")]
    InvalidAlias(String),

    /// The alias is already bound to another ID.
    #[error("alias {alias} is bound to VLAN {existing}, refusing {requested}")]
    AliasConflict {
        alias: String,
        existing: VlanId,
        requested: VlanId,
    },

    /// The ID is already bound to another alias.
    #[error("VLAN {vlan} is bound to alias {existing}, refusing {requested}")]
    VlanConflict {
        vlan: VlanId,
        existing: String,
        requested: String,
    },
}

/// Owner of the alias to VLAN ID mapping.
///
/// Implementations must make [`allocate`](VlanAllocator::allocate) atomic:
/// of several concurrent callers for the same unseen alias exactly one gets
/// `created == true`, and all of them get the same ID.
pub trait VlanAllocator: Send + Sync {
    /// Looks up an alias. Returns [`VlanError::Unallocated`] when it is unbound.
    fn parse_vlan(&self, namespace: &str, alias: &str) -> Result<VlanId, VlanError>;

    /// Returns the ID bound to the alias, binding a fresh one if needed.
    /// The flag is true only for the call that created the binding.
    fn allocate(&self, namespace: &str, alias: &str) -> Result<(VlanId, bool), VlanError>;

    /// Human form of an ID as seen from `namespace`.
    fn print_vlan(&self, namespace: &str, vlan: VlanId) -> String;

    /// Every binding as `(alias, id)` rows sorted by alias. With a namespace
    /// filter only that namespace is listed and aliases are unqualified.
    fn tabular(&self, namespace: Option<&str>) -> Vec<(String, VlanId)>;

    /// Records a binding learned from elsewhere. Returns true when it was new,
    /// false when the identical binding already existed.
    fn add_alias(&self, namespace: &str, alias: &str, vlan: VlanId) -> Result<bool, VlanError>;
}

/// Qualifies an alias with its namespace unless it already carries one.
pub fn qualify(namespace: &str, alias: &str) -> String {
    if alias.contains(ALIAS_SEP) {
        alias.to_string()
    } else {
        format!("{namespace}{ALIAS_SEP}{alias}")
    }
}

/// Splits a qualified alias into `(namespace, alias)`.
pub fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    qualified.split_once(ALIAS_SEP)
}

#[derive(Debug, Default)]
struct AliasState {
    by_alias: HashMap<String, VlanId>,
    by_vlan: BTreeMap<VlanId, String>,
    next: u16,
}

/// In-memory allocator over a contiguous VLAN range.
#[derive(Debug)]
pub struct AllocatedVlans {
    min: u16,
    max: u16,
    state: RwLock<AliasState>,
}

impl AllocatedVlans {
    /// Creates an allocator handing out IDs in `min..=max`.
    pub fn new(min: VlanId, max: VlanId) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min: min.as_u16(),
            max: max.as_u16(),
            state: RwLock::new(AliasState {
                next: min.as_u16(),
                ..Default::default()
            }),
        }
    }

    /// Number of bound aliases.
    pub fn len(&self) -> usize {
        self.state.read().by_alias.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First free ID at or after the cursor, wrapping once around the range.
    fn next_free(&self, state: &AliasState) -> Option<VlanId> {
        let span = u32::from(self.max - self.min) + 1;
        let start = u32::from(state.next.clamp(self.min, self.max) - self.min);

        (0..span)
            .map(|offset| self.min + ((start + offset) % span) as u16)
            .filter_map(|id| VlanId::new(id).ok())
            .find(|id| !state.by_vlan.contains_key(id))
    }
}

impl Default for AllocatedVlans {
    fn default() -> Self {
        Self {
            min: 101,
            max: VlanId::MAX,
            state: RwLock::new(AliasState {
                next: 101,
                ..Default::default()
            }),
        }
    }
}

impl VlanAllocator for AllocatedVlans {
    fn parse_vlan(&self, namespace: &str, alias: &str) -> Result<VlanId, VlanError> {
        let key = qualify(namespace, alias);
        self.state
            .read()
            .by_alias
            .get(&key)
            .copied()
            .ok_or(VlanError::Unallocated)
    }

    fn allocate(&self, namespace: &str, alias: &str) -> Result<(VlanId, bool), VlanError> {
        if alias.is_empty() {
            return Err(VlanError::InvalidAlias(alias.to_string()));
        }
        let key = qualify(namespace, alias);

        let mut state = self.state.write();
        if let Some(vlan) = state.by_alias.get(&key) {
            return Ok((*vlan, false));
        }

        let vlan = self.next_free(&state).ok_or(VlanError::Exhausted {
            min: self.min,
            max: self.max,
        })?;
        state.by_alias.insert(key.clone(), vlan);
        state.by_vlan.insert(vlan, key.clone());
        state.next = vlan.as_u16().saturating_add(1);

        debug!(alias = %key, %vlan, "Bound alias");
        Ok((vlan, true))
    }

    fn print_vlan(&self, namespace: &str, vlan: VlanId) -> String {
        let state = self.state.read();
        match state.by_vlan.get(&vlan) {
            Some(qualified) => match split_qualified(qualified) {
                Some((ns, alias)) if ns == namespace => alias.to_string(),
                _ => qualified.clone(),
            },
            None => vlan.to_string(),
        }
    }

    fn tabular(&self, namespace: Option<&str>) -> Vec<(String, VlanId)> {
        let state = self.state.read();
        let mut rows: Vec<(String, VlanId)> = state
            .by_alias
            .iter()
            .filter_map(|(qualified, vlan)| match namespace {
                None => Some((qualified.clone(), *vlan)),
                Some(filter) => match split_qualified(qualified) {
                    Some((ns, alias)) if ns == filter => Some((alias.to_string(), *vlan)),
                    _ => None,
                },
            })
            .collect();
        rows.sort();
        rows
    }

    fn add_alias(&self, namespace: &str, alias: &str, vlan: VlanId) -> Result<bool, VlanError> {
        if alias.is_empty() {
            return Err(VlanError::InvalidAlias(alias.to_string()));
        }
        let key = qualify(namespace, alias);

        let mut state = self.state.write();
        if let Some(existing) = state.by_alias.get(&key).copied() {
            if existing == vlan {
                return Ok(false);
            }
            error!(alias = %key, %existing, requested = %vlan, "Divergent VLAN alias binding");
            return Err(VlanError::AliasConflict {
                alias: key,
                existing,
                requested: vlan,
            });
        }
        if let Some(existing) = state.by_vlan.get(&vlan) {
            error!(%vlan, existing = %existing, requested = %key, "VLAN already bound to another alias");
            return Err(VlanError::VlanConflict {
                vlan,
                existing: existing.clone(),
                requested: key,
            });
        }

        state.by_alias.insert(key.clone(), vlan);
        state.by_vlan.insert(vlan, key);
        Ok(true)
    }
}
