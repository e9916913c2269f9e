//! Component index: three parallel `component-type → set<entity>` maps, kept in sync with
//! entity enable/disable and component add/remove so queries never need to scan every entity.

use ahash::AHashMap;
use indexmap::IndexSet;

use crate::entity::EntityId;
use crate::key::ComponentKey;

type EntitySet = IndexSet<EntityId, ahash::RandomState>;

/// Which of the three maps a query should read from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActiveIndex {
    Union,
    EnabledOnly,
    DisabledOnly,
}

/// The three-map component index. Invariant: for every `(key, entity)` pair in `union`,
/// `entity` appears in exactly one of `enabled`/`disabled` for that same key, matching the
/// entity's `enabled` flag at that moment. A second invariant: no set is ever left empty --
/// `has_key` meaning non-empty depends on evicting empties promptly.
#[derive(Default)]
pub struct ComponentIndex {
    union: AHashMap<ComponentKey, EntitySet>,
    enabled: AHashMap<ComponentKey, EntitySet>,
    disabled: AHashMap<ComponentKey, EntitySet>,
}

impl ComponentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert into the union index and whichever of enabled/disabled matches the entity's
    /// current flag.
    pub fn add_entity(&mut self, entity: &EntityId, key: ComponentKey, enabled: bool) {
        self.union.entry(key).or_default().insert(entity.clone());
        let side = if enabled { &mut self.enabled } else { &mut self.disabled };
        side.entry(key).or_default().insert(entity.clone());
    }

    /// Remove from all three maps, evicting any map that becomes empty. A missing key is a
    /// no-op.
    pub fn remove_entity(&mut self, entity: &EntityId, key: ComponentKey) {
        Self::remove_and_evict(&mut self.union, key, entity);
        Self::remove_and_evict(&mut self.enabled, key, entity);
        Self::remove_and_evict(&mut self.disabled, key, entity);
    }

    /// Remove `entity` from every component key it's indexed under, across all three maps
    /// (used by `World::remove_entity`).
    pub fn remove_entity_everywhere(&mut self, entity: &EntityId, keys: impl Iterator<Item = ComponentKey>) {
        for key in keys {
            self.remove_entity(entity, key);
        }
    }

    /// For every component key `entity` carries, move it from `enabled` to `disabled`.
    pub fn move_to_disabled(&mut self, entity: &EntityId, keys: impl Iterator<Item = ComponentKey>) {
        for key in keys {
            Self::remove_and_evict(&mut self.enabled, key, entity);
            self.disabled.entry(key).or_default().insert(entity.clone());
        }
    }

    /// Inverse of the above.
    pub fn move_to_enabled(&mut self, entity: &EntityId, keys: impl Iterator<Item = ComponentKey>) {
        for key in keys {
            Self::remove_and_evict(&mut self.disabled, key, entity);
            self.enabled.entry(key).or_default().insert(entity.clone());
        }
    }

    fn remove_and_evict(map: &mut AHashMap<ComponentKey, EntitySet>, key: ComponentKey, entity: &EntityId) {
        if let Some(set) = map.get_mut(&key) {
            set.shift_remove(entity);
            if set.is_empty() {
                map.remove(&key);
            }
        }
    }

    pub fn set_for(&self, active: ActiveIndex, key: ComponentKey) -> Option<&EntitySet> {
        let map = match active {
            ActiveIndex::Union => &self.union,
            ActiveIndex::EnabledOnly => &self.enabled,
            ActiveIndex::DisabledOnly => &self.disabled,
        };
        map.get(&key)
    }

    /// Present and non-empty are synonymous because empty sets are always evicted.
    pub fn has_key(&self, active: ActiveIndex, key: ComponentKey) -> bool {
        self.set_for(active, key).is_some()
    }

    #[cfg(test)]
    pub(crate) fn invariant_holds(&self, entity: &EntityId, key: ComponentKey, expected_enabled: bool) -> bool {
        let in_union = self.union.get(&key).is_some_and(|s| s.contains(entity));
        let in_enabled = self.enabled.get(&key).is_some_and(|s| s.contains(entity));
        let in_disabled = self.disabled.get(&key).is_some_and(|s| s.contains(entity));
        if !in_union {
            return !in_enabled && !in_disabled;
        }
        in_enabled != in_disabled && in_enabled == expected_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_map_invariant_holds_through_enable_disable() {
        let mut index = ComponentIndex::new();
        let e = EntityId::new("e");
        let key = ComponentKey::of::<u32>();

        index.add_entity(&e, key, true);
        assert!(index.invariant_holds(&e, key, true));

        index.move_to_disabled(&e, std::iter::once(key));
        assert!(index.invariant_holds(&e, key, false));

        index.move_to_enabled(&e, std::iter::once(key));
        assert!(index.invariant_holds(&e, key, true));
    }

    #[test]
    fn empty_sets_are_evicted() {
        let mut index = ComponentIndex::new();
        let e = EntityId::new("e");
        let key = ComponentKey::of::<u32>();

        index.add_entity(&e, key, true);
        assert!(index.has_key(ActiveIndex::Union, key));

        index.remove_entity(&e, key);
        assert!(!index.has_key(ActiveIndex::Union, key));
        assert!(!index.has_key(ActiveIndex::EnabledOnly, key));
    }
}
