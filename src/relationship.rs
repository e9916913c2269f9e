//! Relationship index: forward `relation → [entity]` and reverse `relation → [target]` maps.

use ahash::AHashMap;

use crate::entity::EntityId;
use crate::key::RelationKey;

/// The target end of a relationship: either a live entity, or a bare type tag.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RelationTarget {
    Entity(EntityId),
    Tag(crate::key::ComponentKey),
}

/// A (source, relation, target) triple.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Relationship {
    pub source: EntityId,
    pub relation: RelationKey,
    pub target: RelationTarget,
}

impl Relationship {
    pub fn new(source: EntityId, relation: RelationKey, target: RelationTarget) -> Self {
        Self {
            source,
            relation,
            target,
        }
    }
}

/// Forward and reverse relationship indices.
///
/// The reverse index only ever gets an entry when the target is itself a live entity; a
/// stale target (one that doesn't resolve to a currently-live entity) is skipped there
/// silently while still being recorded in the forward index.
#[derive(Default)]
pub struct RelationshipIndex {
    forward: AHashMap<RelationKey, Vec<Relationship>>,
    reverse: AHashMap<RelationKey, Vec<Relationship>>,
}

impl RelationshipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a relationship. `target_is_live` is supplied by the caller (the world), which
    /// is the only thing that can check liveness -- this module stays entity-store-agnostic.
    pub fn add(&mut self, rel: Relationship, target_is_live: bool) {
        self.forward.entry(rel.relation).or_default().push(rel.clone());

        if target_is_live {
            if let RelationTarget::Entity(_) = rel.target {
                self.reverse.entry(rel.relation).or_default().push(rel);
            }
        }
        // Stale or tag target: forward index already has it, reverse is skipped silently.
    }

    /// Remove every relationship matching `(source, relation, target)`. Idempotent: removing
    /// a relationship that isn't present (e.g. a double-remove of a stale-target relationship
    /// whose reverse entry was never written) is a no-op, not an error.
    pub fn remove(&mut self, source: &EntityId, relation: RelationKey, target: &RelationTarget) {
        if let Some(list) = self.forward.get_mut(&relation) {
            list.retain(|r| !(r.source == *source && r.target == *target));
            if list.is_empty() {
                self.forward.remove(&relation);
            }
        }
        if let Some(list) = self.reverse.get_mut(&relation) {
            list.retain(|r| !(r.source == *source && r.target == *target));
            if list.is_empty() {
                self.reverse.remove(&relation);
            }
        }
    }

    /// Remove every relationship sourced from `entity`, wherever it appears as a source.
    /// Called by `World::remove_entity`.
    pub fn remove_all_from(&mut self, entity: &EntityId) {
        for list in self.forward.values_mut() {
            list.retain(|r| r.source != *entity);
        }
        for list in self.reverse.values_mut() {
            list.retain(|r| r.source != *entity);
        }
        self.forward.retain(|_, v| !v.is_empty());
        self.reverse.retain(|_, v| !v.is_empty());
    }

    pub fn forward_entities(&self, relation: RelationKey) -> &[Relationship] {
        self.forward.get(&relation).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn reverse_targets(&self, relation: RelationKey) -> &[Relationship] {
        self.reverse.get(&relation).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Drop every relationship.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}
