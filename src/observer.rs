//! Reactive observers: world-wide added/removed/changed fan-out, delivered through
//! [`crate::host::NullHost`]'s deferred-call channel rather than synchronously at the
//! mutating call site.

use std::any::Any;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::entity::EntityId;
use crate::key::ComponentKey;
use crate::query::QueryBuilder;
use crate::world::World;

/// A reactive handler bound to one watched component type and a match query over the rest of
/// the entity's components. Never run by the scheduler; only ever invoked by
/// [`ObserverRegistry`] dispatch, and always deferred past the mutating call that triggered
/// it.
pub trait Observer: Send + Sync {
    /// Stable registration id, used for `remove_observer` and duplicate detection.
    fn id(&self) -> &str;

    /// The single component type this observer reacts to. Callers build it from
    /// `ComponentKey::of::<C>()`.
    fn watch(&self) -> ComponentKey;

    /// The filter an entity must satisfy (in addition to carrying the watched component) for
    /// `on_component_added`/`on_component_changed` to fire. Defaults to "no filter": every
    /// entity that has the watched component matches.
    fn match_query(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    fn on_component_added(&self, _world: &World, _entity: &EntityId) {}

    /// Fires unconditionally once `watch()` matches the removed component's type -- no
    /// match-query check, since the entity has already lost the component the query would
    /// need to re-test.
    fn on_component_removed(&self, _world: &World, _entity: &EntityId) {}

    fn on_component_changed(
        &self,
        _world: &World,
        _entity: &EntityId,
        _property: &'static str,
        _old: &(dyn Any + Send),
        _new: &(dyn Any + Send),
    ) {
    }

    /// Called once when this observer is replaced by a same-id registration or explicitly
    /// removed. On a duplicate-id registration the second registrant wins; the first is
    /// removed and its `on_destroy` runs.
    fn on_destroy(&self, _world: &World) {}
}

/// One of the kinds of component event the dispatcher fans out. Queued at the mutating call
/// site, drained at the next deferred-flush point.
pub enum ObserverEvent {
    Added {
        entity: EntityId,
        key: ComponentKey,
    },
    Removed {
        entity: EntityId,
        key: ComponentKey,
    },
    Changed {
        entity: EntityId,
        key: ComponentKey,
        property: &'static str,
        old: Box<dyn Any + Send>,
        new: Box<dyn Any + Send>,
    },
}

/// Coarse-grained world events broadcast for introspection and tests. Distinct from
/// [`ObserverEvent`]: this is a flat log of everything the world did, not the filtered,
/// per-type observer fan-out.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    EntityAdded(EntityId),
    EntityEnabled(EntityId),
    EntityRemoved(EntityId),
    EntityDisabled(EntityId),
    SystemAdded(SmolStr),
    SystemRemoved(SmolStr),
    ComponentAdded(EntityId, ComponentKey),
    ComponentRemoved(EntityId, ComponentKey),
    ComponentChanged(EntityId, ComponentKey, &'static str),
    RelationshipAdded,
    RelationshipRemoved,
    CacheInvalidated,
}

/// Registered observers in insertion order -- notifications are delivered in that same
/// registration order -- plus the dispatch algorithm that matches an event's component key
/// against each observer's `watch()` and, for added/changed, its match query.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: IndexMap<SmolStr, std::sync::Arc<dyn Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`. If `replace` is false and the id is already taken, returns
    /// `Err(DuplicateObserver)`; if `replace` is true, the previous holder of the id has its
    /// `on_destroy` run first.
    pub fn add(
        &mut self,
        observer: std::sync::Arc<dyn Observer>,
        replace: bool,
        world: &World,
    ) -> Result<(), crate::error::WorldError> {
        let id = SmolStr::new(observer.id());
        if let Some(existing) = self.observers.get(&id) {
            if !replace {
                return Err(crate::error::WorldError::DuplicateObserver(id.to_string()));
            }
            existing.on_destroy(world);
        }
        self.observers.insert(id, observer);
        Ok(())
    }

    pub fn remove(&mut self, id: &str, world: &World) -> bool {
        match self.observers.shift_remove(id) {
            Some(observer) => {
                observer.on_destroy(world);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.observers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn all_ids(&self) -> Vec<SmolStr> {
        self.observers.keys().cloned().collect()
    }

    /// Observers watching `key`, in registration order.
    pub(crate) fn watching(&self, key: ComponentKey) -> impl Iterator<Item = &std::sync::Arc<dyn Observer>> {
        self.observers.values().filter(move |o| o.watch() == key)
    }

    /// Every registered observer, in registration order. Used by the added-event dispatch,
    /// which must re-evaluate every observer whose watched component the entity already
    /// carries -- not only the one whose `watch()` happens to equal the component that was
    /// just added.
    pub(crate) fn all(&self) -> impl Iterator<Item = &std::sync::Arc<dyn Observer>> {
        self.observers.values()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&std::sync::Arc<dyn Observer>> {
        self.observers.get(id)
    }
}
