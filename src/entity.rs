//! Entities: identity plus a bag of components and relationships.
//!
//! Component storage is an `IndexMap` of `RwLock<Box<dyn Component>>`, iterated in insertion
//! order, keyed by a stable string id rather than a generational-arena handle. Each entity's
//! data lives behind its own locks inside an `Arc`-shared cell (rather than directly in the
//! world's entity map) so a lookup can clone the `Arc` and release the outer map lock
//! immediately: the cell's address never moves even if the map resizes underneath it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::component::{Component, ComponentSlot};
use crate::host::Parentage;
use crate::key::ComponentKey;
use crate::relationship::Relationship;
use crate::world::World;

/// A lifecycle callback an [`EntitySpec`] can stage: `initialize` runs once at creation,
/// `on_destroy` once at removal, `on_disable` every time the entity is disabled. Modeled as
/// plain callbacks rather than methods on a polymorphic entity trait object, since this
/// crate's entities are pure data bags -- behavior lives in systems and observers, per the
/// component design, and a staged hook is the narrow exception for lifecycle plumbing.
pub type EntityHook = Arc<dyn Fn(&World, &EntityId) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct EntityHooks {
    pub(crate) on_initialize: Option<EntityHook>,
    pub(crate) on_destroy: Option<EntityHook>,
    pub(crate) on_disable: Option<EntityHook>,
}

/// Stable string identifier for an entity. Cheaply cloned and compared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) SmolStr);

impl EntityId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id.as_ref()))
    }

    /// Mint a fresh id, used by `add_entity` when the caller left `entity.id` empty.
    pub fn generate() -> Self {
        Self(SmolStr::new(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// The live, world-owned record for an entity: its components, relationships, and enabled
/// flag, each behind its own lock so the world's methods can stay `&self` -- per-cell locking
/// rather than one big world lock.
pub(crate) struct EntityCell {
    id: EntityId,
    components: RwLock<IndexMap<ComponentKey, ComponentSlot>>,
    relationships: RwLock<Vec<Relationship>>,
    enabled: AtomicBool,
    parented: AtomicBool,
    hooks: EntityHooks,
}

impl EntityCell {
    pub(crate) fn new(
        id: EntityId,
        enabled: bool,
        components: IndexMap<ComponentKey, ComponentSlot>,
        hooks: EntityHooks,
    ) -> Self {
        Self {
            id,
            components: RwLock::new(components),
            relationships: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(enabled),
            parented: AtomicBool::new(false),
            hooks,
        }
    }

    pub(crate) fn id(&self) -> &EntityId {
        &self.id
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether `add_entity` has already attached this entity under the host's default
    /// parent. Checked so a second `enable_entity`/re-add pass doesn't re-parent it.
    pub(crate) fn parentage(&self) -> Parentage {
        if self.parented.load(Ordering::Acquire) {
            Parentage::Parented
        } else {
            Parentage::Unparented
        }
    }

    pub(crate) fn mark_parented(&self) {
        self.parented.store(true, Ordering::Release);
    }

    pub(crate) fn hooks(&self) -> &EntityHooks {
        &self.hooks
    }

    pub(crate) fn components(&self) -> &RwLock<IndexMap<ComponentKey, ComponentSlot>> {
        &self.components
    }

    pub(crate) fn relationships(&self) -> &RwLock<Vec<Relationship>> {
        &self.relationships
    }

    pub(crate) fn has_component(&self, key: ComponentKey) -> bool {
        self.components.read().unwrap().contains_key(&key)
    }

    pub(crate) fn component_keys(&self) -> Vec<ComponentKey> {
        self.components.read().unwrap().keys().copied().collect()
    }
}

/// Staged entity data built by the host before handing it to
/// [`World::add_entity`](crate::world::World::add_entity).
#[must_use = "call `World::add_entity` to actually create the entity"]
pub struct EntitySpec {
    pub(crate) id: Option<EntityId>,
    pub(crate) enabled: bool,
    pub(crate) add_to_tree: bool,
    pub(crate) components: Vec<(ComponentKey, RwLock<Box<dyn Component>>)>,
    pub(crate) on_initialize: Option<EntityHook>,
    pub(crate) on_destroy: Option<EntityHook>,
    pub(crate) on_disable: Option<EntityHook>,
}

impl EntitySpec {
    pub fn new() -> Self {
        Self {
            id: None,
            enabled: true,
            add_to_tree: true,
            components: Vec::new(),
            on_initialize: None,
            on_destroy: None,
            on_disable: None,
        }
    }

    /// Use a specific id instead of generating a fresh UUID on insertion.
    pub fn with_id(mut self, id: impl AsRef<str>) -> Self {
        self.id = Some(EntityId::new(id));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn without_tree(mut self) -> Self {
        self.add_to_tree = false;
        self
    }

    /// Attach a component. Same key overwrites -- an entity carries at most one component of
    /// a given type.
    pub fn with<C: Component>(mut self, component: C) -> Self {
        let key = C::component_key();
        self.components.retain(|(k, _)| *k != key);
        self.components.push((key, RwLock::new(Box::new(component))));
        self
    }

    /// Run once, right after the entity is inserted into the world, before any observer sees
    /// its components.
    pub fn on_initialize(mut self, f: impl Fn(&World, &EntityId) + Send + Sync + 'static) -> Self {
        self.on_initialize = Some(Arc::new(f));
        self
    }

    /// Run once, when the entity is removed, after postprocessors and before the component
    /// teardown events fire.
    pub fn on_destroy(mut self, f: impl Fn(&World, &EntityId) + Send + Sync + 'static) -> Self {
        self.on_destroy = Some(Arc::new(f));
        self
    }

    /// Run every time the entity transitions from enabled to disabled.
    pub fn on_disable(mut self, f: impl Fn(&World, &EntityId) + Send + Sync + 'static) -> Self {
        self.on_disable = Some(Arc::new(f));
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Option<EntityId>, bool, bool, IndexMap<ComponentKey, ComponentSlot>, EntityHooks) {
        let mut map = IndexMap::with_capacity(self.components.len());
        for (key, slot) in self.components {
            map.insert(key, slot);
        }
        let hooks = EntityHooks {
            on_initialize: self.on_initialize,
            on_destroy: self.on_destroy,
            on_disable: self.on_disable,
        };
        (self.id, self.enabled, self.add_to_tree, map, hooks)
    }
}

impl Default for EntitySpec {
    fn default() -> Self {
        Self::new()
    }
}
