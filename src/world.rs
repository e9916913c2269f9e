//! The `World`: owns every entity, the three component indices, the scheduler, and the
//! observer registry, and is the sole point from which mutation reaches the observer
//! dispatcher and cache invalidation.
//!
//! A cheap `Arc`-backed handle with `&self` methods throughout -- every method that mutates
//! takes `&self` and relies on the per-field locks, for a cooperative, single-control-thread
//! model with per-entity interior locking rather than one coarse world lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use ahash::AHashMap;
use indexmap::IndexSet;
use smol_str::SmolStr;

use crate::component::{Component, ComponentMut, ComponentRef};
use crate::config::{SerializationHint, WorldConfig};
use crate::entity::{EntityCell, EntityHook, EntityId, EntitySpec};
use crate::error::WorldResult;
use crate::host::{Host, NullHost, Parentage};
use crate::index::ComponentIndex;
use crate::key::{ComponentKey, RelationKey};
use crate::observer::{Observer, ObserverEvent, ObserverRegistry, WorldEvent};
use crate::query::{CacheStats, QueryBuilder, QueryBuilderPool, QueryPlanner};
use crate::relationship::{RelationTarget, Relationship, RelationshipIndex};
use crate::system::{System, SystemRegistry};

struct WorldShared {
    entities: RwLock<AHashMap<EntityId, Arc<EntityCell>>>,
    order: RwLock<IndexSet<EntityId, ahash::RandomState>>,
    index: RwLock<ComponentIndex>,
    relationships: RwLock<RelationshipIndex>,
    planner: Mutex<QueryPlanner>,
    builder_pool: Mutex<QueryBuilderPool>,
    systems: RwLock<SystemRegistry>,
    observers: RwLock<ObserverRegistry>,
    /// (observer id, entity) pairs that have already fired `on_component_added` for their
    /// current matched streak. Cleared per-pair whenever a removal makes that observer's
    /// match query false again, so a later re-match can fire once more.
    added_notified: Mutex<HashSet<(SmolStr, EntityId)>>,
    preprocessors: RwLock<Vec<Arc<dyn Fn(&World, &EntityId) + Send + Sync>>>,
    postprocessors: RwLock<Vec<Arc<dyn Fn(&World, &EntityId) + Send + Sync>>>,
    events_tx: crossbeam::channel::Sender<WorldEvent>,
    events_rx: crossbeam::channel::Receiver<WorldEvent>,
    host: Arc<dyn Host>,
    config: WorldConfig,
    paused: AtomicBool,
}

/// A cheap-to-clone handle onto the whole ECS world. Every method takes `&self`: cloning a
/// `World` and handing the clone into a deferred closure is how observer dispatch gets back
/// into the world without borrowing across a channel boundary.
pub struct World(Arc<WorldShared>);

impl Clone for World {
    fn clone(&self) -> Self {
        World(Arc::clone(&self.0))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_host_and_config(Arc::new(NullHost::new()), WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self::with_host_and_config(Arc::new(NullHost::new()), config)
    }

    pub fn with_host(host: Arc<dyn Host>) -> Self {
        Self::with_host_and_config(host, WorldConfig::default())
    }

    pub fn with_host_and_config(host: Arc<dyn Host>, config: WorldConfig) -> Self {
        let (events_tx, events_rx) = crossbeam::channel::bounded(1024);
        World(Arc::new(WorldShared {
            entities: RwLock::new(AHashMap::new()),
            order: RwLock::new(IndexSet::default()),
            index: RwLock::new(ComponentIndex::new()),
            relationships: RwLock::new(RelationshipIndex::new()),
            planner: Mutex::new(QueryPlanner::new()),
            builder_pool: Mutex::new(QueryBuilderPool::new(config.pool_size_limit)),
            systems: RwLock::new(SystemRegistry::new()),
            observers: RwLock::new(ObserverRegistry::new()),
            added_notified: Mutex::new(HashSet::new()),
            preprocessors: RwLock::new(Vec::new()),
            postprocessors: RwLock::new(Vec::new()),
            events_tx,
            events_rx,
            host,
            config,
            paused: AtomicBool::new(false),
        }))
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.0.host
    }

    pub fn config(&self) -> &WorldConfig {
        &self.0.config
    }

    /// Events a host or test can drain for introspection. Best-effort: a full channel drops
    /// the oldest-pending send rather than blocking a mutating call.
    pub fn events(&self) -> &crossbeam::channel::Receiver<WorldEvent> {
        &self.0.events_rx
    }

    fn emit(&self, event: WorldEvent) {
        let _ = self.0.events_tx.try_send(event);
    }

    fn cell(&self, id: &EntityId) -> Option<Arc<EntityCell>> {
        self.0.entities.read().unwrap().get(id).cloned()
    }

    fn invalidate_cache(&self) {
        self.0.planner.lock().unwrap().invalidate();
        self.emit(WorldEvent::CacheInvalidated);
    }

    fn defer_observer_event(&self, event: ObserverEvent) {
        let world = self.clone();
        self.0.host.defer(Box::new(move || world.dispatch_observer_event(event)));
    }

    fn entity_matches(&self, entity: &EntityId, query: &QueryBuilder) -> bool {
        self.run_query(query).iter().any(|e| e == entity)
    }

    fn dispatch_observer_event(&self, event: ObserverEvent) {
        match event {
            ObserverEvent::Added { entity, .. } => {
                // A component add can complete the match query of an observer whose watched
                // component is a *different* one than whatever was just added -- e.g. an
                // observer watching X with match_query [X, Y] must still fire when Y is
                // added and X was already present. So every observer that the entity now
                // carries the watched component for is re-evaluated here, not only the ones
                // keyed to the specific component that triggered this event.
                //
                // Collect out of the registry lock before invoking any handler, so a handler
                // that itself registers or removes an observer doesn't deadlock against the
                // read lock this dispatch would otherwise still be holding.
                let candidates: Vec<Arc<dyn Observer>> = self.0.observers.read().unwrap().all().cloned().collect();
                for observer in &candidates {
                    if !self.has_component(&entity, observer.watch()) {
                        continue;
                    }
                    if !self.entity_matches(&entity, &observer.match_query()) {
                        continue;
                    }
                    let notified_key = (SmolStr::new(observer.id()), entity.clone());
                    let first_match = self.0.added_notified.lock().unwrap().insert(notified_key);
                    if first_match {
                        observer.on_component_added(self, &entity);
                    }
                }
            }
            ObserverEvent::Removed { entity, key } => {
                let matching: Vec<Arc<dyn Observer>> = self.0.observers.read().unwrap().watching(key).cloned().collect();
                for observer in &matching {
                    observer.on_component_removed(self, &entity);
                }
                // The removal may have made some observer's match query false again (whether
                // or not that observer watches the removed key), so its "already notified"
                // flag must be cleared to let a future re-match fire `on_component_added`
                // again instead of staying permanently suppressed.
                let observers = self.0.observers.read().unwrap();
                self.0.added_notified.lock().unwrap().retain(|(id, e)| {
                    if e != &entity {
                        return true;
                    }
                    observers
                        .get(id.as_str())
                        .is_some_and(|observer| self.entity_matches(&entity, &observer.match_query()))
                });
            }
            ObserverEvent::Changed { entity, key, property, old, new } => {
                let matching: Vec<Arc<dyn Observer>> = self.0.observers.read().unwrap().watching(key).cloned().collect();
                for observer in &matching {
                    if self.entity_matches(&entity, &observer.match_query()) {
                        observer.on_component_changed(self, &entity, property, &*old, &*new);
                    }
                }
            }
        }
    }

    pub(crate) fn queue_component_changed(
        &self,
        entity: EntityId,
        key: ComponentKey,
        property: &'static str,
        old: Box<dyn std::any::Any + Send>,
        new: Box<dyn std::any::Any + Send>,
    ) {
        self.emit(WorldEvent::ComponentChanged(entity.clone(), key, property));
        self.defer_observer_event(ObserverEvent::Changed { entity, key, property, old, new });
    }

    // ---- Entity store ----

    /// Insert `spec`'s staged components into `id`'s live cell and index them, firing
    /// `component_added` for each: insert into the union index and the enabled or disabled
    /// index per the current flag, the same path used both for entity creation and for a
    /// later `add_component` call.
    pub fn add_entity(&self, spec: EntitySpec) -> EntityId {
        let (explicit_id, enabled, add_to_tree, components, hooks) = spec.into_parts();
        let id = explicit_id.unwrap_or_else(EntityId::generate);

        // If the id already exists, the prior instance is removed first.
        if self.has_entity_with_id(&id) {
            self.remove_entity(&id);
        }

        let keys: Vec<ComponentKey> = components.keys().copied().collect();
        log::trace!("adding entity {id} with {} component(s)", keys.len());
        let cell = Arc::new(EntityCell::new(id.clone(), enabled, components, hooks));
        if add_to_tree && cell.parentage() == Parentage::Unparented {
            let _ = self.0.host.default_parent();
            cell.mark_parented();
        }
        self.0.entities.write().unwrap().insert(id.clone(), cell.clone());
        self.0.order.write().unwrap().insert(id.clone());
        {
            let mut index = self.0.index.write().unwrap();
            for key in &keys {
                index.add_entity(&id, *key, enabled);
            }
        }
        self.invalidate_cache();
        self.emit(WorldEvent::EntityAdded(id.clone()));
        for key in &keys {
            log::trace!("added component {key} to entity {id}");
            self.emit(WorldEvent::ComponentAdded(id.clone(), *key));
            self.defer_observer_event(ObserverEvent::Added { entity: id.clone(), key: *key });
        }
        if let Some(on_initialize) = cell.hooks().on_initialize.clone() {
            on_initialize(self, &id);
        }
        let preprocessors = self.0.preprocessors.read().unwrap().clone();
        for preprocessor in &preprocessors {
            preprocessor(self, &id);
        }
        id
    }

    pub fn add_entities(&self, specs: Vec<EntitySpec>) -> Vec<EntityId> {
        specs.into_iter().map(|spec| self.add_entity(spec)).collect()
    }

    /// Erase from every index, drop relationships sourced from this entity, and remove the
    /// live cell. Idempotent: removing an unknown id is a no-op.
    pub fn remove_entity(&self, id: &EntityId) -> bool {
        if !self.has_entity_with_id(id) {
            return false;
        }
        let postprocessors = self.0.postprocessors.read().unwrap().clone();
        for postprocessor in &postprocessors {
            postprocessor(self, id);
        }
        self.emit(WorldEvent::EntityRemoved(id.clone()));
        let cell = match self.0.entities.write().unwrap().remove(id) {
            Some(cell) => cell,
            None => return false,
        };
        self.0.order.write().unwrap().shift_remove(id);
        let keys = cell.component_keys();
        self.0.index.write().unwrap().remove_entity_everywhere(id, keys.iter().copied());
        self.0.relationships.write().unwrap().remove_all_from(id);
        if let Some(on_destroy) = cell.hooks().on_destroy.clone() {
            on_destroy(self, id);
        }
        log::trace!("removed entity {id}");
        for key in keys {
            self.emit(WorldEvent::ComponentRemoved(id.clone(), key));
            self.defer_observer_event(ObserverEvent::Removed { entity: id.clone(), key });
        }
        self.invalidate_cache();
        true
    }

    pub fn remove_entities(&self, ids: &[EntityId]) {
        for id in ids {
            self.remove_entity(id);
        }
    }

    /// Move every component this entity carries from the enabled to the disabled index.
    pub fn disable_entity(&self, id: &EntityId) -> bool {
        let cell = match self.cell(id) {
            Some(cell) => cell,
            None => return false,
        };
        if !cell.enabled() {
            return true;
        }
        cell.set_enabled(false);
        let keys = cell.component_keys();
        self.0.index.write().unwrap().move_to_disabled(id, keys.into_iter());
        if let Some(on_disable) = cell.hooks().on_disable.clone() {
            on_disable(self, id);
        }
        self.invalidate_cache();
        self.emit(WorldEvent::EntityDisabled(id.clone()));
        true
    }

    pub fn disable_entities(&self, ids: &[EntityId]) {
        for id in ids {
            self.disable_entity(id);
        }
    }

    pub fn enable_entity(&self, id: &EntityId) -> bool {
        self.enable_entity_with(id, Vec::new())
    }

    /// `enable_entity`, plus support for adding components in the same call.
    pub fn enable_entity_with(&self, id: &EntityId, extra_components: Vec<Box<dyn Component>>) -> bool {
        let cell = match self.cell(id) {
            Some(cell) => cell,
            None => return false,
        };
        cell.set_enabled(true);
        let keys = cell.component_keys();
        self.0.index.write().unwrap().move_to_enabled(id, keys.into_iter());
        for boxed in extra_components {
            let key = crate::component::key_of(boxed.as_ref());
            self.insert_component_boxed(id, key, boxed);
        }
        self.invalidate_cache();
        self.emit(WorldEvent::EntityEnabled(id.clone()));
        true
    }

    pub fn enable_entities(&self, ids: &[EntityId]) {
        for id in ids {
            self.enable_entity(id);
        }
    }

    pub fn has_entity_with_id(&self, id: &EntityId) -> bool {
        self.0.entities.read().unwrap().contains_key(id)
    }

    pub fn get_entity_by_id(&self, id: &EntityId) -> Option<EntityId> {
        self.cell(id).map(|cell| cell.id().clone())
    }

    pub fn entity_enabled(&self, id: &EntityId) -> Option<bool> {
        self.cell(id).map(|cell| cell.enabled())
    }

    pub fn entity_component_keys(&self, id: &EntityId) -> Option<Vec<ComponentKey>> {
        self.cell(id).map(|cell| cell.component_keys())
    }

    pub fn has_component(&self, id: &EntityId, key: ComponentKey) -> bool {
        self.cell(id).is_some_and(|cell| cell.has_component(key))
    }

    pub fn entity_parentage(&self, id: &EntityId) -> Option<Parentage> {
        self.cell(id).map(|cell| cell.parentage())
    }

    /// Register a callback `add_entity` runs for every new entity, after `on_initialize` and
    /// in registration order.
    pub fn add_preprocessor(&self, f: impl Fn(&World, &EntityId) + Send + Sync + 'static) {
        self.0.preprocessors.write().unwrap().push(Arc::new(f) as EntityHook);
    }

    /// Register a callback `remove_entity` runs for every removed entity, before `on_destroy`
    /// and in registration order.
    pub fn add_postprocessor(&self, f: impl Fn(&World, &EntityId) + Send + Sync + 'static) {
        self.0.postprocessors.write().unwrap().push(Arc::new(f) as EntityHook);
    }

    pub fn serialization_hint(&self) -> Option<SerializationHint> {
        self.0.config.serialization
    }

    /// Remove every entity not in `keep`, clear the relationship indices, and remove every
    /// system and observer. There's no scene node for this crate's `Host` abstraction to
    /// free, so `purge` always fully resets everything but `keep`'s entities.
    pub fn purge(&self, keep: &[EntityId]) {
        let keep_set: HashSet<&EntityId> = keep.iter().collect();
        let all_ids: Vec<EntityId> = self.0.order.read().unwrap().iter().cloned().collect();
        for id in all_ids {
            if !keep_set.contains(&id) {
                self.remove_entity(&id);
            }
        }
        self.0.relationships.write().unwrap().clear();
        for group in self.0.systems.read().unwrap().group_names() {
            let _ = self.remove_system_group(&group);
        }
        for observer_id in self.0.observers.read().unwrap().all_ids() {
            self.remove_observer(&observer_id);
        }
        self.invalidate_cache();
    }

    // ---- Components ----

    pub fn add_component<C: Component>(&self, id: &EntityId, component: C) -> bool {
        self.insert_component_boxed(id, C::component_key(), Box::new(component))
    }

    fn insert_component_boxed(&self, id: &EntityId, key: ComponentKey, boxed: Box<dyn Component>) -> bool {
        let cell = match self.cell(id) {
            Some(cell) => cell,
            None => return false,
        };
        let enabled = cell.enabled();
        cell.components().write().unwrap().insert(key, std::sync::RwLock::new(boxed));
        self.0.index.write().unwrap().add_entity(id, key, enabled);
        self.invalidate_cache();
        self.emit(WorldEvent::ComponentAdded(id.clone(), key));
        self.defer_observer_event(ObserverEvent::Added { entity: id.clone(), key });
        true
    }

    pub fn remove_component<C: Component>(&self, id: &EntityId) -> bool {
        self.remove_component_key(id, C::component_key())
    }

    pub fn remove_component_key(&self, id: &EntityId, key: ComponentKey) -> bool {
        let cell = match self.cell(id) {
            Some(cell) => cell,
            None => return false,
        };
        if cell.components().write().unwrap().shift_remove(&key).is_none() {
            return false;
        }
        self.0.index.write().unwrap().remove_entity(id, key);
        self.invalidate_cache();
        self.emit(WorldEvent::ComponentRemoved(id.clone(), key));
        self.defer_observer_event(ObserverEvent::Removed { entity: id.clone(), key });
        true
    }

    pub fn with_component<C: Component, R>(&self, id: &EntityId, f: impl FnOnce(&C) -> R) -> Option<R> {
        let cell = self.cell(id)?;
        let components = cell.components().read().unwrap();
        let slot = components.get(&C::component_key())?;
        let guard = slot.read().unwrap();
        let component_ref: ComponentRef<'_, C> = ComponentRef::new(guard);
        Some(f(&component_ref))
    }

    pub fn with_component_mut<C: Component, R>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&mut ComponentMut<'_, C>) -> R,
    ) -> Option<R> {
        let cell = self.cell(id)?;
        let components = cell.components().read().unwrap();
        let slot = components.get(&C::component_key())?;
        let guard = slot.write().unwrap();
        let sink = ChangeSink(self.clone());
        let mut component_mut = ComponentMut::new(guard, id.clone(), C::component_key(), &sink);
        Some(f(&mut component_mut))
    }

    // ---- Relationships ----

    pub fn add_relationship(&self, source: EntityId, relation: RelationKey, target: RelationTarget) {
        let target_is_live = matches!(&target, RelationTarget::Entity(e) if self.has_entity_with_id(e));
        self.0.relationships.write().unwrap().add(Relationship::new(source, relation, target), target_is_live);
        self.invalidate_cache();
        self.emit(WorldEvent::RelationshipAdded);
    }

    pub fn remove_relationship(&self, source: &EntityId, relation: RelationKey, target: &RelationTarget) {
        self.0.relationships.write().unwrap().remove(source, relation, target);
        self.invalidate_cache();
        self.emit(WorldEvent::RelationshipRemoved);
    }

    pub fn relationships_from(&self, relation: RelationKey) -> Vec<Relationship> {
        self.0.relationships.read().unwrap().forward_entities(relation).to_vec()
    }

    pub fn relationships_to(&self, relation: RelationKey) -> Vec<Relationship> {
        self.0.relationships.read().unwrap().reverse_targets(relation).to_vec()
    }

    // ---- Queries ----

    pub fn run_query(&self, query: &QueryBuilder) -> std::sync::Arc<[EntityId]> {
        let index = self.0.index.read().unwrap();
        let all_entities: Vec<EntityId> = self.0.order.read().unwrap().iter().cloned().collect();
        self.0.planner.lock().unwrap().run(&index, &all_entities, query)
    }

    pub fn query(&self) -> Query<'_> {
        Query {
            world: self,
            builder: self.0.builder_pool.lock().unwrap().take(),
        }
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.0.planner.lock().unwrap().stats()
    }

    pub fn reset_cache_stats(&self) {
        self.0.planner.lock().unwrap().reset_stats();
    }

    // ---- Systems & scheduler ----

    pub fn add_system(&self, system: Arc<dyn System>, replace: bool, topo_sort: bool) -> WorldResult<()> {
        let id = SmolStr::new(system.id());
        self.0.systems.write().unwrap().add_system(system, replace, topo_sort, self)?;
        self.emit(WorldEvent::SystemAdded(id));
        Ok(())
    }

    pub fn remove_system(&self, group: &str, id: &str) -> bool {
        let removed = self.0.systems.write().unwrap().remove_system(group, id, self);
        if removed {
            self.emit(WorldEvent::SystemRemoved(SmolStr::new(id)));
        }
        removed
    }

    pub fn remove_system_group(&self, group: &str) -> WorldResult<()> {
        self.0.systems.write().unwrap().remove_system_group(group, self)
    }

    pub fn set_paused(&self, paused: bool) {
        self.0.paused.store(paused, Ordering::Relaxed);
        self.0.systems.read().unwrap().update_pause_state(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.load(Ordering::Relaxed)
    }

    /// Per-tick entry point. Flushes deferred observer handlers from the previous tick
    /// first, then dispatches `group`'s ordered systems.
    pub fn process(&self, delta: f32, group: &str) {
        self.flush_deferred();
        self.0.systems.read().unwrap().process(self, group, delta);
    }

    /// Run every deferred observer handler queued so far without advancing a tick -- for
    /// hosts and tests that don't drive a `process` loop.
    pub fn flush_deferred(&self) {
        self.0.host.flush_deferred();
    }

    // ---- Observers ----

    pub fn add_observer(&self, observer: Arc<dyn Observer>, replace: bool) -> WorldResult<()> {
        self.0.observers.write().unwrap().add(observer, replace, self)
    }

    pub fn remove_observer(&self, id: &str) -> bool {
        self.0.observers.write().unwrap().remove(id, self)
    }
}

/// Fluent fetch of a [`QueryBuilder`] bound to the `World` it will run against.
pub struct Query<'w> {
    world: &'w World,
    builder: QueryBuilder,
}

impl<'w> Query<'w> {
    pub fn with_all(mut self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.builder = self.builder.with_all(keys);
        self
    }

    pub fn with_any(mut self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.builder = self.builder.with_any(keys);
        self
    }

    pub fn with_none(mut self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.builder = self.builder.with_none(keys);
        self
    }

    pub fn only_enabled(mut self) -> Self {
        self.builder = self.builder.only_enabled();
        self
    }

    pub fn only_disabled(mut self) -> Self {
        self.builder = self.builder.only_disabled();
        self
    }

    pub fn execute(self) -> std::sync::Arc<[EntityId]> {
        let result = self.world.run_query(&self.builder);
        self.world.0.builder_pool.lock().unwrap().give_back(self.builder);
        result
    }
}

/// The forwarding half of [`ComponentMut::notify_change`]: captures a cloned `World` handle so
/// a write guard can queue a `component_changed` dispatch without borrowing the world it came
/// from. Property-changed notification is opt-in at the call site -- nothing fires unless the
/// caller explicitly invokes it.
pub(crate) struct ChangeSink(World);

impl ChangeSink {
    pub(crate) fn notify_changed(
        &self,
        entity: EntityId,
        key: ComponentKey,
        property: &'static str,
        old: Box<dyn std::any::Any + Send>,
        new: Box<dyn std::any::Any + Send>,
    ) {
        self.0.queue_component_changed(entity, key, property, old, new);
    }
}
