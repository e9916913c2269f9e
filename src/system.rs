//! System registry & scheduler: groups, topological ordering by declared before/after
//! dependencies, per-tick dispatch.
//!
//! Uses `indexmap` for the ordered-list-per-group, the same crate used elsewhere for
//! insertion-ordered component storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::entity::EntityId;
use crate::error::{WorldError, WorldResult};
use crate::query::QueryBuilder;
use crate::subsystem::Subsystem;
use crate::world::World;

/// A unit of per-tick behavior. `process`/`process_all` act over the entity set produced by
/// `query()`, unless `subsystems()` returns a non-empty list, in which case each subsystem
/// tuple drives its own query independently.
pub trait System: Send + Sync {
    fn id(&self) -> &str;

    fn group(&self) -> &str {
        ""
    }

    fn active(&self) -> bool {
        true
    }

    fn process_empty(&self) -> bool {
        false
    }

    fn parallel_processing(&self) -> bool {
        false
    }

    fn parallel_threshold(&self) -> usize {
        50
    }

    /// Systems that must already have run this tick before this one is dispatched.
    fn after(&self) -> Vec<SmolStr> {
        Vec::new()
    }

    /// Systems that must not run until after this one.
    fn before(&self) -> Vec<SmolStr> {
        Vec::new()
    }

    /// The shared query this system's single-query path dispatches over. Ignored if
    /// `subsystems()` is non-empty. Lazily bound and cached by the registry.
    fn query(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    /// `(query, callable, all_at_once?)` tuples. An empty list (the default) means
    /// "single-query path"; the registry calls this once and, if empty, never calls it again
    /// for this system.
    fn subsystems(&self) -> Vec<Subsystem> {
        Vec::new()
    }

    /// Invoked once, the first time this system is dispatched.
    fn setup(&self, _world: &World) {}

    /// Single-query path, one entity at a time (or `None` when `process_empty` fired on an
    /// empty set). Default does nothing -- concrete systems override this or use subsystems.
    fn process(&self, _world: &World, _entity: Option<&EntityId>, _delta: f32) {}

    /// Single-query path, batch entry point. The default handles the empty case (calling
    /// `process(None, delta)` once if `process_empty` is set), then decides sequential vs.
    /// parallel dispatch and falls back to `process` per entity.
    fn process_all(&self, world: &World, entities: &[EntityId], delta: f32) {
        if entities.is_empty() {
            if self.process_empty() {
                self.process(world, None, delta);
            }
            return;
        }
        if self.parallel_processing() && entities.len() >= self.parallel_threshold() {
            crate::subsystem::run_parallel(entities, |entity| self.process(world, Some(entity), delta));
        } else {
            for entity in entities {
                self.process(world, Some(entity), delta);
            }
        }
    }

    fn on_destroy(&self, _world: &World) {}
}

/// Runtime bookkeeping the registry keeps alongside a registered system: its independently
/// settable paused flag and lazily-memoized query/subsystem results.
struct SystemEntry {
    system: std::sync::Arc<dyn System>,
    paused: AtomicBool,
    setup_done: AtomicBool,
    query_cache: OnceLock<QueryBuilder>,
    subsystems_cache: OnceLock<Vec<Subsystem>>,
}

impl SystemEntry {
    fn new(system: std::sync::Arc<dyn System>) -> Self {
        Self {
            system,
            paused: AtomicBool::new(false),
            setup_done: AtomicBool::new(false),
            query_cache: OnceLock::new(),
            subsystems_cache: OnceLock::new(),
        }
    }

    fn query(&self) -> &QueryBuilder {
        self.query_cache.get_or_init(|| self.system.query())
    }

    fn subsystems(&self) -> &[Subsystem] {
        self.subsystems_cache.get_or_init(|| self.system.subsystems())
    }

    fn can_process(&self, globally_paused: bool) -> bool {
        self.system.active() && !globally_paused
    }
}

/// `group → ordered-list<system>` scheduler.
#[derive(Default)]
pub struct SystemRegistry {
    groups: IndexMap<SmolStr, Vec<SystemEntry>>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_names(&self) -> Vec<SmolStr> {
        self.groups.keys().cloned().collect()
    }

    /// Append `system` to its declared group. If `replace` and an entry with the same id
    /// already exists in that group, it is torn down (`on_destroy`) and replaced in place;
    /// otherwise a duplicate id is an error. If `topo_sort`, the whole group is re-sorted by
    /// `Before`/`After` afterward.
    pub fn add_system(
        &mut self,
        system: std::sync::Arc<dyn System>,
        replace: bool,
        topo_sort: bool,
        world: &World,
    ) -> WorldResult<()> {
        let group_name = SmolStr::new(system.group());
        let id = system.id().to_string();
        let group = self.groups.entry(group_name.clone()).or_default();

        if let Some(pos) = group.iter().position(|e| e.system.id() == id) {
            if !replace {
                return Err(WorldError::DuplicateSystem(id));
            }
            log::warn!("replacing system {id:?} in group {group_name:?}");
            group[pos].system.on_destroy(world);
            group[pos] = SystemEntry::new(system);
        } else {
            group.push(SystemEntry::new(system));
        }

        if topo_sort {
            Self::sort_group(&group_name, group)?;
        }
        Ok(())
    }

    pub fn remove_system(&mut self, group: &str, id: &str, world: &World) -> bool {
        if let Some(entries) = self.groups.get_mut(group) {
            if let Some(pos) = entries.iter().position(|e| e.system.id() == id) {
                entries.remove(pos).system.on_destroy(world);
                if entries.is_empty() {
                    self.groups.shift_remove(group);
                }
                return true;
            }
        }
        false
    }

    /// Remove every system in `group`. Iterates a snapshot of ids first, then calls
    /// `remove_system` per id -- the group vector is mutated by each call, so iterating it
    /// directly while removing would skip entries.
    pub fn remove_system_group(&mut self, group: &str, world: &World) -> WorldResult<()> {
        let ids: Vec<String> = match self.groups.get(group) {
            Some(entries) => entries.iter().map(|e| e.system.id().to_string()).collect(),
            None => return Err(WorldError::UnknownGroup(group.to_string())),
        };
        for id in ids {
            self.remove_system(group, &id, world);
        }
        Ok(())
    }

    /// Set every system's paused flag from its own `can_process`.
    pub fn update_pause_state(&self, globally_paused: bool) {
        for entries in self.groups.values() {
            for entry in entries {
                entry.paused.store(!entry.can_process(globally_paused), Ordering::Relaxed);
            }
        }
    }

    /// Run one tick over `group`'s systems in scheduled order.
    pub fn process(&self, world: &World, group: &str, delta: f32) {
        let Some(entries) = self.groups.get(group) else {
            return;
        };
        for entry in entries {
            if !entry.system.active() || entry.paused.load(Ordering::Relaxed) {
                continue;
            }
            if !entry.setup_done.swap(true, Ordering::Relaxed) {
                entry.system.setup(world);
            }

            let subsystems = entry.subsystems();
            if !subsystems.is_empty() {
                for subsystem in subsystems {
                    subsystem.run(world, delta);
                }
                continue;
            }

            let query = entry.query();
            let entities = world.run_query(query);
            if entities.is_empty() && !entry.system.process_empty() {
                continue;
            }
            entry.system.process_all(world, &entities, delta);
        }
    }

    /// Kahn's-algorithm topological sort of one group by declared `Before`/`After`. Ties
    /// broken by original (insertion) position.
    fn sort_group(group_name: &str, entries: &mut Vec<SystemEntry>) -> WorldResult<()> {
        let n = entries.len();
        let id_of = |i: usize| entries[i].system.id().to_string();
        let index_of = |id: &str| entries.iter().position(|e| e.system.id() == id);

        // edge u -> v means u must run before v.
        let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree: Vec<usize> = vec![0; n];

        for (i, entry) in entries.iter().enumerate() {
            for before in entry.system.before() {
                if let Some(j) = index_of(&before) {
                    out_edges[i].push(j);
                    in_degree[j] += 1;
                } else {
                    return Err(WorldError::UnknownDependency {
                        system: id_of(i),
                        dependency: before.to_string(),
                    });
                }
            }
            for after in entry.system.after() {
                if let Some(j) = index_of(&after) {
                    out_edges[j].push(i);
                    in_degree[i] += 1;
                } else {
                    return Err(WorldError::UnknownDependency {
                        system: id_of(i),
                        dependency: after.to_string(),
                    });
                }
            }
        }

        let mut ready: std::collections::VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &j in &out_edges[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.push_back(j);
                }
            }
        }

        if order.len() != n {
            let cycle: Vec<String> = (0..n).filter(|i| !order.contains(i)).map(id_of).collect();
            return Err(WorldError::DependencyCycle {
                group: group_name.to_string(),
                cycle,
            });
        }

        log::debug!("sorted group {group_name:?}: {:?}", order.iter().map(|&i| id_of(i)).collect::<Vec<_>>());

        let mut sorted = Vec::with_capacity(n);
        let mut taken: Vec<Option<SystemEntry>> = entries.drain(..).map(Some).collect();
        for i in order {
            sorted.push(taken[i].take().expect("topo order visits each index once"));
        }
        *entries = sorted;
        Ok(())
    }
}
