//! Subsystem tuples and the parallel batcher.
//!
//! `worker_count` partitioning and the blocking scoped join are built on `crossbeam::scope`,
//! the same crate used for the deferred-call channel elsewhere -- reusing its other half
//! rather than pulling in a separate thread-pool dependency.

use crate::entity::EntityId;
use crate::query::QueryBuilder;
use crate::world::World;

enum SubsystemCallable {
    PerEntity(Box<dyn Fn(&World, &EntityId, f32) + Send + Sync>),
    Batch(Box<dyn Fn(&World, &[EntityId], f32) + Send + Sync>),
}

/// One `(query_builder, callable, all_at_once?)` tuple. A system with a non-empty
/// `subsystems()` list runs each tuple's own query independently, in declaration order,
/// instead of the system's shared single query.
pub struct Subsystem {
    query: QueryBuilder,
    callable: SubsystemCallable,
}

impl Subsystem {
    /// A tuple whose callable runs once per matched entity.
    pub fn per_entity(query: QueryBuilder, f: impl Fn(&World, &EntityId, f32) + Send + Sync + 'static) -> Self {
        Self {
            query,
            callable: SubsystemCallable::PerEntity(Box::new(f)),
        }
    }

    /// A tuple whose callable runs once with the whole matched entity set (`all_at_once`).
    pub fn all_at_once(query: QueryBuilder, f: impl Fn(&World, &[EntityId], f32) + Send + Sync + 'static) -> Self {
        Self {
            query,
            callable: SubsystemCallable::Batch(Box::new(f)),
        }
    }

    pub(crate) fn run(&self, world: &World, delta: f32) {
        let entities = world.run_query(&self.query);
        match &self.callable {
            SubsystemCallable::Batch(f) => f(world, &entities, delta),
            SubsystemCallable::PerEntity(f) => {
                for entity in entities.iter() {
                    f(world, entity, delta);
                }
            }
        }
    }
}

/// Partition `entities` into `worker_count` contiguous slices (worker count = available
/// parallelism, fallback 1) and run `f` for every entity across a scoped thread per slice,
/// blocking until all complete. `f` must not mutate the component index, add or remove
/// entities, or trigger observers -- those operations aren't safe to run concurrently.
pub(crate) fn run_parallel<F>(entities: &[EntityId], f: F)
where
    F: Fn(&EntityId) + Sync,
{
    let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).max(1);
    if worker_count <= 1 || entities.len() < worker_count {
        for entity in entities {
            f(entity);
        }
        return;
    }

    let chunk_size = entities.len().div_ceil(worker_count);
    crossbeam::scope(|scope| {
        for chunk in entities.chunks(chunk_size) {
            let f = &f;
            scope.spawn(move |_| {
                for entity in chunk {
                    f(entity);
                }
            });
        }
    })
    .expect("parallel batch worker panicked");
}
