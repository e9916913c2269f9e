//! Query planner: consumes `{all, any, exclude, enabled_filter}`, picks the smallest seed set,
//! and caches results.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHashMap;

use crate::index::{ActiveIndex, ComponentIndex};
use crate::entity::EntityId;
use crate::key::ComponentKey;

const ALL_PRIME: u64 = 3;
const ANY_PRIME: u64 = 5;
const EXCLUDE_PRIME: u64 = 7;

fn hash_key(key: ComponentKey) -> u64 {
    let mut hasher = ahash::AHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Combine one role's keys so that membership within the role is commutative (order doesn't
/// matter) and duplicates are absorbed (deduped before combining, since XOR alone would let
/// an even number of repeats cancel out).
fn combine_role(keys: &[ComponentKey], prime: u64) -> u64 {
    let deduped: BTreeSet<u64> = keys.iter().map(|k| hash_key(*k)).collect();
    deduped.into_iter().fold(0u64, |acc, h| acc ^ h.wrapping_mul(prime))
}

/// Cache-key construction: three distinct small primes, one per list role, multiplicatively
/// combined with each role's member hashes and then XORed together so the three roles are
/// disjoint in the hash domain. Collisions are acceptable -- invalidation is a conservative
/// full flush, so a stale hit can never outlive a relevant mutation.
fn cache_key(all: &[ComponentKey], any: &[ComponentKey], exclude: &[ComponentKey], enabled_filter: Option<bool>) -> u64 {
    let mut key = combine_role(all, ALL_PRIME) ^ combine_role(any, ANY_PRIME) ^ combine_role(exclude, EXCLUDE_PRIME);
    key ^= match enabled_filter {
        None => 0,
        Some(true) => 0x9E37_79B9_7F4A_7C15,
        Some(false) => 0xC2B2_AE3D_27D4_EB4F,
    };
    key
}

/// Fluent query description. Built via [`QueryBuilder::new`] (or
/// [`crate::world::World::query`]) and consumed by [`QueryPlanner::run`].
#[derive(Clone, Default)]
pub struct QueryBuilder {
    all: Vec<ComponentKey>,
    any: Vec<ComponentKey>,
    exclude: Vec<ComponentKey>,
    enabled_filter: Option<bool>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_all(mut self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.all.extend(keys);
        self
    }

    pub fn with_any(mut self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.any.extend(keys);
        self
    }

    pub fn with_none(mut self, keys: impl IntoIterator<Item = ComponentKey>) -> Self {
        self.exclude.extend(keys);
        self
    }

    pub fn only_enabled(mut self) -> Self {
        self.enabled_filter = Some(true);
        self
    }

    pub fn only_disabled(mut self) -> Self {
        self.enabled_filter = Some(false);
        self
    }

    /// Reset this builder back to empty, ready to be handed back to a pool.
    pub fn reset(&mut self) {
        self.all.clear();
        self.any.clear();
        self.exclude.clear();
        self.enabled_filter = None;
    }
}

/// Snapshot of cache introspection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cached_queries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// The query planner: min-seed set-algebra engine plus a result cache.
#[derive(Default)]
pub struct QueryPlanner {
    cache: AHashMap<u64, Arc<[EntityId]>>,
    hits: u64,
    misses: u64,
}

impl QueryPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every cached query result. Called by the world on any mutation that could
    /// change set membership: component add/remove, enable/disable, relationship add/remove,
    /// entity add/remove.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cache_hits: self.hits,
            cache_misses: self.misses,
            cached_queries: self.cache.len(),
        }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Run a query against the given index, consulting and populating the cache.
    /// `all_entities` backs the "all three lists empty" shortcut: return the full entity
    /// list directly rather than consulting the index.
    pub fn run(&mut self, index: &ComponentIndex, all_entities: &[EntityId], query: &QueryBuilder) -> Arc<[EntityId]> {
        if query.all.is_empty() && query.any.is_empty() && query.exclude.is_empty() {
            // Full-world queries aren't cached -- there's only one such set, and it tracks
            // the entity list directly rather than any component index.
            return all_entities.to_vec().into();
        }

        let key = cache_key(&query.all, &query.any, &query.exclude, query.enabled_filter);
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return Arc::clone(cached);
        }

        let result = Self::evaluate(index, all_entities, query);
        self.misses += 1;
        let result: Arc<[EntityId]> = result.into();
        self.cache.insert(key, Arc::clone(&result));
        result
    }

    fn evaluate(index: &ComponentIndex, all_entities: &[EntityId], query: &QueryBuilder) -> Vec<EntityId> {
        let active = match query.enabled_filter {
            Some(true) => ActiveIndex::EnabledOnly,
            Some(false) => ActiveIndex::DisabledOnly,
            None => ActiveIndex::Union,
        };

        let mut result: Option<BTreeSet<EntityId>> = None;

        if !query.all.is_empty() {
            // A repeated key in `all` just intersects a set with itself, which is a no-op --
            // duplicates don't need to be filtered out before the min-seed selection below.
            let mut sets = Vec::with_capacity(query.all.len());
            for key in &query.all {
                match index.set_for(active, *key) {
                    Some(set) => sets.push(set),
                    None => return Vec::new(), // a required key has no members at all
                }
            }
            sets.sort_by_key(|s| s.len());
            let mut seed: BTreeSet<EntityId> = sets[0].iter().cloned().collect();
            for set in &sets[1..] {
                if seed.is_empty() {
                    break;
                }
                seed.retain(|e| set.contains(e));
            }
            result = Some(seed);
        }

        if !query.any.is_empty() {
            let mut union: BTreeSet<EntityId> = BTreeSet::new();
            for key in &query.any {
                if let Some(set) = index.set_for(active, *key) {
                    union.extend(set.iter().cloned());
                }
            }
            result = Some(match result {
                Some(all_result) => all_result.into_iter().filter(|e| union.contains(e)).collect(),
                None => union,
            });
        }

        if result.is_none() && !query.exclude.is_empty() {
            // Exclude-only query seeds from the full entity set.
            result = Some(all_entities.iter().cloned().collect());
        }

        let mut result = result.unwrap_or_default();
        for key in &query.exclude {
            if let Some(set) = index.set_for(active, *key) {
                result.retain(|e| !set.contains(e));
            }
        }

        result.into_iter().collect()
    }
}

/// Size-bounded free list for [`QueryBuilder`]s. Control-thread-only, like the rest of the
/// planner.
pub struct QueryBuilderPool {
    free: Vec<QueryBuilder>,
    limit: usize,
}

impl QueryBuilderPool {
    pub fn new(limit: usize) -> Self {
        Self {
            free: Vec::new(),
            limit,
        }
    }

    pub fn take(&mut self) -> QueryBuilder {
        self.free.pop().unwrap_or_default()
    }

    pub fn give_back(&mut self, mut builder: QueryBuilder) {
        if self.free.len() < self.limit {
            builder.reset();
            self.free.push(builder);
        }
    }
}
