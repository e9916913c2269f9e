//! Query planner: min-seed set algebra, caching, and the all/any/exclude combinations.

use weft::prelude::*;

#[derive(Debug, Clone, Copy)]
struct X;
impl Component for X {}

#[derive(Debug, Clone, Copy)]
struct Y;
impl Component for Y {}

#[test]
fn with_all_finds_the_intersection() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new().with(X));
    let b = world.add_entity(EntitySpec::new().with(X).with(Y));
    let _c = world.add_entity(EntitySpec::new().with(Y));

    let result = world.query().with_all([X::component_key(), Y::component_key()]).execute();
    assert_eq!(result.as_ref(), &[b.clone()]);

    world.remove_component::<Y>(&b);
    let result = world.query().with_all([X::component_key(), Y::component_key()]).execute();
    assert!(result.is_empty());

    // Entity that never had Y is unaffected.
    assert!(world.has_component(&a, X::component_key()));
}

#[test]
fn cache_stats_track_hits_and_misses() {
    let world = World::new();
    world.add_entity(EntitySpec::new().with(X));
    world.reset_cache_stats();

    let q = || world.query().with_all([X::component_key()]).execute();
    q(); // miss
    q(); // hit -- identical args, no intervening mutation

    let stats = world.get_cache_stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[test]
fn mutation_invalidates_the_cache() {
    let world = World::new();
    let e = world.add_entity(EntitySpec::new().with(X));
    world.reset_cache_stats();

    world.query().with_all([X::component_key()]).execute();
    world.add_component(&e, Y);
    world.query().with_all([X::component_key()]).execute();

    // Both calls should have missed: the add_component invalidated the cache in between.
    assert_eq!(world.get_cache_stats().cache_misses, 2);
    assert_eq!(world.get_cache_stats().cache_hits, 0);
}

#[test]
fn empty_query_returns_every_entity() {
    let world = World::new();
    world.add_entity(EntitySpec::new());
    world.add_entity(EntitySpec::new().with(X));

    let result = world.query().execute();
    assert_eq!(result.len(), 2);
}

#[test]
fn with_any_unions_matching_sets() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new().with(X));
    let b = world.add_entity(EntitySpec::new().with(Y));
    world.add_entity(EntitySpec::new());

    let mut result: Vec<_> = world
        .query()
        .with_any([X::component_key(), Y::component_key()])
        .execute()
        .to_vec();
    result.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(result, expected);
}

#[test]
fn with_none_excludes_matching_entities() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new());
    world.add_entity(EntitySpec::new().with(X));

    let result = world.query().with_none([X::component_key()]).execute();
    assert_eq!(result.as_ref(), &[a]);
}

#[test]
fn enabled_filter_restricts_to_the_active_index() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new().with(X));
    let b = world.add_entity(EntitySpec::new().with(X));
    world.disable_entity(&b);

    let enabled = world.query().with_all([X::component_key()]).only_enabled().execute();
    assert_eq!(enabled.as_ref(), &[a]);

    let disabled = world.query().with_all([X::component_key()]).only_disabled().execute();
    assert_eq!(disabled.as_ref(), &[b]);
}

#[test]
fn duplicate_components_in_a_list_are_absorbed() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new().with(X));

    let result = world
        .query()
        .with_all([X::component_key(), X::component_key()])
        .execute();
    assert_eq!(result.as_ref(), &[a]);
}

#[test]
fn min_seed_equals_naive_intersection() {
    // Build a world where the smallest `all` set isn't listed first, and confirm the
    // planner's result still matches what a naive full intersection would produce.
    let world = World::new();
    let small = world.add_entity(EntitySpec::new().with(X).with(Y));
    for _ in 0..20 {
        world.add_entity(EntitySpec::new().with(X));
    }

    let result = world.query().with_all([X::component_key(), Y::component_key()]).execute();
    assert_eq!(result.as_ref(), &[small]);
}

#[test]
fn purge_keeps_only_the_requested_entities() {
    let world = World::new();
    let keep = world.add_entity(EntitySpec::new().with(X));
    world.add_entity(EntitySpec::new().with(X));
    world.add_entity(EntitySpec::new().with(Y));

    world.purge(&[keep.clone()]);

    let all = world.query().execute();
    assert_eq!(all.as_ref(), &[keep.clone()]);
    assert!(world.has_component(&keep, X::component_key()));
}
