//! Entity store: id assignment/collision, enable/disable round-trip, and the component
//! index's three-map invariant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Health(u32);
impl Component for Health {}

#[test]
fn missing_id_gets_a_fresh_uuid() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new());
    let b = world.add_entity(EntitySpec::new());
    assert_ne!(a, b);
    assert!(world.has_entity_with_id(&a));
}

#[test]
fn id_collision_replaces_the_prior_holder() {
    let world = World::new();
    let first = world.add_entity(EntitySpec::new().with_id("hero").with(Health(10)));
    assert!(world.has_entity_with_id(&first));

    let second = world.add_entity(EntitySpec::new().with_id("hero").with(Health(99)));
    assert_eq!(first, second);
    assert!(world.has_entity_with_id(&second));

    let got = world.with_component::<Health, _>(&second, |h| h.0).unwrap();
    assert_eq!(got, 99, "the second registrant's data wins");
}

#[test]
fn remove_entity_is_idempotent() {
    let world = World::new();
    let e = world.add_entity(EntitySpec::new());
    assert!(world.remove_entity(&e));
    assert!(!world.remove_entity(&e), "removing an unknown id is a no-op, not an error");
    assert!(!world.has_entity_with_id(&e));
}

#[test]
fn disable_then_enable_round_trips() {
    let world = World::new();
    let e = world.add_entity(EntitySpec::new().with(Health(10)));

    assert!(world.entity_enabled(&e).unwrap());
    let before_enabled = world.query().with_all([Health::component_key()]).only_enabled().execute();
    assert_eq!(before_enabled.len(), 1);

    world.disable_entity(&e);
    assert!(!world.entity_enabled(&e).unwrap());
    let disabled = world.query().with_all([Health::component_key()]).only_disabled().execute();
    assert_eq!(disabled.as_ref(), &[e.clone()]);
    let enabled = world.query().with_all([Health::component_key()]).only_enabled().execute();
    assert!(enabled.is_empty());

    world.enable_entity(&e);
    assert!(world.entity_enabled(&e).unwrap());
    let after_enabled = world.query().with_all([Health::component_key()]).only_enabled().execute();
    assert_eq!(after_enabled.as_ref(), &[e]);
}

#[test]
fn removing_an_entity_drops_it_from_every_index() {
    let world = World::new();
    let a = world.add_entity(EntitySpec::new().with(Health(10)));
    let b = world.add_entity(EntitySpec::new().with(Health(10)));

    world.remove_entity(&a);

    let union = world.query().with_all([Health::component_key()]).execute();
    assert_eq!(union.as_ref(), &[b]);
}

#[test]
fn add_component_and_remove_component_update_membership() {
    let world = World::new();
    let e = world.add_entity(EntitySpec::new());
    assert!(!world.has_component(&e, Health::component_key()));

    world.add_component(&e, Health(5));
    assert!(world.has_component(&e, Health::component_key()));

    assert!(world.remove_component::<Health>(&e));
    assert!(!world.has_component(&e, Health::component_key()));
    assert!(!world.remove_component::<Health>(&e), "double-remove is a no-op");
}

#[test]
fn id_collision_runs_the_first_instance_on_destroy() {
    let world = World::new();
    let destroyed = Arc::new(AtomicUsize::new(0));
    let destroyed_in_hook = destroyed.clone();

    world.add_entity(
        EntitySpec::new()
            .with_id("hero")
            .with(Health(10))
            .on_destroy(move |_world, _entity| {
                destroyed_in_hook.fetch_add(1, Ordering::SeqCst);
            }),
    );
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    world.add_entity(EntitySpec::new().with_id("hero").with(Health(99)));
    assert_eq!(destroyed.load(Ordering::SeqCst), 1, "replaced instance's on_destroy must fire");
}

#[test]
fn initialize_hook_runs_once_at_creation() {
    let world = World::new();
    let initialized = Arc::new(AtomicUsize::new(0));
    let initialized_in_hook = initialized.clone();

    let e = world.add_entity(EntitySpec::new().on_initialize(move |_world, _entity| {
        initialized_in_hook.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(initialized.load(Ordering::SeqCst), 1);

    world.disable_entity(&e);
    world.enable_entity(&e);
    assert_eq!(initialized.load(Ordering::SeqCst), 1, "initialize never re-runs");
}

#[test]
fn disable_hook_runs_every_disable() {
    let world = World::new();
    let disables = Arc::new(AtomicUsize::new(0));
    let disables_in_hook = disables.clone();

    let e = world.add_entity(EntitySpec::new().on_disable(move |_world, _entity| {
        disables_in_hook.fetch_add(1, Ordering::SeqCst);
    }));

    world.disable_entity(&e);
    world.enable_entity(&e);
    world.disable_entity(&e);
    assert_eq!(disables.load(Ordering::SeqCst), 2);
}

#[test]
fn preprocessors_and_postprocessors_run_for_every_entity() {
    let world = World::new();
    let added_ids = Arc::new(std::sync::Mutex::new(Vec::new()));
    let removed_ids = Arc::new(std::sync::Mutex::new(Vec::new()));

    let added_ids_in_hook = added_ids.clone();
    world.add_preprocessor(move |_world, entity| {
        added_ids_in_hook.lock().unwrap().push(entity.clone());
    });
    let removed_ids_in_hook = removed_ids.clone();
    world.add_postprocessor(move |_world, entity| {
        removed_ids_in_hook.lock().unwrap().push(entity.clone());
    });

    let e = world.add_entity(EntitySpec::new());
    assert_eq!(*added_ids.lock().unwrap(), vec![e.clone()]);
    assert!(removed_ids.lock().unwrap().is_empty());

    world.remove_entity(&e);
    assert_eq!(*removed_ids.lock().unwrap(), vec![e]);
}

#[test]
fn add_to_tree_marks_the_entity_parented() {
    let world = World::new();
    let parented = world.add_entity(EntitySpec::new());
    assert_eq!(world.entity_parentage(&parented), Some(Parentage::Parented));

    let unparented = world.add_entity(EntitySpec::new().without_tree());
    assert_eq!(world.entity_parentage(&unparented), Some(Parentage::Unparented));
}
