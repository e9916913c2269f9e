//! Relationship index: forward/reverse maps, stale-target handling, idempotent removal.

use weft::prelude::*;

struct LikesTag;

#[test]
fn forward_and_reverse_indices_both_see_a_live_target() {
    let world = World::new();
    let source = world.add_entity(EntitySpec::new());
    let target = world.add_entity(EntitySpec::new());
    let relation = RelationKey::of::<LikesTag>();

    world.add_relationship(source.clone(), relation, RelationTarget::Entity(target.clone()));

    let forward = world.relationships_from(relation);
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].source, source);

    let reverse = world.relationships_to(relation);
    assert_eq!(reverse.len(), 1);
    assert_eq!(reverse[0].target, RelationTarget::Entity(target.clone()));

    world.remove_relationship(&source, relation, &RelationTarget::Entity(target));
    assert!(world.relationships_from(relation).is_empty());
    assert!(world.relationships_to(relation).is_empty());
}

#[test]
fn stale_target_is_recorded_forward_only() {
    let world = World::new();
    let source = world.add_entity(EntitySpec::new());
    let never_added = EntityId::new("ghost");
    let relation = RelationKey::of::<LikesTag>();

    world.add_relationship(source.clone(), relation, RelationTarget::Entity(never_added.clone()));

    assert_eq!(world.relationships_from(relation).len(), 1);
    assert!(world.relationships_to(relation).is_empty(), "stale target must skip the reverse index");

    // Removal is still idempotent even though the reverse index never had this entry.
    world.remove_relationship(&source, relation, &RelationTarget::Entity(never_added));
    assert!(world.relationships_from(relation).is_empty());
}

#[test]
fn removing_the_source_entity_drops_its_relationships() {
    let world = World::new();
    let source = world.add_entity(EntitySpec::new());
    let target = world.add_entity(EntitySpec::new());
    let relation = RelationKey::of::<LikesTag>();

    world.add_relationship(source.clone(), relation, RelationTarget::Entity(target));
    world.remove_entity(&source);

    assert!(world.relationships_from(relation).is_empty());
    assert!(world.relationships_to(relation).is_empty());
}
