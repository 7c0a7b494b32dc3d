//! Entity and component views over a populated world.

use ironclad_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Rotation(f32);

#[derive(Debug, Clone, PartialEq)]
struct Tag;

/// Ids 1..=5: 1 and 4 have both components, 2 only a position, 3 only a
/// rotation, 5 nothing.
fn setup_world() -> World {
    let mut world = World::new();
    for i in 1..=5u32 {
        let mut entity = world.create().unwrap();
        if matches!(i, 1 | 2 | 4) {
            entity
                .assign(Position {
                    x: i as f32,
                    y: 0.0,
                })
                .unwrap();
        }
        if matches!(i, 1 | 3 | 4) {
            entity.assign(Rotation(i as f32 * 10.0)).unwrap();
        }
    }
    world
}

fn ids<'w>(entities: impl IntoIterator<Item = &'w Entity>) -> Vec<u64> {
    entities.into_iter().map(|e| e.id().get()).collect()
}

#[test]
fn each_requires_every_component() {
    let world = setup_world();
    assert_eq!(ids(world.each::<(Position, Rotation)>(false)), vec![1, 4]);
    assert_eq!(ids(world.each::<(Position,)>(false)), vec![1, 2, 4]);
    assert_eq!(ids(world.each::<(Tag,)>(false)), Vec::<u64>::new());
}

#[test]
fn pending_destroy_hidden_until_included() {
    let mut world = setup_world();
    world.destroy(EntityId::from_raw(4));

    assert_eq!(ids(world.each::<(Position, Rotation)>(false)), vec![1]);
    assert_eq!(ids(world.each::<(Position, Rotation)>(true)), vec![1, 4]);
    assert_eq!(ids(world.all(false)), vec![1, 2, 3, 5]);
    assert_eq!(ids(world.all(true)), vec![1, 2, 3, 4, 5]);
}

#[test]
fn view_reflects_component_changes_between_passes() {
    let mut world = setup_world();
    world.assign(EntityId::from_raw(2), Rotation(0.0)).unwrap();
    world.remove::<Rotation>(EntityId::from_raw(1));
    assert_eq!(ids(world.each::<(Position, Rotation)>(false)), vec![2, 4]);
}

#[test]
fn each_with_hands_out_matching_handles() {
    let world = setup_world();
    let mut seen = Vec::new();
    world.each_with::<(Position, Rotation)>(false, |entity, (position, rotation)| {
        let x = position.cloned().unwrap().x;
        let angle = rotation.cloned().unwrap().0;
        seen.push((entity.id().get(), x, angle));
    });
    assert_eq!(seen, vec![(1, 1.0, 10.0), (4, 4.0, 40.0)]);
}

#[test]
fn handles_from_a_view_write_through() {
    let world = setup_world();
    for entity in world.each::<(Position,)>(false) {
        entity.get::<Position>().with_mut(|p| p.y = -1.0);
    }
    world.all_with(false, |entity| {
        if let Some(y) = entity.get::<Position>().with(|p| p.y) {
            assert_eq!(y, -1.0);
        }
    });
}

#[test]
fn with_is_sugar_over_has_and_get() {
    let world = setup_world();
    let two = world.get_by_id(EntityId::from_raw(2)).unwrap();

    let mut called = false;
    assert!(!two.with::<(Position, Rotation)>(|_| called = true));
    assert!(!called);
    assert!(two.with::<(Position,)>(|(p,)| assert!(p.is_valid())));
    assert_eq!(two.get::<Rotation>().cloned(), None);
}

#[test]
fn empty_world_views_are_empty() {
    let world = World::new();
    assert!(world.all(true).into_iter().next().is_none());
    assert!(world.each::<(Position,)>(true).iter().next().is_none());
}
