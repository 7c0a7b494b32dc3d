//! Entity identifiers, entity records, and mutable entity access.
//!
//! An [`EntityId`] is a plain sequential number issued by the owning
//! [`World`]: the first entity is `1`, and `0` is reserved as
//! [`EntityId::INVALID`]. Ids are never recycled while the world lives
//! (a [`World::reset`] restarts the sequence).
//!
//! An [`Entity`] owns its components: at most one container per component
//! type, keyed by [`TypeToken`]. Read access goes through `&Entity`; anything
//! that must notify listeners (assigning, removing) goes through an
//! [`EntityMut`], which borrows the whole world.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{
    downcast, Component, ComponentContainer, ComponentSet, Container, RemovalNotice,
};
use crate::type_registry::{type_id_of, TypeToken};
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Sequential entity identifier. `0` is never issued.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// The reserved "no entity" id.
    pub const INVALID: EntityId = EntityId(0);

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this is anything other than [`EntityId::INVALID`].
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An identity plus the components it owns.
///
/// Entities are created and destroyed only by their [`World`].
pub struct Entity {
    id: EntityId,
    components: BTreeMap<TypeToken, Box<dyn ComponentContainer>>,
    pending_destroy: bool,
    /// Set once teardown has handed out this entity's removal notices.
    removal_notified: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
            pending_destroy: false,
            removal_notified: false,
        }
    }

    /// This entity's id.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the entity has been destroyed but not yet cleaned up.
    #[inline]
    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    pub(crate) fn mark_pending_destroy(&mut self) {
        self.pending_destroy = true;
    }

    /// Whether a `T` component is attached. Pending-destroy state is ignored.
    pub fn has<T: 'static>(&self) -> bool {
        self.components.contains_key(&type_id_of::<T>())
    }

    /// Whether every type in `S` is attached.
    pub fn has_all<S: ComponentSet>(&self) -> bool {
        S::matches(self)
    }

    /// Handle to the `T` component, or a null handle if there is none.
    pub fn get<T: 'static>(&self) -> Component<T> {
        self.container::<T>()
            .map(Container::handle)
            .unwrap_or_default()
    }

    /// If every type in `S` is attached, call `f` with their handles and
    /// return `true`. Otherwise return `false` without calling `f`.
    pub fn with<S: ComponentSet>(&self, f: impl FnOnce(S::Handles)) -> bool {
        if !S::matches(self) {
            return false;
        }
        f(S::fetch(self));
        true
    }

    /// Number of attached components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Tokens of the attached component types.
    pub fn component_types(&self) -> impl Iterator<Item = TypeToken> + '_ {
        self.components.keys().copied()
    }

    pub(crate) fn container<T: 'static>(&self) -> Option<&Container<T>> {
        self.components
            .get(&type_id_of::<T>())
            .map(|container| downcast::<T>(&**container))
    }

    pub(crate) fn containers_entry(
        &mut self,
        token: TypeToken,
    ) -> Entry<'_, TypeToken, Box<dyn ComponentContainer>> {
        self.components.entry(token)
    }

    pub(crate) fn take_container(&mut self, token: TypeToken) -> Option<Box<dyn ComponentContainer>> {
        self.components.remove(&token)
    }

    pub(crate) fn is_removal_notified(&self) -> bool {
        self.removal_notified
    }

    /// Removal notices for every attached component, in key order. Empty on
    /// every call after the first.
    pub(crate) fn take_removal_notices(&mut self) -> Vec<RemovalNotice> {
        if std::mem::replace(&mut self.removal_notified, true) {
            return Vec::new();
        }
        self.components
            .values()
            .map(|container| container.removal_notice(self.id))
            .collect()
    }

    pub(crate) fn take_all_containers(&mut self) -> Vec<Box<dyn ComponentContainer>> {
        std::mem::take(&mut self.components).into_values().collect()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("pending_destroy", &self.pending_destroy)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityMut
// ---------------------------------------------------------------------------

/// Mutable access to one entity, borrowing its world.
///
/// Operations that notify listeners hand the whole world to them, so a
/// listener may destroy this very entity. Every method therefore re-resolves
/// the id: once the entity has left the collection, reads report "absent" and
/// [`assign`](EntityMut::assign) fails with [`EcsError::NoSuchEntity`].
pub struct EntityMut<'w> {
    world: &'w mut World,
    id: EntityId,
}

impl<'w> EntityMut<'w> {
    pub(crate) fn new(world: &'w mut World, id: EntityId) -> Self {
        Self { world, id }
    }

    /// The entity's id.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The owning world.
    pub fn world(&self) -> &World {
        &*self.world
    }

    /// The owning world, mutably.
    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    /// The entity record, if it is still in the collection.
    pub fn entity(&self) -> Option<&Entity> {
        self.world.get_by_id(self.id)
    }

    /// Whether the entity is still in the world's collection.
    pub fn is_alive(&self) -> bool {
        self.entity().is_some()
    }

    /// See [`Entity::is_pending_destroy`].
    pub fn is_pending_destroy(&self) -> bool {
        self.entity().is_some_and(Entity::is_pending_destroy)
    }

    /// See [`Entity::has`].
    pub fn has<T: 'static>(&self) -> bool {
        self.entity().is_some_and(Entity::has::<T>)
    }

    /// See [`Entity::has_all`].
    pub fn has_all<S: ComponentSet>(&self) -> bool {
        self.entity().is_some_and(Entity::has_all::<S>)
    }

    /// See [`Entity::get`].
    pub fn get<T: 'static>(&self) -> Component<T> {
        self.entity().map(Entity::get::<T>).unwrap_or_default()
    }

    /// See [`Entity::with`].
    pub fn with<S: ComponentSet>(&self, f: impl FnOnce(S::Handles)) -> bool {
        self.entity().is_some_and(|entity| entity.with::<S>(f))
    }

    /// Attach or overwrite the `T` component. See [`World::assign`].
    pub fn assign<T: 'static>(&mut self, value: T) -> Result<Component<T>, EcsError> {
        self.world.assign(self.id, value)
    }

    /// Detach the `T` component. See [`World::remove`].
    pub fn remove<T: 'static>(&mut self) -> bool {
        self.world.remove::<T>(self.id)
    }

    /// Mark the entity for destruction at the next cleanup. See
    /// [`World::destroy`].
    pub fn destroy(&mut self) {
        self.world.destroy(self.id);
    }
}

impl fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMut").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Rotation(f32);

    fn entity_with_position() -> Entity {
        let mut entity = Entity::new(EntityId::from_raw(7));
        let container: Box<dyn ComponentContainer> =
            Box::new(Container::new(Position { x: 1.0, y: 2.0 }));
        entity
            .containers_entry(type_id_of::<Position>())
            .or_insert(container);
        entity
    }

    #[test]
    fn invalid_id_is_zero() {
        assert_eq!(EntityId::INVALID.get(), 0);
        assert!(!EntityId::INVALID.is_valid());
        assert!(EntityId::from_raw(1).is_valid());
    }

    #[test]
    fn id_formatting() {
        let id = EntityId::from_raw(42);
        assert_eq!(format!("{id:?}"), "EntityId(42)");
        assert_eq!(id.to_string(), "#42");
    }

    #[test]
    fn ids_order_by_issue_sequence() {
        assert!(EntityId::from_raw(1) < EntityId::from_raw(2));
    }

    #[test]
    fn has_and_get_reflect_containers() {
        let entity = entity_with_position();
        assert!(entity.has::<Position>());
        assert!(!entity.has::<Rotation>());
        assert!(entity.has_all::<(Position,)>());
        assert!(!entity.has_all::<(Position, Rotation)>());
        assert_eq!(
            entity.get::<Position>().cloned(),
            Some(Position { x: 1.0, y: 2.0 })
        );
        assert!(!entity.get::<Rotation>().is_valid());
    }

    #[test]
    fn with_only_runs_when_all_present() {
        let entity = entity_with_position();

        let mut seen = None;
        assert!(entity.with::<(Position,)>(|(pos,)| seen = pos.cloned()));
        assert_eq!(seen, Some(Position { x: 1.0, y: 2.0 }));

        let mut called = false;
        assert!(!entity.with::<(Position, Rotation)>(|_| called = true));
        assert!(!called);
    }

    #[test]
    fn take_container_detaches() {
        let mut entity = entity_with_position();
        let handle = entity.get::<Position>();
        let container = entity.take_container(type_id_of::<Position>());
        assert!(container.is_some());
        assert!(!entity.has::<Position>());
        // Detached but not yet destroyed: the data is still reachable.
        assert!(handle.is_valid());
        drop(container);
        assert!(!handle.is_valid());
    }

    #[test]
    fn removal_notices_are_handed_out_once() {
        let mut entity = entity_with_position();
        assert!(!entity.is_removal_notified());
        assert_eq!(entity.take_removal_notices().len(), 1);
        assert!(entity.is_removal_notified());
        assert!(entity.take_removal_notices().is_empty());
        // The components themselves stay attached until release.
        assert!(entity.has::<Position>());
    }

    #[test]
    fn pending_destroy_does_not_hide_components() {
        let mut entity = entity_with_position();
        entity.mark_pending_destroy();
        assert!(entity.is_pending_destroy());
        assert!(entity.has::<Position>());
        assert_eq!(entity.component_count(), 1);
    }
}
