//! The [`World`] is the top-level container for the ECS. It owns every entity,
//! the system registry, the event bus, and the injected allocator, and it is
//! the only place where any of them change.
//!
//! # Lifecycle
//!
//! - [`World::create`] issues the next sequential id, appends the entity and
//!   emits [`EntityCreated`].
//! - [`World::destroy`] marks an entity pending-destroy and emits
//!   [`EntityDestroyed`] while its data is still intact. The entity stays in
//!   the collection (hidden from views) until the next [`World::cleanup`],
//!   which [`World::tick`] runs first unless [`WorldConfig::cleanup_on_tick`]
//!   is off. [`World::destroy_immediate`] removes it synchronously.
//! - Removing an entity from the collection first emits [`ComponentRemoved`]
//!   for each of its components, while the entity and every component are
//!   still reachable, then releases them.
//!
//! # Ordering
//!
//! The entity collection is kept in creation order, which is also ascending id
//! order. Systems tick in registration order and listeners receive events in
//! subscription order.

use std::alloc::Layout;
use std::collections::btree_map::Entry;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::alloc::{AllocKind, Allocator, HeapAllocator};
use crate::component::{downcast, Component, ComponentSet, Container};
use crate::entity::{Entity, EntityId, EntityMut};
use crate::event::{
    ComponentAssigned, ComponentRemoved, EntityCreated, EntityDestroyed, EventBus, EventListener,
};
use crate::system::{EntitySystem, SystemRef, SystemRegistry};
use crate::type_registry::type_id_of;
use crate::view::{ComponentView, EntityView};
use crate::EcsError;

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`World`].
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Run [`World::cleanup`] at the start of every [`World::tick`].
    pub cleanup_on_tick: bool,
    /// Entity slots reserved up front.
    pub entity_capacity: usize,
}

impl Default for WorldConfig {
    /// Cleanup on tick, no reservation.
    fn default() -> Self {
        Self {
            cleanup_on_tick: true,
            entity_capacity: 0,
        }
    }
}

impl WorldConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, EcsError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The ECS world.
///
/// # Example
///
/// ```
/// use ironclad_ecs::prelude::*;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Position { x: f32, y: f32 }
/// #[derive(Debug, Clone, PartialEq)]
/// struct Rotation(f32);
///
/// let mut world = World::new();
/// let mut tank = world.create().unwrap();
/// tank.assign(Position { x: 0.0, y: 0.0 }).unwrap();
/// tank.assign(Rotation(35.0)).unwrap();
/// let tank = tank.id();
/// let crate_id = world.create().unwrap().id();
/// world.assign(crate_id, Position { x: 4.0, y: 1.0 }).unwrap();
///
/// let turning: Vec<EntityId> = world
///     .each::<(Position, Rotation)>(false)
///     .into_iter()
///     .map(|entity| entity.id())
///     .collect();
/// assert_eq!(turning, vec![tank]);
///
/// world.destroy(crate_id);
/// assert_eq!(world.entity_count(), 2);
/// assert!(world.cleanup());
/// assert_eq!(world.entity_count(), 1);
/// ```
pub struct World {
    config: WorldConfig,
    allocator: Rc<dyn Allocator>,
    /// Sorted by id: ids are issued in increasing order and removal keeps order.
    entities: Vec<Box<Entity>>,
    systems: SystemRegistry,
    bus: EventBus,
    last_entity_id: u64,
    /// Bumped whenever an entity joins or leaves the collection.
    structure_generation: u64,
}

impl World {
    /// Create a world with the default configuration and the heap allocator.
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world with `config` and the heap allocator.
    pub fn with_config(config: WorldConfig) -> Self {
        Self::with_allocator(config, Rc::new(HeapAllocator))
    }

    /// Create a world whose entities, components and systems are accounted to
    /// `allocator`.
    pub fn with_allocator(config: WorldConfig, allocator: Rc<dyn Allocator>) -> Self {
        Self {
            entities: Vec::with_capacity(config.entity_capacity),
            config,
            allocator,
            systems: SystemRegistry::new(),
            bus: EventBus::new(),
            last_entity_id: 0,
            structure_generation: 0,
        }
    }

    /// The configuration this world was built with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The injected allocator.
    pub fn allocator(&self) -> &Rc<dyn Allocator> {
        &self.allocator
    }

    /// The subscriber registry.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The system registry.
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    // -- entities -----------------------------------------------------------

    /// Create an entity with the next sequential id and emit [`EntityCreated`].
    ///
    /// Fails only if the allocator refuses the entity; no id is consumed then.
    pub fn create(&mut self) -> Result<EntityMut<'_>, EcsError> {
        self.allocator
            .allocate(AllocKind::Entity, Layout::new::<Entity>())?;
        self.last_entity_id += 1;
        let id = EntityId::from_raw(self.last_entity_id);
        self.entities.push(Box::new(Entity::new(id)));
        self.structure_generation += 1;
        debug!(entity = %id, "entity created");

        self.emit(EntityCreated { entity: id });
        Ok(EntityMut::new(self, id))
    }

    /// Mark `id` for destruction at the next cleanup.
    ///
    /// Emits [`EntityDestroyed`] the first time; destroying a pending entity
    /// again, or an id that is not in the world, does nothing.
    pub fn destroy(&mut self, id: EntityId) {
        self.destroy_entity(id, false);
    }

    /// Destroy `id` and remove it from the collection right away.
    ///
    /// Emits [`EntityDestroyed`] unless the entity was already pending, in
    /// which case it is removed without a second notification.
    pub fn destroy_immediate(&mut self, id: EntityId) {
        self.destroy_entity(id, true);
    }

    fn destroy_entity(&mut self, id: EntityId, immediate: bool) {
        let Some(entity) = self.get_by_id_mut(id) else {
            return;
        };
        if entity.is_pending_destroy() {
            if immediate {
                self.remove_entity(id);
            }
            return;
        }

        entity.mark_pending_destroy();
        debug!(entity = %id, immediate, "entity destroyed");
        self.emit(EntityDestroyed { entity: id });

        if immediate {
            self.remove_entity(id);
        }
    }

    /// Remove and deallocate every pending-destroy entity.
    ///
    /// Returns `true` if at least one entity was removed.
    pub fn cleanup(&mut self) -> bool {
        let removed = self.release_pending();
        if removed == 0 {
            return false;
        }
        debug!(removed, "cleanup");
        true
    }

    /// Destroy every entity and restart ids at 1.
    ///
    /// Every entity present gets exactly one [`EntityDestroyed`] from the
    /// reset, pending or not. Entities created by listeners while the reset
    /// runs are destroyed as well.
    pub fn reset(&mut self) {
        let destroyed = self.destroy_all(true);
        self.last_entity_id = 0;
        debug!(destroyed, "world reset");
    }

    /// Destroy until the collection is empty, returning how many
    /// [`EntityDestroyed`] notifications were sent.
    fn destroy_all(&mut self, notify_pending: bool) -> usize {
        let mut notified = 0;
        while !self.entities.is_empty() {
            let ids: Vec<EntityId> = self.entities.iter().map(|e| e.id()).collect();
            for id in ids {
                let Some(entity) = self.get_by_id_mut(id) else {
                    continue;
                };
                if entity.is_pending_destroy() && !notify_pending {
                    continue;
                }
                entity.mark_pending_destroy();
                self.emit(EntityDestroyed { entity: id });
                notified += 1;
            }
            self.release_pending();
        }
        notified
    }

    /// Notify component removal for every pending-destroy entity while it is
    /// still in the collection, then detach and release them all. Returns how
    /// many entities were released.
    ///
    /// Entities marked pending by a listener during the notifications are
    /// notified and released in the same call.
    fn release_pending(&mut self) -> usize {
        let mut released = 0;
        loop {
            let batch: Vec<EntityId> = self
                .entities
                .iter()
                .filter(|e| e.is_pending_destroy() && !e.is_removal_notified())
                .map(|e| e.id())
                .collect();
            if batch.is_empty() {
                break;
            }
            released += batch.len();
            for id in batch {
                self.notify_components_removed(id);
            }
        }

        // Listeners may already have removed some with `destroy_immediate`.
        for entity in self.take_pending() {
            self.release_entity(entity);
        }
        released
    }

    /// Detach every pending-destroy entity from the collection.
    fn take_pending(&mut self) -> Vec<Box<Entity>> {
        if !self.entities.iter().any(|e| e.is_pending_destroy()) {
            return Vec::new();
        }
        let mut kept = Vec::with_capacity(self.entities.capacity());
        let mut doomed = Vec::new();
        for entity in self.entities.drain(..) {
            if entity.is_pending_destroy() {
                doomed.push(entity);
            } else {
                kept.push(entity);
            }
        }
        self.entities = kept;
        self.structure_generation += 1;
        doomed
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.notify_components_removed(id);
        // A listener may already have removed it.
        if let Some(index) = self.index_of(id) {
            let entity = self.entities.remove(index);
            self.structure_generation += 1;
            self.release_entity(entity);
        }
    }

    /// Emit [`ComponentRemoved`] for each component of `id`, once per
    /// entity. The entity and all of its components stay resolvable while
    /// listeners run.
    fn notify_components_removed(&mut self, id: EntityId) {
        let notices = match self.get_by_id_mut(id) {
            Some(entity) => entity.take_removal_notices(),
            None => return,
        };
        for notice in notices {
            notice(self);
        }
    }

    /// Release the components of a detached entity, then the entity itself.
    /// Removal has already been notified.
    fn release_entity(&mut self, mut entity: Box<Entity>) {
        let id = entity.id();
        for container in entity.take_all_containers() {
            container.destroy(self.allocator.as_ref());
        }
        drop(entity);
        self.allocator
            .deallocate(AllocKind::Entity, Layout::new::<Entity>());
        trace!(entity = %id, "entity deallocated");
    }

    /// Number of entities in the collection, pending-destroy ones included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The most recently issued id, or [`EntityId::INVALID`] if none has been
    /// issued since construction or the last reset.
    pub fn last_entity_id(&self) -> EntityId {
        EntityId::from_raw(self.last_entity_id)
    }

    /// The entity at position `index` in the collection.
    pub fn get_by_index(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index).map(Box::as_ref)
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        if !id.is_valid() || id.get() > self.last_entity_id {
            return None;
        }
        self.entities.binary_search_by_key(&id, |e| e.id()).ok()
    }

    /// The entity with `id`, pending-destroy or not. `None` for
    /// [`EntityId::INVALID`], ids never issued, and removed entities.
    pub fn get_by_id(&self, id: EntityId) -> Option<&Entity> {
        self.index_of(id).map(|index| self.entities[index].as_ref())
    }

    pub(crate) fn get_by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index_of(id).map(|index| self.entities[index].as_mut())
    }

    /// Mutable access to the entity with `id`.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        self.index_of(id)?;
        Some(EntityMut::new(self, id))
    }

    // -- components ---------------------------------------------------------

    /// Attach `value` as the `T` component of `id`, or overwrite the existing
    /// one in place, then emit [`ComponentAssigned`].
    ///
    /// Overwriting keeps the container, so handles taken earlier observe the
    /// new value, and no [`ComponentRemoved`] is emitted.
    ///
    /// # Panics
    ///
    /// Panics if the existing value is borrowed through a handle.
    pub fn assign<T: 'static>(&mut self, id: EntityId, value: T) -> Result<Component<T>, EcsError> {
        let index = self
            .index_of(id)
            .ok_or(EcsError::NoSuchEntity { entity: id })?;
        let entity = &mut self.entities[index];
        let handle = match entity.containers_entry(type_id_of::<T>()) {
            Entry::Occupied(slot) => {
                let container = downcast::<T>(&**slot.get());
                container.replace(value);
                container.handle()
            }
            Entry::Vacant(slot) => {
                self.allocator
                    .allocate(AllocKind::Component, Container::<T>::layout())?;
                let container = Container::new(value);
                let handle = container.handle();
                slot.insert(Box::new(container));
                handle
            }
        };
        trace!(entity = %id, component = std::any::type_name::<T>(), "component assigned");

        self.emit(ComponentAssigned {
            entity: id,
            component: handle.clone(),
        });
        Ok(handle)
    }

    /// Detach and destroy the `T` component of `id`.
    ///
    /// Emits [`ComponentRemoved`] after detaching and before destroying, so the
    /// handle in the event is still valid while the entity no longer has `T`.
    /// Returns `false` if the entity has no `T` or does not exist.
    pub fn remove<T: 'static>(&mut self, id: EntityId) -> bool {
        let token = type_id_of::<T>();
        let Some(container) = self
            .get_by_id_mut(id)
            .and_then(|entity| entity.take_container(token))
        else {
            return false;
        };
        let handle = downcast::<T>(&*container).handle();
        trace!(entity = %id, component = std::any::type_name::<T>(), "component removed");

        self.emit(ComponentRemoved {
            entity: id,
            component: handle,
        });
        container.destroy(self.allocator.as_ref());
        true
    }

    // -- iteration ----------------------------------------------------------

    /// Lazy view of entities having every type in `S`.
    pub fn each<S: ComponentSet>(&self, include_pending_destroy: bool) -> ComponentView<'_, S> {
        ComponentView::new(&self.entities, include_pending_destroy)
    }

    /// Lazy view of every entity.
    pub fn all(&self, include_pending_destroy: bool) -> EntityView<'_> {
        EntityView::new(&self.entities, include_pending_destroy)
    }

    /// Call `f` for every entity having every type in `S`, with its handles.
    pub fn each_with<S: ComponentSet>(
        &self,
        include_pending_destroy: bool,
        f: impl FnMut(&Entity, S::Handles),
    ) {
        self.each::<S>(include_pending_destroy).for_each_with(f);
    }

    /// Call `f` for every entity.
    pub fn all_with(&self, include_pending_destroy: bool, mut f: impl FnMut(&Entity)) {
        for entity in self.all(include_pending_destroy) {
            f(entity);
        }
    }

    /// Like [`each_with`](World::each_with), but `f` gets mutable access to the
    /// visited entity and its world.
    ///
    /// `f` may assign and remove components and call [`EntityMut::destroy`].
    /// Anything that adds entities to or removes them from the collection
    /// (creating, immediate destruction, cleanup, reset) ends the traversal
    /// after the current entity.
    pub fn each_mut<S: ComponentSet>(
        &mut self,
        include_pending_destroy: bool,
        mut f: impl FnMut(EntityMut<'_>, S::Handles),
    ) {
        let generation = self.structure_generation;
        let mut index = 0;
        while let Some(entity) = self.entities.get(index) {
            index += 1;
            if (entity.is_pending_destroy() && !include_pending_destroy) || !S::matches(entity) {
                continue;
            }
            let id = entity.id();
            let handles = S::fetch(entity);
            f(EntityMut::new(self, id), handles);

            if self.structure_generation != generation {
                warn!(
                    visited = index,
                    "each_mut stopped: entities were added or removed during traversal"
                );
                break;
            }
        }
    }

    // -- systems ------------------------------------------------------------

    /// Append `system` to the enabled list and call its
    /// [`configure`](EntitySystem::configure) hook.
    pub fn register_system<S: EntitySystem>(&mut self, system: Rc<S>) -> Result<Rc<S>, EcsError> {
        self.allocator
            .allocate(AllocKind::System, Layout::new::<S>())?;
        let registered: SystemRef = system.clone();
        self.systems.push(registered);
        debug!(system = system.name(), "system registered");

        Rc::clone(&system).configure(self);
        Ok(system)
    }

    /// Remove `system` from whichever list holds it and call its
    /// [`unconfigure`](EntitySystem::unconfigure) hook. Returns `false`, without
    /// calling the hook, if it was not registered.
    pub fn unregister_system<S: EntitySystem + ?Sized>(&mut self, system: &S) -> bool {
        let Some(registered) = self.systems.remove(system) else {
            return false;
        };
        debug!(system = registered.name(), "system unregistered");
        self.release_system(registered);
        true
    }

    fn release_system(&mut self, system: SystemRef) {
        system.unconfigure(self);
        self.allocator
            .deallocate(AllocKind::System, Layout::for_value(&*system));
    }

    /// Move a disabled system back to the end of the enabled list. Returns
    /// `false` if it was not disabled.
    pub fn enable_system<S: EntitySystem + ?Sized>(&mut self, system: &S) -> bool {
        let moved = self.systems.enable(system);
        if moved {
            debug!(system = system.name(), "system enabled");
        }
        moved
    }

    /// Move an enabled system to the disabled list. Returns `false` if it was
    /// not enabled.
    pub fn disable_system<S: EntitySystem + ?Sized>(&mut self, system: &S) -> bool {
        let moved = self.systems.disable(system);
        if moved {
            debug!(system = system.name(), "system disabled");
        }
        moved
    }

    /// Whether `system` is registered and enabled.
    pub fn is_system_enabled<S: EntitySystem + ?Sized>(&self, system: &S) -> bool {
        self.systems.is_enabled(system)
    }

    /// Total registered systems, enabled or not.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Registered systems that will tick.
    pub fn enabled_system_count(&self) -> usize {
        self.systems.enabled().len()
    }

    /// Advance one step: clean up (unless configured off), then tick every
    /// enabled system in registration order.
    ///
    /// Systems registered or enabled during the step first tick in the next
    /// one; systems disabled or unregistered during the step are skipped for
    /// the rest of it.
    pub fn tick(&mut self, dt: f32) {
        if self.config.cleanup_on_tick {
            self.cleanup();
        }
        let systems: Vec<SystemRef> = self.systems.enabled().to_vec();
        for system in systems {
            // Disabled or unregistered by a system earlier in this step.
            if !self.systems.is_enabled(&*system) {
                continue;
            }
            system.tick(self, dt);
        }
    }

    // -- events -------------------------------------------------------------

    /// Subscribe `listener` to events of type `E`.
    pub fn subscribe<E, L>(&mut self, listener: &Rc<L>)
    where
        E: 'static,
        L: EventListener<E> + 'static,
    {
        self.bus.subscribe::<E, L>(listener);
    }

    /// Unsubscribe `listener` from events of type `E`.
    pub fn unsubscribe<E, L>(&mut self, listener: &L)
    where
        E: 'static,
        L: EventListener<E> + ?Sized,
    {
        self.bus.unsubscribe::<E, L>(listener);
    }

    /// Unsubscribe `listener` from every event type.
    pub fn unsubscribe_all<L: ?Sized>(&mut self, listener: &L) {
        self.bus.unsubscribe_all(listener);
    }

    /// Number of subscriptions to `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.bus.subscriber_count::<E>()
    }

    /// Deliver `event` to every subscriber of `E`, in subscription order.
    ///
    /// The subscriber list is captured before the first delivery: listeners
    /// subscribed during dispatch do not receive this event, and listeners
    /// unsubscribed during dispatch still do.
    pub fn emit<E: 'static>(&mut self, event: E) {
        let listeners = self.bus.snapshot::<E>();
        if listeners.is_empty() {
            return;
        }
        trace!(
            event = std::any::type_name::<E>(),
            listeners = listeners.len(),
            "emit"
        );

        let mut stale = false;
        for weak in &listeners {
            match weak.upgrade() {
                Some(listener) => listener.receive(self, &event),
                None => stale = true,
            }
        }
        if stale {
            self.bus.prune::<E>();
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    /// Emit [`EntityDestroyed`] for every entity not already pending, release
    /// all entities, then unconfigure and release every system.
    fn drop(&mut self) {
        let destroyed = self.destroy_all(false);
        for system in self.systems.drain() {
            self.release_system(system);
        }
        // Systems may create entities while unconfiguring.
        self.destroy_all(false);
        debug!(destroyed, "world dropped");
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("last_entity_id", &self.last_entity_id)
            .field("systems", &self.systems)
            .field("bus", &self.bus)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::BoundedAllocator;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Rotation(f32);

    fn spawn(world: &mut World) -> EntityId {
        world.create().unwrap().id()
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut world = World::new();
        let a = spawn(&mut world);
        let b = spawn(&mut world);
        world.destroy(a);
        world.cleanup();
        let c = spawn(&mut world);
        assert_eq!([a.get(), b.get(), c.get()], [1, 2, 3]);
        assert_eq!(world.last_entity_id(), c);
    }

    #[test]
    fn get_by_id_rejects_invalid_and_future_ids() {
        let mut world = World::new();
        let a = spawn(&mut world);
        assert!(world.get_by_id(EntityId::INVALID).is_none());
        assert!(world.get_by_id(EntityId::from_raw(a.get() + 1)).is_none());
        assert_eq!(world.get_by_id(a).map(Entity::id), Some(a));
    }

    #[test]
    fn get_by_index_follows_creation_order() {
        let mut world = World::new();
        let a = spawn(&mut world);
        let b = spawn(&mut world);
        let c = spawn(&mut world);
        world.destroy_immediate(b);
        assert_eq!(world.get_by_index(0).map(Entity::id), Some(a));
        assert_eq!(world.get_by_index(1).map(Entity::id), Some(c));
        assert!(world.get_by_index(2).is_none());
    }

    #[test]
    fn destroy_unknown_id_is_noop() {
        let mut world = World::new();
        spawn(&mut world);
        world.destroy(EntityId::INVALID);
        world.destroy_immediate(EntityId::from_raw(99));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn destroy_immediate_on_pending_entity_removes_it() {
        let mut world = World::new();
        let a = spawn(&mut world);
        world.destroy(a);
        assert_eq!(world.entity_count(), 1);
        world.destroy_immediate(a);
        assert_eq!(world.entity_count(), 0);
        assert!(!world.cleanup());
    }

    #[test]
    fn assign_on_missing_entity_fails() {
        let mut world = World::new();
        let err = world
            .assign(EntityId::from_raw(5), Rotation(1.0))
            .unwrap_err();
        assert!(matches!(err, EcsError::NoSuchEntity { entity } if entity.get() == 5));
    }

    #[test]
    fn remove_on_missing_entity_returns_false() {
        let mut world = World::new();
        assert!(!world.remove::<Rotation>(EntityId::from_raw(1)));
    }

    #[test]
    fn config_disables_cleanup_on_tick() {
        let mut world = World::with_config(WorldConfig {
            cleanup_on_tick: false,
            ..WorldConfig::default()
        });
        let a = spawn(&mut world);
        world.destroy(a);
        world.tick(0.1);
        assert_eq!(world.entity_count(), 1);
        assert!(world.cleanup());
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn config_from_json_defaults_missing_fields() {
        let config = WorldConfig::from_json(r#"{ "cleanup_on_tick": false }"#).unwrap();
        assert!(!config.cleanup_on_tick);
        assert_eq!(config.entity_capacity, 0);

        let err = WorldConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_)));
    }

    #[test]
    fn allocator_refusal_propagates_from_create_and_assign() {
        let budget = Layout::new::<Entity>().size();
        let alloc = Rc::new(BoundedAllocator::new(budget));
        let mut world = World::with_allocator(WorldConfig::default(), alloc.clone());

        let a = spawn(&mut world);
        assert!(matches!(world.create(), Err(EcsError::Allocation(_))));
        assert_eq!(world.entity_count(), 1);

        assert!(matches!(
            world.assign(a, Position { x: 0.0, y: 0.0 }),
            Err(EcsError::Allocation(_))
        ));
        assert!(!world.get_by_id(a).unwrap().has::<Position>());
        // A refused create does not consume an id.
        assert_eq!(world.last_entity_id(), a);
    }

    #[test]
    fn allocator_sees_every_release() {
        let alloc = Rc::new(BoundedAllocator::unbounded());
        {
            let mut world = World::with_allocator(WorldConfig::default(), alloc.clone());
            let a = spawn(&mut world);
            let b = spawn(&mut world);
            world.assign(a, Position { x: 1.0, y: 1.0 }).unwrap();
            world.assign(a, Rotation(0.5)).unwrap();
            world.assign(b, Rotation(0.5)).unwrap();
            assert_eq!(alloc.live(AllocKind::Entity), 2);
            assert_eq!(alloc.live(AllocKind::Component), 3);

            world.remove::<Rotation>(a);
            assert_eq!(alloc.live(AllocKind::Component), 2);
            world.destroy_immediate(b);
            assert_eq!(alloc.live(AllocKind::Entity), 1);
            assert_eq!(alloc.live(AllocKind::Component), 1);
        }
        assert_eq!(alloc.stats().live_bytes, 0);
    }

    #[test]
    fn each_mut_allows_component_changes_on_visited_entity() {
        let mut world = World::new();
        for i in 0..3 {
            let id = spawn(&mut world);
            world.assign(id, Position { x: i as f32, y: 0.0 }).unwrap();
        }

        world.each_mut::<(Position,)>(false, |mut entity, (position,)| {
            let x = position.cloned().unwrap().x;
            entity.assign(Rotation(x * 10.0)).unwrap();
            if x == 1.0 {
                entity.destroy();
            }
        });

        assert_eq!(world.each::<(Position, Rotation)>(true).into_iter().count(), 3);
        assert_eq!(world.each::<(Position, Rotation)>(false).into_iter().count(), 2);
    }

    #[test]
    fn each_mut_stops_when_collection_changes() {
        let mut world = World::new();
        for _ in 0..4 {
            let id = spawn(&mut world);
            world.assign(id, Rotation(0.0)).unwrap();
        }

        let visited = RefCell::new(Vec::new());
        world.each_mut::<(Rotation,)>(false, |mut entity, _| {
            visited.borrow_mut().push(entity.id().get());
            if entity.id().get() == 2 {
                entity.world_mut().create().unwrap();
            }
        });
        assert_eq!(*visited.borrow(), vec![1, 2]);
        assert_eq!(world.entity_count(), 5);
    }

    #[test]
    fn all_with_skips_pending_unless_requested() {
        let mut world = World::new();
        let a = spawn(&mut world);
        let _b = spawn(&mut world);
        world.destroy(a);

        let mut live = 0;
        world.all_with(false, |_| live += 1);
        let mut everything = 0;
        world.all_with(true, |_| everything += 1);
        assert_eq!((live, everything), (1, 2));
    }

    #[test]
    fn reset_restarts_ids() {
        let mut world = World::new();
        spawn(&mut world);
        spawn(&mut world);
        world.reset();
        assert!(world.is_empty());
        assert_eq!(world.last_entity_id(), EntityId::INVALID);
        assert_eq!(spawn(&mut world).get(), 1);
    }
}
