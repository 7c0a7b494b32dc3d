//! Ironclad ECS -- a single-threaded Entity Component System with lifecycle
//! events.
//!
//! A [`World`](world::World) owns a sequence of entities, each carrying at most
//! one component per Rust type. Systems registered with the world run once per
//! tick, and every structural change (entity created or destroyed, component
//! assigned or removed) is broadcast through a typed event bus that
//! applications can also use for their own payloads.
//!
//! Entity destruction is deferred: a destroyed entity stays in the collection,
//! hidden from views, until the next cleanup. Entity, component and system
//! storage is accounted to an injectable [`Allocator`](alloc::Allocator).
//!
//! # Quick Start
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use ironclad_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Default)]
//! struct Spawned(Cell<u32>);
//!
//! impl EventListener<EntityCreated> for Spawned {
//!     fn receive(&self, _world: &mut World, _event: &EntityCreated) {
//!         self.0.set(self.0.get() + 1);
//!     }
//! }
//!
//! let mut world = World::new();
//! let spawned = Rc::new(Spawned::default());
//! world.subscribe::<EntityCreated, _>(&spawned);
//!
//! let mut entity = world.create().unwrap();
//! let position = entity.assign(Position { x: 1.0, y: 2.0 }).unwrap();
//! position.with_mut(|p| p.x += 1.0);
//!
//! let id = entity.id();
//! assert_eq!(id.get(), 1);
//! assert_eq!(spawned.0.get(), 1);
//! assert_eq!(
//!     world.get_by_id(id).unwrap().get::<Position>().cloned(),
//!     Some(Position { x: 2.0, y: 2.0 })
//! );
//! ```

#![deny(unsafe_code)]

pub mod alloc;
pub mod component;
pub mod entity;
pub mod event;
pub mod system;
pub mod type_registry;
pub mod view;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Broken internal invariants are not errors; they panic.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The injected allocator refused a request.
    #[error(transparent)]
    Allocation(#[from] alloc::AllocError),

    /// The entity is not in the world (never issued or already removed).
    #[error("entity {entity} does not exist")]
    NoSuchEntity { entity: entity::EntityId },

    /// A world configuration could not be parsed.
    #[error("invalid world configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::alloc::{AllocError, AllocKind, AllocStats, Allocator, BoundedAllocator, HeapAllocator};
    pub use crate::component::{Component, ComponentSet};
    pub use crate::entity::{Entity, EntityId, EntityMut};
    pub use crate::event::{
        ComponentAssigned, ComponentRemoved, EntityCreated, EntityDestroyed, EventBus, EventListener,
    };
    pub use crate::system::{EntitySystem, SystemRef, SystemRegistry};
    pub use crate::type_registry::{type_id_of, TypeToken};
    pub use crate::view::{ComponentIter, ComponentView, EntityIter, EntityView};
    pub use crate::world::{World, WorldConfig};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
