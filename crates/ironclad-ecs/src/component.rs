//! Component handles, type-erased component containers, and component sets.
//!
//! Each component value lives in its own container, owned by exactly one
//! entity and keyed in that entity by the value's [`TypeToken`]. The entity
//! never needs to know the concrete type: the container exposes the two
//! capabilities the owner needs, notifying that the component was removed and
//! releasing itself back to the allocator.
//!
//! Callers reach component data through [`Component<T>`] handles. A handle is
//! non-owning and possibly null; it becomes null once the container it points
//! into has been destroyed.

use std::alloc::Layout;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::alloc::{AllocKind, Allocator};
use crate::entity::{Entity, EntityId};
use crate::event::ComponentRemoved;
use crate::type_registry::{type_id_of, TypeToken};
use crate::world::World;

// ---------------------------------------------------------------------------
// Component handle
// ---------------------------------------------------------------------------

/// Non-owning, possibly-null handle to a component value of type `T`.
///
/// A null handle means "the entity does not have this component". A handle
/// taken before the component was re-assigned still points at the same storage
/// and observes the new value.
///
/// Borrowing follows `RefCell` rules: reading while the same value is being
/// mutated through another handle panics.
pub struct Component<T> {
    data: Option<Weak<RefCell<T>>>,
}

impl<T> Component<T> {
    /// The null handle.
    pub fn null() -> Self {
        Self { data: None }
    }

    fn live(&self) -> Option<Rc<RefCell<T>>> {
        self.data.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the handle currently points at a live component.
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Run `f` with shared access to the value, or return `None` for a null
    /// handle.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let cell = self.live()?;
        let result = f(&cell.borrow());
        Some(result)
    }

    /// Run `f` with exclusive access to the value, or return `None` for a null
    /// handle.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let cell = self.live()?;
        let result = f(&mut cell.borrow_mut());
        Some(result)
    }

    /// Whether two handles point into the same container.
    ///
    /// Two null handles are considered the same.
    pub fn same_storage(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Clone> Component<T> {
    /// A copy of the current value.
    pub fn cloned(&self) -> Option<T> {
        self.with(T::clone)
    }
}

impl<T> Clone for Component<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

impl<T> Default for Component<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: fmt::Debug> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(cell) = self.live() else {
            return f.write_str("Component(null)");
        };
        let result = match cell.try_borrow() {
            Ok(value) => f.debug_tuple("Component").field(&*value).finish(),
            Err(_) => f.write_str("Component(<borrowed>)"),
        };
        result
    }
}

// ---------------------------------------------------------------------------
// ComponentContainer
// ---------------------------------------------------------------------------

/// A deferred [`ComponentRemoved`] emission for one container.
///
/// Built while the owning entity is borrowed and delivered once the world is
/// free. Does nothing if the component was destroyed in between.
pub(crate) type RemovalNotice = Box<dyn FnOnce(&mut World)>;

/// Type-erased owner of one component value.
pub(crate) trait ComponentContainer {
    /// The [`ComponentRemoved`] notification for the held value. The value
    /// must stay live until the notice has been delivered.
    fn removal_notice(&self, entity: EntityId) -> RemovalNotice;

    /// Release this container back to `allocator` and drop the value.
    fn destroy(self: Box<Self>, allocator: &dyn Allocator);

    fn as_any(&self) -> &dyn Any;

    fn component_name(&self) -> &'static str;
}

/// The concrete container for component type `T`.
pub(crate) struct Container<T> {
    data: Rc<RefCell<T>>,
}

impl<T: 'static> Container<T> {
    /// Layout requested from the allocator for one container of `T`.
    pub(crate) fn layout() -> Layout {
        Layout::new::<Self>()
    }

    pub(crate) fn new(value: T) -> Self {
        Self {
            data: Rc::new(RefCell::new(value)),
        }
    }

    /// Reconstruct the held value in place. Existing handles observe it.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed through a handle.
    pub(crate) fn replace(&self, value: T) {
        *self.data.borrow_mut() = value;
    }

    pub(crate) fn handle(&self) -> Component<T> {
        Component {
            data: Some(Rc::downgrade(&self.data)),
        }
    }
}

impl<T: 'static> ComponentContainer for Container<T> {
    fn removal_notice(&self, entity: EntityId) -> RemovalNotice {
        let component = self.handle();
        Box::new(move |world: &mut World| {
            // Removed by a listener earlier in the same teardown.
            if component.is_valid() {
                world.emit(ComponentRemoved { entity, component });
            }
        })
    }

    fn destroy(self: Box<Self>, allocator: &dyn Allocator) {
        allocator.deallocate(AllocKind::Component, Self::layout());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Downcast an erased container to its concrete type.
///
/// Containers are keyed by the token of their value type, so a mismatch is a
/// broken invariant and panics.
pub(crate) fn downcast<T: 'static>(container: &dyn ComponentContainer) -> &Container<T> {
    match container.as_any().downcast_ref::<Container<T>>() {
        Some(typed) => typed,
        None => panic!(
            "container keyed as {} holds {}",
            std::any::type_name::<T>(),
            container.component_name()
        ),
    }
}

// ---------------------------------------------------------------------------
// ComponentSet
// ---------------------------------------------------------------------------

/// A set of component types required together: `()`, `(A,)`, `(A, B)`, ...
///
/// The empty set matches every entity.
pub trait ComponentSet: 'static {
    /// One [`Component`] handle per member type.
    type Handles;

    /// Tokens of the member types, in declaration order.
    fn tokens() -> Vec<TypeToken>;

    /// Whether `entity` has every member type.
    fn matches(entity: &Entity) -> bool;

    /// Handles for every member type. Missing members yield null handles.
    fn fetch(entity: &Entity) -> Self::Handles;
}

impl ComponentSet for () {
    type Handles = ();

    fn tokens() -> Vec<TypeToken> {
        Vec::new()
    }

    fn matches(_entity: &Entity) -> bool {
        true
    }

    fn fetch(_entity: &Entity) -> Self::Handles {}
}

macro_rules! impl_component_set {
    ($($ty:ident),+) => {
        impl<$($ty: 'static),+> ComponentSet for ($($ty,)+) {
            type Handles = ($(Component<$ty>,)+);

            fn tokens() -> Vec<TypeToken> {
                vec![$(type_id_of::<$ty>()),+]
            }

            fn matches(entity: &Entity) -> bool {
                $(entity.has::<$ty>())&&+
            }

            fn fetch(entity: &Entity) -> Self::Handles {
                ($(entity.get::<$ty>(),)+)
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
