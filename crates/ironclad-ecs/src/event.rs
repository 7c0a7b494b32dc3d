//! Lifecycle events and the typed publish/subscribe registry.
//!
//! Any `'static` type can be an event. The world emits four lifecycle events
//! itself ([`EntityCreated`], [`EntityDestroyed`], [`ComponentAssigned`],
//! [`ComponentRemoved`]); applications emit their own payloads through
//! [`World::emit`](crate::world::World::emit).
//!
//! Listeners are owned by the application. The [`EventBus`] keeps a `Weak`
//! reference per subscription, keyed by the event's [`TypeToken`], so dropping
//! a listener silently ends its subscriptions.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::component::Component;
use crate::entity::EntityId;
use crate::type_registry::{type_id_of, TypeToken};
use crate::world::World;

// ---------------------------------------------------------------------------
// Lifecycle events
// ---------------------------------------------------------------------------

/// An entity was created. Emitted after it joined the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCreated {
    /// The new entity.
    pub entity: EntityId,
}

/// An entity is about to be destroyed.
///
/// The entity is already marked pending-destroy but still in the collection
/// with all of its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDestroyed {
    /// The entity being destroyed.
    pub entity: EntityId,
}

/// A component was assigned, either freshly attached or overwritten in place.
#[derive(Debug)]
pub struct ComponentAssigned<T> {
    /// The entity that received the component.
    pub entity: EntityId,
    /// Handle to the assigned value.
    pub component: Component<T>,
}

/// A component is leaving its entity. The handle is valid for the duration of
/// the notification; the value is destroyed right after.
#[derive(Debug)]
pub struct ComponentRemoved<T> {
    /// The entity losing the component.
    pub entity: EntityId,
    /// Handle to the value being removed.
    pub component: Component<T>,
}

impl<T> Clone for ComponentAssigned<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            component: self.component.clone(),
        }
    }
}

impl<T> Clone for ComponentRemoved<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            component: self.component.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventListener
// ---------------------------------------------------------------------------

/// Receives events of type `E`.
///
/// `receive` takes `&self` so that a listener can be reached again while it is
/// already running (for example, a system that emits an event it also listens
/// to). Keep mutable state in `Cell`/`RefCell` fields and do not hold a borrow
/// across calls back into the world.
pub trait EventListener<E: 'static> {
    /// Handle one event.
    fn receive(&self, world: &mut World, event: &E);
}

/// Address identifying a listener object, independent of which trait object
/// it is viewed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerKey(usize);

impl ListenerKey {
    pub(crate) fn of<L: ?Sized>(listener: &L) -> Self {
        Self(listener as *const L as *const () as usize)
    }

    fn of_weak<L: ?Sized>(listener: &Weak<L>) -> Self {
        Self(Weak::as_ptr(listener) as *const () as usize)
    }
}

// ---------------------------------------------------------------------------
// Subscriber lists
// ---------------------------------------------------------------------------

/// Ordered subscribers for one event type.
struct SubscriberList<E: 'static> {
    listeners: Vec<Weak<dyn EventListener<E>>>,
}

/// The operations the bus performs without knowing the event type.
trait AnySubscriberList {
    fn remove(&mut self, key: ListenerKey);
    fn prune(&mut self);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: 'static> AnySubscriberList for SubscriberList<E> {
    fn remove(&mut self, key: ListenerKey) {
        self.listeners
            .retain(|listener| ListenerKey::of_weak(listener) != key);
    }

    fn prune(&mut self) {
        self.listeners.retain(|listener| listener.strong_count() > 0);
    }

    fn len(&self) -> usize {
        self.listeners.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Event-type-indexed subscriber registry embedded in the world.
///
/// Dispatch itself lives on [`World::emit`](crate::world::World::emit), which
/// needs the world to hand to each listener; the bus only stores and snapshots
/// subscriptions.
#[derive(Default)]
pub struct EventBus {
    lists: HashMap<TypeToken, Box<dyn AnySubscriberList>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn list<E: 'static>(&self) -> Option<&SubscriberList<E>> {
        self.lists
            .get(&type_id_of::<E>())
            .and_then(|list| list.as_any().downcast_ref::<SubscriberList<E>>())
    }

    /// Append `listener` to the subscribers for `E`.
    ///
    /// Subscribing the same listener twice delivers each event to it twice.
    pub fn subscribe<E, L>(&mut self, listener: &Rc<L>)
    where
        E: 'static,
        L: EventListener<E> + 'static,
    {
        let weak: Weak<L> = Rc::downgrade(listener);
        let weak: Weak<dyn EventListener<E>> = weak;
        let list = self
            .lists
            .entry(type_id_of::<E>())
            .or_insert_with(|| {
                Box::new(SubscriberList::<E> {
                    listeners: Vec::new(),
                })
            });
        match list.as_any_mut().downcast_mut::<SubscriberList<E>>() {
            Some(list) => list.listeners.push(weak),
            None => panic!(
                "subscriber list keyed as {} has a different event type",
                std::any::type_name::<E>()
            ),
        }
    }

    /// Remove every subscription of `listener` to `E`. Erases the entry for
    /// `E` once it has no subscribers. Unknown listeners are ignored.
    pub fn unsubscribe<E, L>(&mut self, listener: &L)
    where
        E: 'static,
        L: EventListener<E> + ?Sized,
    {
        let token = type_id_of::<E>();
        if let Some(list) = self.lists.get_mut(&token) {
            list.remove(ListenerKey::of(listener));
            if list.len() == 0 {
                self.lists.remove(&token);
            }
        }
    }

    /// Remove `listener` from every event type's subscribers.
    ///
    /// Pass the listener itself (`&*rc`), not the `Rc` holding it.
    pub fn unsubscribe_all<L: ?Sized>(&mut self, listener: &L) {
        let key = ListenerKey::of(listener);
        self.lists.retain(|_, list| {
            list.remove(key);
            list.len() > 0
        });
    }

    /// The subscribers for `E` at this moment, in subscription order.
    pub(crate) fn snapshot<E: 'static>(&self) -> Vec<Weak<dyn EventListener<E>>> {
        self.list::<E>()
            .map(|list| list.listeners.clone())
            .unwrap_or_default()
    }

    /// Drop subscriptions whose listener no longer exists.
    pub(crate) fn prune<E: 'static>(&mut self) {
        let token = type_id_of::<E>();
        if let Some(list) = self.lists.get_mut(&token) {
            list.prune();
            if list.len() == 0 {
                self.lists.remove(&token);
            }
        }
    }

    /// Number of subscriptions to `E`, including ones whose listener has been
    /// dropped but not yet pruned.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.list::<E>().map_or(0, |list| list.listeners.len())
    }

    /// Whether `listener` is subscribed to `E`.
    pub fn is_subscribed<E: 'static, L: ?Sized>(&self, listener: &L) -> bool {
        let key = ListenerKey::of(listener);
        self.list::<E>().is_some_and(|list| {
            list.listeners
                .iter()
                .any(|weak| ListenerKey::of_weak(weak) == key)
        })
    }

    /// Number of event types with at least one subscription.
    pub fn event_type_count(&self) -> usize {
        self.lists.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.lists.iter().map(|(token, list)| (token, list.len())))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
