//! Entity systems and their registration state.
//!
//! A system is logic the world invokes once per [`World::tick`]. Systems are
//! created by the application and handed to the world as `Rc`s; the world
//! tracks whether each one is enabled or disabled and calls its hooks.
//!
//! A registered system is in exactly one of the two lists at any time. Enabled
//! systems tick in registration order; re-enabling a system appends it to the
//! end.

use std::fmt;
use std::rc::Rc;

use crate::world::World;

// ---------------------------------------------------------------------------
// EntitySystem
// ---------------------------------------------------------------------------

/// Polymorphic tick/configure/unconfigure hooks.
///
/// All hooks have empty defaults. Hooks take `&self`; a system that keeps
/// state across ticks holds it in `Cell`/`RefCell` fields, which also lets it
/// listen to events it emits from its own [`tick`](EntitySystem::tick).
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use ironclad_ecs::prelude::*;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Position { x: f32, y: f32 }
///
/// struct Gravity(f32);
///
/// impl EntitySystem for Gravity {
///     fn tick(&self, world: &mut World, dt: f32) {
///         world.each_with::<(Position,)>(false, |_entity, (position,)| {
///             position.with_mut(|p| p.y += self.0 * dt);
///         });
///     }
/// }
///
/// let mut world = World::new();
/// world.register_system(Rc::new(Gravity(-9.8))).unwrap();
/// let id = world.create().unwrap().id();
/// world.assign(id, Position { x: 0.0, y: 0.0 }).unwrap();
///
/// world.tick(0.5);
/// let y = world.get_by_id(id).unwrap().get::<Position>().cloned().unwrap().y;
/// assert!((y + 4.9).abs() < 1e-6);
/// ```
pub trait EntitySystem: 'static {
    /// Called once when the system is registered. Receives the owning `Rc` so
    /// the system can subscribe itself to events.
    fn configure(self: Rc<Self>, world: &mut World) {
        let _ = world;
    }

    /// Called once when the system is unregistered or the world is dropped.
    fn unconfigure(&self, world: &mut World) {
        let _ = world;
    }

    /// Called once per world tick while the system is enabled.
    fn tick(&self, world: &mut World, dt: f32) {
        let _ = (world, dt);
    }

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A registered system.
pub type SystemRef = Rc<dyn EntitySystem>;

fn same_system<S: ?Sized>(registered: &SystemRef, system: &S) -> bool {
    Rc::as_ptr(registered) as *const () == system as *const S as *const ()
}

// ---------------------------------------------------------------------------
// SystemRegistry
// ---------------------------------------------------------------------------

/// Enabled and disabled system lists.
#[derive(Default)]
pub struct SystemRegistry {
    enabled: Vec<SystemRef>,
    disabled: Vec<SystemRef>,
}

impl SystemRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `system` to the enabled list.
    pub(crate) fn push(&mut self, system: SystemRef) {
        self.enabled.push(system);
    }

    /// Remove `system` from whichever list holds it.
    pub(crate) fn remove<S: ?Sized>(&mut self, system: &S) -> Option<SystemRef> {
        for list in [&mut self.enabled, &mut self.disabled] {
            if let Some(pos) = list.iter().position(|s| same_system(s, system)) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    /// Move `system` from the disabled list to the end of the enabled list.
    /// Returns `false` if it was not disabled.
    pub(crate) fn enable<S: ?Sized>(&mut self, system: &S) -> bool {
        Self::transfer(&mut self.disabled, &mut self.enabled, system)
    }

    /// Move `system` from the enabled list to the end of the disabled list.
    /// Returns `false` if it was not enabled.
    pub(crate) fn disable<S: ?Sized>(&mut self, system: &S) -> bool {
        Self::transfer(&mut self.enabled, &mut self.disabled, system)
    }

    fn transfer<S: ?Sized>(from: &mut Vec<SystemRef>, to: &mut Vec<SystemRef>, system: &S) -> bool {
        match from.iter().position(|s| same_system(s, system)) {
            Some(pos) => {
                to.push(from.remove(pos));
                true
            }
            None => false,
        }
    }

    /// Whether `system` is registered and enabled.
    pub fn is_enabled<S: ?Sized>(&self, system: &S) -> bool {
        self.enabled.iter().any(|s| same_system(s, system))
    }

    /// Whether `system` is registered at all.
    pub fn contains<S: ?Sized>(&self, system: &S) -> bool {
        self.is_enabled(system) || self.disabled.iter().any(|s| same_system(s, system))
    }

    /// Enabled systems in tick order.
    pub fn enabled(&self) -> &[SystemRef] {
        &self.enabled
    }

    /// Disabled systems in the order they were disabled.
    pub fn disabled(&self) -> &[SystemRef] {
        &self.disabled
    }

    /// Total registered systems.
    pub fn len(&self) -> usize {
        self.enabled.len() + self.disabled.len()
    }

    /// Whether no systems are registered.
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }

    /// Empty both lists, returning every system (enabled first).
    pub(crate) fn drain(&mut self) -> Vec<SystemRef> {
        let mut all = std::mem::take(&mut self.enabled);
        all.append(&mut self.disabled);
        all
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: &[SystemRef]| list.iter().map(|s| s.name().to_owned()).collect::<Vec<_>>();
        f.debug_struct("SystemRegistry")
            .field("enabled", &names(&self.enabled))
            .field("disabled", &names(&self.disabled))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
