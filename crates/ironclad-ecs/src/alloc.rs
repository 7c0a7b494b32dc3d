//! Injected allocation capability.
//!
//! A [`World`](crate::world::World) is built around one [`Allocator`]. Every
//! entity, every component container and every registered system is requested
//! from it before the world takes ownership and released to it when the world
//! lets go. A single capability serves all of these: each request carries the
//! [`Layout`] of the concrete type being stored, so a container for `Position`
//! and a container for `Rotation` are separate, correctly-sized requests.
//!
//! The backing memory itself comes from the global heap. The capability
//! decides whether an allocation may proceed and tracks what is live, which is
//! what budgeted or instrumented worlds need.

use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AllocKind
// ---------------------------------------------------------------------------

/// What an allocation request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocKind {
    /// An [`Entity`](crate::entity::Entity) record.
    Entity,
    /// A component container holding one component value.
    Component,
    /// A registered [`EntitySystem`](crate::system::EntitySystem).
    System,
}

impl fmt::Display for AllocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocKind::Entity => f.write_str("entity"),
            AllocKind::Component => f.write_str("component"),
            AllocKind::System => f.write_str("system"),
        }
    }
}

// ---------------------------------------------------------------------------
// AllocError
// ---------------------------------------------------------------------------

/// The allocator refused a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("allocator refused {kind} allocation of {requested} bytes ({live} of {capacity} bytes live)")]
pub struct AllocError {
    /// What the request was for.
    pub kind: AllocKind,
    /// Size of the refused request.
    pub requested: usize,
    /// Bytes live at the time of the request.
    pub live: usize,
    /// Budget of the allocator.
    pub capacity: usize,
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// Allocation capability injected into a world.
///
/// Methods take `&self`; implementations that keep counters use interior
/// mutability. The world is single-threaded, so `Cell` is sufficient.
pub trait Allocator: fmt::Debug {
    /// Request room for one value with the given layout.
    fn allocate(&self, kind: AllocKind, layout: Layout) -> Result<(), AllocError>;

    /// Release a value previously granted by [`allocate`](Allocator::allocate)
    /// with the same kind and layout.
    fn deallocate(&self, kind: AllocKind, layout: Layout);
}

/// The default capability: every request is granted.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    #[inline]
    fn allocate(&self, _kind: AllocKind, _layout: Layout) -> Result<(), AllocError> {
        Ok(())
    }

    #[inline]
    fn deallocate(&self, _kind: AllocKind, _layout: Layout) {}
}

// ---------------------------------------------------------------------------
// BoundedAllocator
// ---------------------------------------------------------------------------

/// Live allocation counts reported by [`BoundedAllocator::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocStats {
    /// Live entity records.
    pub entities: usize,
    /// Live component containers.
    pub components: usize,
    /// Live system registrations.
    pub systems: usize,
    /// Bytes currently live across all kinds.
    pub live_bytes: usize,
    /// Highest value `live_bytes` has reached.
    pub peak_bytes: usize,
    /// Requests refused because they would exceed the budget.
    pub refused: usize,
}

/// An allocator with a fixed byte budget that tracks live allocations.
///
/// Releasing more than was granted is an accounting bug in the caller and
/// panics.
#[derive(Debug)]
pub struct BoundedAllocator {
    capacity: usize,
    stats: Cell<AllocStats>,
}

impl BoundedAllocator {
    /// Create an allocator that grants at most `capacity` live bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            stats: Cell::new(AllocStats::default()),
        }
    }

    /// An allocator with no effective budget, useful purely for accounting.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// The byte budget.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the live counters.
    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    /// Number of live allocations of `kind`.
    pub fn live(&self, kind: AllocKind) -> usize {
        let stats = self.stats.get();
        match kind {
            AllocKind::Entity => stats.entities,
            AllocKind::Component => stats.components,
            AllocKind::System => stats.systems,
        }
    }
}

impl Allocator for BoundedAllocator {
    fn allocate(&self, kind: AllocKind, layout: Layout) -> Result<(), AllocError> {
        let mut stats = self.stats.get();
        let size = layout.size();
        let next = match stats.live_bytes.checked_add(size) {
            Some(next) if next <= self.capacity => next,
            _ => {
                stats.refused += 1;
                self.stats.set(stats);
                tracing::warn!(%kind, requested = size, live = stats.live_bytes, capacity = self.capacity, "allocation refused");
                return Err(AllocError {
                    kind,
                    requested: size,
                    live: stats.live_bytes,
                    capacity: self.capacity,
                });
            }
        };
        stats.live_bytes = next;
        stats.peak_bytes = stats.peak_bytes.max(next);
        match kind {
            AllocKind::Entity => stats.entities += 1,
            AllocKind::Component => stats.components += 1,
            AllocKind::System => stats.systems += 1,
        }
        self.stats.set(stats);
        Ok(())
    }

    fn deallocate(&self, kind: AllocKind, layout: Layout) {
        let mut stats = self.stats.get();
        let count = match kind {
            AllocKind::Entity => &mut stats.entities,
            AllocKind::Component => &mut stats.components,
            AllocKind::System => &mut stats.systems,
        };
        *count = match count.checked_sub(1) {
            Some(remaining) => remaining,
            None => panic!("{kind} deallocation without a matching allocation"),
        };
        stats.live_bytes = match stats.live_bytes.checked_sub(layout.size()) {
            Some(remaining) => remaining,
            None => panic!("{kind} deallocation of {} bytes exceeds live bytes", layout.size()),
        };
        self.stats.set(stats);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
