//! Process-wide type identity tokens.
//!
//! Components and events are distinguished by a [`TypeToken`], obtained from
//! [`type_id_of`]. The token for a given type is the same everywhere within one
//! process run; it is not stable across builds and must never be persisted.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// ---------------------------------------------------------------------------
// TypeToken
// ---------------------------------------------------------------------------

/// Opaque, totally-ordered, hashable identity of a compile-time type.
///
/// Equality, ordering and hashing use only the underlying [`TypeId`]; the type
/// name is carried for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    /// Human-readable name of the type this token identifies.
    #[inline]
    pub fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl PartialOrd for TypeToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeToken({})", self.name)
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Returns the identity token for `T`.
///
/// Pure and callable from anywhere without prior registration.
#[inline]
pub fn type_id_of<T: ?Sized + 'static>() -> TypeToken {
    TypeToken {
        id: TypeId::of::<T>(),
        name: std::any::type_name::<T>(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
