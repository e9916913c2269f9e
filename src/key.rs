//! Stable identity for component and relationship types.

use std::any::{self, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

/// A stable key identifying a component (or relationship) type.
///
/// Backed by [`TypeId`] for correctness (two `ComponentKey`s are equal iff they
/// were built from the same concrete type) with a `&'static str` name carried
/// alongside for debug output and friendly-name introspection.
#[derive(Clone, Copy)]
pub struct ComponentKey {
    tid: TypeId,
    type_name: &'static str,
}

impl ComponentKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            tid: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
        }
    }

    /// Build a key from a trait-object reference (`&dyn Component`, `&dyn Any`, ...) rather
    /// than a statically-known type, for code that only has the erased value in hand.
    pub fn of_val<T: ?Sized + any::Any>(val: &T) -> Self {
        Self {
            tid: val.type_id(),
            type_name: any::type_name_of_val(val),
        }
    }

    /// Best-effort friendly name: the last `::`-separated segment of the type path.
    pub fn friendly_name(&self) -> &'static str {
        self.type_name.split("::").last().unwrap_or(self.type_name)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.tid == other.tid
    }
}

impl Eq for ComponentKey {}

impl PartialOrd for ComponentKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tid.cmp(&other.tid)
    }
}

impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tid.hash(state);
    }
}

impl Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentKey").field(&self.type_name).finish()
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.friendly_name())
    }
}

/// Key for a relationship's forward/reverse index entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RelationKey(pub ComponentKey);

impl RelationKey {
    pub fn of<T: 'static>() -> Self {
        Self(ComponentKey::of::<T>())
    }
}
