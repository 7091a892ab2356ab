//! Weak Handle Module
//!
//! Non-owning references from cache entries back to the store holding them.

use std::fmt;
use std::sync::{Arc, Weak};

// == Weak Handle ==
/// Reference to a shared target that does not keep it alive.
///
/// The `Pinned` mode holds a strong reference instead. It never reports the
/// target as dead, so anything reachable through it stays allocated until the
/// handle itself is dropped.
pub enum WeakHandle<T: ?Sized> {
    /// Non-owning reference
    Weak(Weak<T>),
    /// Strong fallback reference
    Pinned(Arc<T>),
}

impl<T: ?Sized> WeakHandle<T> {
    // == Constructors ==
    /// Creates a non-owning handle to `target`.
    pub fn new(target: &Arc<T>) -> Self {
        Self::Weak(Arc::downgrade(target))
    }

    /// Creates a handle that keeps `target` alive.
    pub fn pinned(target: &Arc<T>) -> Self {
        Self::Pinned(Arc::clone(target))
    }

    // == Resolve ==
    /// Returns the target, or None once it has been reclaimed.
    pub fn resolve(&self) -> Option<Arc<T>> {
        match self {
            Self::Weak(weak) => weak.upgrade(),
            Self::Pinned(strong) => Some(Arc::clone(strong)),
        }
    }

    // == Is Dead ==
    /// Checks whether the target has been reclaimed.
    pub fn is_dead(&self) -> bool {
        match self {
            Self::Weak(weak) => weak.strong_count() == 0,
            Self::Pinned(_) => false,
        }
    }

    /// Returns true for the strong fallback mode.
    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned(_))
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Weak(weak) => Self::Weak(Weak::clone(weak)),
            Self::Pinned(strong) => Self::Pinned(Arc::clone(strong)),
        }
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("pinned", &self.is_pinned())
            .field("dead", &self.is_dead())
            .finish()
    }
}
