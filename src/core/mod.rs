// src/core/mod.rs

pub mod node;
pub mod parameters;
pub mod reader;
pub mod registry;
pub mod types;
pub mod usage;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A poisoned lock means a handler panicked somewhere; the tree data itself
// stays consistent, so keep serving it.
pub(crate) fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
