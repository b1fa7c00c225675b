//! Re-exports of `parking_lot` primitives.
//!
//! Kept as a thin indirection layer, rather than depending on `parking_lot`
//! directly from every crate, so the lock implementation can be swapped in
//! one place.

pub use parking_lot::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
