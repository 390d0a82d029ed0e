//! Lock aliases so the rest of the workspace does not name `parking_lot`
//! directly.

/// A synchronous mutex.
pub type SyncMutex<T> = parking_lot::Mutex<T>;
/// A synchronous read-write lock.
pub type SyncRwLock<T> = parking_lot::RwLock<T>;
/// A condition variable paired with [`SyncMutex`].
pub type Condvar = parking_lot::Condvar;
