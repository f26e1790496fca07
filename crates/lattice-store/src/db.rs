//! Snapshot database with serialized writers.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// An in-memory database over a cloneable state `S`.
///
/// Readers receive an `Arc` snapshot of the state at the moment they begin
/// and are never blocked by writers. Writers serialize on an internal
/// mutex, mutate a private clone of the state, and publish it atomically
/// on commit; dropping a write transaction without committing discards the
/// clone.
pub struct Database<S> {
    state: RwLock<Arc<S>>,
    writer: Mutex<()>,
}

impl<S: Clone> Database<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
        }
    }

    /// Begin a read transaction observing a consistent snapshot. Multiple
    /// read transactions may coexist, and each remains valid for its own
    /// lifetime regardless of later commits.
    pub fn read(&self) -> ReadTransaction<S> {
        ReadTransaction {
            snapshot: Arc::clone(&self.state.read()),
        }
    }

    /// Begin a read/write transaction. At most one uncommitted writer
    /// exists at a time; a second caller blocks here until the first
    /// commits or aborts.
    pub fn write(&self) -> WriteTransaction<'_, S> {
        let guard = self.writer.lock();
        let working = S::clone(&self.state.read());
        WriteTransaction {
            db: self,
            _writer: guard,
            working,
        }
    }
}

/// A consistent snapshot of the database state.
pub struct ReadTransaction<S> {
    snapshot: Arc<S>,
}

impl<S> Deref for ReadTransaction<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.snapshot
    }
}

/// An exclusive transaction over a working copy of the state.
pub struct WriteTransaction<'a, S: Clone> {
    db: &'a Database<S>,
    _writer: MutexGuard<'a, ()>,
    working: S,
}

impl<S: Clone> WriteTransaction<'_, S> {
    /// Atomically publish all writes. Read transactions begun before this
    /// call keep their pre-commit snapshot.
    pub fn commit(self) {
        *self.db.state.write() = Arc::new(self.working);
    }

    /// Discard all writes. Dropping the transaction has the same effect.
    pub fn abort(self) {}
}

impl<S: Clone> Deref for WriteTransaction<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.working
    }
}

impl<S: Clone> DerefMut for WriteTransaction<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.working
    }
}
