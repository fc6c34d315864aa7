//! Reader-writer lock with a writer-preferring policy.
//!
//! Any number of readers may hold the lock simultaneously; a writer is
//! exclusive against readers and other writers. **Starvation policy:**
//! writers are preferred — once a writer is waiting, newly arriving
//! readers park until every pending writer has been serviced. Without
//! this, a steady stream of readers would starve writers indefinitely.
//!
//! # Examples
//!
//! ```
//! use synckit_primitives::ReadWriteLock;
//!
//! let lock = ReadWriteLock::new(vec![1, 2, 3]);
//!
//! {
//!     let first = lock.read();
//!     let second = lock.read();
//!     assert_eq!(first.len() + second.len(), 6);
//! }
//!
//! lock.write().push(4);
//! assert_eq!(lock.read().len(), 4);
//! ```

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
struct RwState {
    active_readers: usize,
    writer_active: bool,
    waiting_writers: usize,
}

/// A writer-preferring reader-writer lock protecting a value of type `T`.
pub struct ReadWriteLock<T: ?Sized> {
    state: Mutex<RwState>,
    readers_gate: Condvar,
    writers_gate: Condvar,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for ReadWriteLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for ReadWriteLock<T> {}

/// Shared read access; released on drop.
pub struct ReadGuard<'a, T: ?Sized + 'a> {
    lock: &'a ReadWriteLock<T>,
}

/// Exclusive write access; released on drop.
pub struct WriteGuard<'a, T: ?Sized + 'a> {
    lock: &'a ReadWriteLock<T>,
}

impl<T> ReadWriteLock<T> {
    /// Creates an unlocked reader-writer lock holding `data`.
    #[must_use]
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(RwState::default()),
            readers_gate: Condvar::new(),
            writers_gate: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Consumes the lock and returns the protected value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> ReadWriteLock<T> {
    /// Acquires shared read access, blocking while a writer is active
    /// or waiting.
    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut state = self.lock_state();
        while state.writer_active || state.waiting_writers > 0 {
            state = self
                .readers_gate
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.active_readers += 1;
        drop(state);
        ReadGuard { lock: self }
    }

    /// Acquires exclusive write access, blocking while readers or
    /// another writer hold the lock.
    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.lock_state();
        state.waiting_writers += 1;
        while state.writer_active || state.active_readers > 0 {
            state = self
                .writers_gate
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.waiting_writers -= 1;
        state.writer_active = true;
        drop(state);
        WriteGuard { lock: self }
    }

    /// Takes read access only when that is possible immediately.
    ///
    /// Fails while a writer is active or waiting, honoring writer
    /// preference.
    pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
        let mut state = self.lock_state();
        if state.writer_active || state.waiting_writers > 0 {
            return None;
        }
        state.active_readers += 1;
        drop(state);
        Some(ReadGuard { lock: self })
    }

    /// Takes write access only when that is possible immediately.
    pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
        let mut state = self.lock_state();
        if state.writer_active || state.active_readers > 0 {
            return None;
        }
        state.writer_active = true;
        drop(state);
        Some(WriteGuard { lock: self })
    }

    /// Number of readers currently holding the lock.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.lock_state().active_readers
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// No locking is needed: `&mut self` proves exclusive access.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn release_read(&self) {
        let mut state = self.lock_state();
        state.active_readers -= 1;
        let wake_writer = state.active_readers == 0 && state.waiting_writers > 0;
        drop(state);
        if wake_writer {
            self.writers_gate.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.lock_state();
        state.writer_active = false;
        let writers_pending = state.waiting_writers > 0;
        drop(state);
        if writers_pending {
            self.writers_gate.notify_one();
        } else {
            self.readers_gate.notify_all();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RwState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Default> Default for ReadWriteLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for ReadWriteLock<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for ReadWriteLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = f.debug_struct("ReadWriteLock");
        match self.try_read() {
            Some(guard) => output.field("data", &&*guard),
            None => output.field("data", &format_args!("<locked>")),
        };
        output.finish_non_exhaustive()
    }
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: a read guard exists only while active_readers counts
        // this thread, which excludes any writer.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: a write guard exists only while writer_active is set,
        // which excludes every reader and other writer.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for Deref; the write guard is exclusive.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for WriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// `WHY`: Validates concurrent shared access
    /// `WHAT`: Two read guards may be held at the same time
    #[test]
    fn test_concurrent_readers() {
        let lock = ReadWriteLock::new(5_u32);
        let first = lock.read();
        let second = lock.read();
        assert_eq!(*first + *second, 10);
        assert_eq!(lock.reader_count(), 2);
    }

    /// `WHY`: Validates writer exclusivity
    /// `WHAT`: try_write fails while a reader holds the lock
    #[test]
    fn test_writer_excluded_by_reader() {
        let lock = ReadWriteLock::new(0_u32);
        let reader = lock.read();
        assert!(lock.try_write().is_none());
        drop(reader);
        assert!(lock.try_write().is_some());
    }

    /// `WHY`: Validates reader exclusion during writes
    /// `WHAT`: try_read fails while a writer holds the lock
    #[test]
    fn test_reader_excluded_by_writer() {
        let lock = ReadWriteLock::new(0_u32);
        let writer = lock.write();
        assert!(lock.try_read().is_none());
        drop(writer);
        assert!(lock.try_read().is_some());
    }

    /// `WHY`: Validates the writer-preference policy
    /// `WHAT`: A new reader parks while a writer is waiting
    #[test]
    fn test_writer_preference() {
        let lock = Arc::new(ReadWriteLock::new(0_u32));
        let reader = lock.read();

        let writer_lock = Arc::clone(&lock);
        let writer = thread::spawn(move || {
            let mut value = writer_lock.write();
            *value += 1;
        });

        // let the writer park behind the active reader
        thread::sleep(Duration::from_millis(30));
        assert!(lock.try_read().is_none());

        drop(reader);
        writer.join().unwrap();
        assert_eq!(*lock.read(), 1);
    }

    /// `WHY`: Validates writes are serialized with reads under load
    /// `WHAT`: The final value reflects every write exactly once
    #[test]
    fn test_mixed_contention() {
        let lock = Arc::new(ReadWriteLock::new(0_usize));
        let reads = Arc::new(AtomicUsize::new(0));
        let writers = 4;
        let writes_per_thread = 250;

        let mut handles = Vec::new();
        for _ in 0..writers {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..writes_per_thread {
                    *lock.write() += 1;
                }
            }));
        }
        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            let reads = Arc::clone(&reads);
            handles.push(thread::spawn(move || {
                for _ in 0..writes_per_thread {
                    let _observed = *lock.read();
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.read(), writers * writes_per_thread);
        assert_eq!(reads.load(Ordering::Relaxed), 2 * writes_per_thread);
    }

    /// `WHY`: Validates exclusive access through &mut
    /// `WHAT`: get_mut and into_inner expose the protected value
    #[test]
    fn test_get_mut_and_into_inner() {
        let mut lock = ReadWriteLock::new(1_u32);
        *lock.get_mut() = 9;
        assert_eq!(lock.into_inner(), 9);
    }
}
