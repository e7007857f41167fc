//! RAII data protection over any [`RawRwLock`].

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use crate::lock::RawRwLock;

/// A reader-writer mutex protecting data of type `T` with the locking
/// protocol `R`.
///
/// Shared access is handed out through [`read`], exclusive access through
/// [`write`]; both return guards that release on drop. The guards are the
/// safe surface over the raw protocol's unsafe unlock operations.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use urwlock::{FastRwLock, RwMutex};
///
/// let counter = Arc::new(RwMutex::<u32, FastRwLock>::new(0));
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let counter = Arc::clone(&counter);
///         thread::spawn(move || {
///             for _ in 0..100 {
///                 *counter.write() += 1;
///             }
///             let value = *counter.read();
///             assert!(value >= 100);
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert_eq!(*counter.read(), 400);
/// ```
///
/// [`read`]: RwMutex::read
/// [`write`]: RwMutex::write
pub struct RwMutex<T: ?Sized, R> {
    raw: R,
    data: UnsafeCell<T>,
}

// Same unsafe impls as `std::sync::RwLock`.
unsafe impl<T: ?Sized + Send, R: Send> Send for RwMutex<T, R> {}
unsafe impl<T: ?Sized + Send + Sync, R: Sync> Sync for RwMutex<T, R> {}

impl<T, R: RawRwLock> RwMutex<T, R> {
    /// Creates a new mutex in an unlocked state ready for use.
    pub fn new(value: T) -> Self {
        Self { raw: R::new(), data: UnsafeCell::new(value) }
    }

    /// Consumes this mutex, returning the underlying data.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, R: RawRwLock> RwMutex<T, R> {
    /// Acquires shared access, blocking the calling thread until no writer
    /// is active.
    ///
    /// The protocol decides how this interacts with pending writers; the
    /// reader-preferential variants retract and wait whenever a writer has
    /// raised its flag.
    #[inline]
    pub fn read(&self) -> ReadGuard<'_, T, R> {
        self.raw.read_lock();
        ReadGuard { lock: self, not_send: PhantomData }
    }

    /// Acquires exclusive access, blocking the calling thread until every
    /// reader and writer has left.
    #[inline]
    pub fn write(&self) -> WriteGuard<'_, T, R> {
        self.raw.write_lock();
        WriteGuard { lock: self, not_send: PhantomData }
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the mutex mutably, no locking takes place.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: the exclusive borrow guarantees there are no guards.
        unsafe { &mut *self.data.get() }
    }
}

impl<T: Default, R: RawRwLock> Default for RwMutex<T, R> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T, R: RawRwLock> From<T> for RwMutex<T, R> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized, R> fmt::Debug for RwMutex<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // There is no try-lock in the contract, so the data cannot be
        // sampled without risking a block.
        f.debug_struct("RwMutex").finish_non_exhaustive()
    }
}

/// Shared access to the data of an [`RwMutex`], released on drop.
///
/// Several protocols keep their reader bookkeeping in thread-local state,
/// so the guard is `!Send`: it must be dropped on the thread that acquired
/// it.
#[must_use = "if unused the lock is immediately released"]
pub struct ReadGuard<'a, T: ?Sized, R: RawRwLock> {
    lock: &'a RwMutex<T, R>,
    // Reader state is thread-affine.
    not_send: PhantomData<*mut ()>,
}

impl<T: ?Sized, R: RawRwLock> Deref for ReadGuard<'_, T, R> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: a live guard holds the shared side.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, R: RawRwLock> Drop for ReadGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: this guard was created by `read` on this thread and is
        // released exactly once, here.
        unsafe { self.lock.raw.read_unlock() }
    }
}

impl<T: ?Sized + fmt::Debug, R: RawRwLock> fmt::Debug for ReadGuard<'_, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Exclusive access to the data of an [`RwMutex`], released on drop.
#[must_use = "if unused the lock is immediately released"]
pub struct WriteGuard<'a, T: ?Sized, R: RawRwLock> {
    lock: &'a RwMutex<T, R>,
    // Writer hand-off is thread-affine in some protocols.
    not_send: PhantomData<*mut ()>,
}

impl<T: ?Sized, R: RawRwLock> Deref for WriteGuard<'_, T, R> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: a live guard holds the exclusive side.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized, R: RawRwLock> DerefMut for WriteGuard<'_, T, R> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: a live guard holds the exclusive side.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized, R: RawRwLock> Drop for WriteGuard<'_, T, R> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: this guard was created by `write` on this thread and is
        // released exactly once, here.
        unsafe { self.lock.raw.write_unlock() }
    }
}

impl<T: ?Sized + fmt::Debug, R: RawRwLock> fmt::Debug for WriteGuard<'_, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use std::thread;

    use super::RwMutex;
    use crate::biased::FastRwLock;
    use crate::fair::QueuedFairRwLock;

    #[derive(Eq, PartialEq, Debug)]
    struct NonCopy(u32);

    #[test]
    fn smoke() {
        let mutex = RwMutex::<u32, FastRwLock>::new(1);
        drop(mutex.read());
        drop(mutex.write());
        drop(mutex.read());
        drop(mutex.write());
    }

    #[test]
    fn lots_and_lots() {
        const ITERS: u32 = 1000;
        const CONCURRENCY: u32 = 3;

        let mutex = Arc::new(RwMutex::<u32, QueuedFairRwLock>::new(0));

        let (tx, rx) = channel();
        for _ in 0..CONCURRENCY {
            let (mutex_a, tx_a) = (Arc::clone(&mutex), tx.clone());
            thread::spawn(move || {
                for _ in 0..ITERS {
                    *mutex_a.write() += 1;
                }
                tx_a.send(()).unwrap();
            });
            let (mutex_b, tx_b) = (Arc::clone(&mutex), tx.clone());
            thread::spawn(move || {
                for _ in 0..ITERS {
                    let _ = *mutex_b.read();
                }
                tx_b.send(()).unwrap();
            });
        }

        drop(tx);
        for _ in 0..2 * CONCURRENCY {
            rx.recv().unwrap();
        }
        assert_eq!(*mutex.read(), ITERS * CONCURRENCY);
    }

    #[test]
    fn into_inner_and_get_mut() {
        let mut mutex = RwMutex::<NonCopy, FastRwLock>::new(NonCopy(10));
        *mutex.get_mut() = NonCopy(20);
        assert_eq!(mutex.into_inner(), NonCopy(20));
    }

    #[test]
    fn unsized_data() {
        let mutex: &RwMutex<[u32], FastRwLock> = &RwMutex::new([1, 2, 3]);
        {
            let mut guard = mutex.write();
            guard[0] = 4;
            guard[2] = 5;
        }
        let expected: &[u32] = &[4, 2, 5];
        assert_eq!(&*mutex.read(), expected);
    }

    #[test]
    fn guard_debug() {
        let mutex = RwMutex::<u32, FastRwLock>::new(7);
        assert_eq!(format!("{:?}", mutex.read()), "7");
        assert_eq!(format!("{:?}", mutex.write()), "7");
    }
}
