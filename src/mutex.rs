//! An exclusive word lock over a futex.
//!
//! This is the writer-exclusion lock used throughout the crate wherever the
//! reader-writer protocols need plain mutual exclusion: between writers,
//! between a writer and newly-registering readers, and as the building block
//! of the lock-and-event semaphores.

use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicU32;
use crate::cfg::futex;
use crate::cfg::hint;
use crate::lock::RawRwLock;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// How many times an acquisition spins before sleeping on the futex.
const SPIN_LIMIT: u32 = 100;

/// A blocking mutual-exclusion word lock.
///
/// The state distinguishes a contended lock from a merely held one, so the
/// uncontended path makes no syscall in either direction: one compare-exchange
/// to acquire, one swap to release, and a wake is only issued when someone is
/// known to be sleeping.
///
/// There is no poisoning and no ownership tracking; [`unlock`] is `unsafe`
/// and must only be called by the holder.
///
/// [`unlock`]: RawMutex::unlock
#[derive(Debug)]
pub struct RawMutex {
    state: AtomicU32,
}

impl RawMutex {
    /// Creates the lock, unlocked.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn new() -> Self {
        Self { state: AtomicU32::new(UNLOCKED) }
    }

    /// Creates the lock with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    pub fn new() -> Self {
        Self { state: AtomicU32::new(UNLOCKED) }
    }

    /// Acquires the lock, blocking the calling thread until it is free.
    pub fn lock(&self) {
        if self.state.compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed).is_err() {
            self.lock_contended();
        }
    }

    #[cold]
    fn lock_contended(&self) {
        // A short spin covers the common case of a holder that is about to
        // leave; only check for LOCKED, CONTENDED means others gave up too.
        let mut spins = 0;
        while self.state.load(Relaxed) == LOCKED && spins < SPIN_LIMIT {
            spins += 1;
            hint::spin_loop();
        }

        if self.state.compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed).is_ok() {
            return;
        }

        // Mark the lock contended on every attempt so the holder knows a
        // wake is required, then sleep until it hands the state over.
        while self.state.swap(CONTENDED, Acquire) != UNLOCKED {
            futex::wait(&self.state, CONTENDED);
        }
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock.
    pub unsafe fn unlock(&self) {
        if self.state.swap(UNLOCKED, Release) == CONTENDED {
            futex::wake_one(&self.state);
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

// A plain mutex is a degenerate reader-writer lock whose shared side aliases
// its exclusive side. This gives the benchmarks their single-holder baseline.
unsafe impl RawRwLock for RawMutex {
    fn new() -> Self {
        Self::new()
    }

    fn read_lock(&self) {
        self.lock();
    }

    unsafe fn read_unlock(&self) {
        // SAFETY: guaranteed by the caller.
        unsafe { self.unlock() }
    }

    fn write_lock(&self) {
        self.lock();
    }

    unsafe fn write_unlock(&self) {
        // SAFETY: guaranteed by the caller.
        unsafe { self.unlock() }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use core::cell::UnsafeCell;
    use std::thread;

    use super::RawMutex;
    use crate::test::tests;

    struct Guarded {
        mutex: RawMutex,
        value: UnsafeCell<usize>,
    }

    // SAFETY: `value` is only touched while `mutex` is held.
    unsafe impl Sync for Guarded {}

    #[test]
    fn uncontended_roundtrip() {
        let mutex = RawMutex::new();
        mutex.lock();
        unsafe { mutex.unlock() };
        mutex.lock();
        unsafe { mutex.unlock() };
    }

    #[test]
    fn guards_a_counter() {
        const THREADS: usize = 4;
        const ITERS: usize = 10_000;

        let guarded = Guarded { mutex: RawMutex::new(), value: UnsafeCell::new(0) };

        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    let guarded = &guarded;
                    for _ in 0..ITERS {
                        guarded.mutex.lock();
                        // SAFETY: the mutex serializes every access.
                        unsafe { *guarded.value.get() += 1 };
                        unsafe { guarded.mutex.unlock() };
                    }
                });
            }
        });

        assert_eq!(guarded.value.into_inner(), THREADS * ITERS);
    }

    #[test]
    fn exclusion_as_rwlock() {
        tests::exclusion::<RawMutex>(2, 2);
    }
}

#[cfg(all(loom, test))]
mod model {
    use loom::cell::UnsafeCell;
    use loom::sync::Arc;
    use loom::thread;

    use super::RawMutex;

    struct Guarded {
        mutex: RawMutex,
        value: UnsafeCell<u32>,
    }

    // SAFETY: `value` is only touched while `mutex` is held.
    unsafe impl Sync for Guarded {}

    impl Guarded {
        fn increment(&self) {
            self.mutex.lock();
            self.value.with_mut(|value| unsafe { *value += 1 });
            unsafe { self.mutex.unlock() };
        }
    }

    #[test]
    fn two_increments() {
        loom::model(|| {
            let guarded = Arc::new(Guarded {
                mutex: RawMutex::new(),
                value: UnsafeCell::new(0),
            });

            let handle = {
                let guarded = Arc::clone(&guarded);
                thread::spawn(move || guarded.increment())
            };

            guarded.increment();
            handle.join().unwrap();

            guarded.mutex.lock();
            guarded.value.with(|value| assert_eq!(unsafe { *value }, 2));
            unsafe { guarded.mutex.unlock() };
        });
    }
}
