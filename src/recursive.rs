//! A hand-rolled recursive exclusive lock.

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};
use std::sync::atomic::AtomicUsize;

use crate::cfg::atomic::{AtomicPtr, AtomicU32};
use crate::event::Event;
use crate::lock::RawRwLock;

/// Source of never-reused per-thread identities; 0 means "no owner".
static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static THREAD_ID: usize = NEXT_THREAD_ID.fetch_add(1, Relaxed);
}

fn current_thread_id() -> usize {
    THREAD_ID.with(|id| *id)
}

/// A mutual-exclusion lock the holding thread may re-acquire.
///
/// An arrival counter doubles as the lock word: the thread that moves it
/// from zero owns the lock, later arrivals sleep on a hand-off event that
/// the leaving owner signals. Re-entry by the owner only bumps an
/// owner-private recursion counter. The hand-off event is the only piece of
/// state that costs an allocation, so it is created lazily on first
/// contention: racers publish their candidate with a compare-and-swap and
/// the losers free theirs.
///
/// The recursion test reads the arrival counter and the owner id as two
/// separate atomics. That is sound because the owner id is only ever our
/// own id if we stored it and have not yet fully unlocked — only the owner
/// clears it — and the acquire load of the counter orders the pair.
///
/// As everywhere in this crate, [`unlock`] is `unsafe` and owner-only, and
/// the read side of the [`RawRwLock`] impl aliases the write side.
///
/// # Examples
///
/// ```
/// use urwlock::RecursiveMutex;
///
/// static LOCK: RecursiveMutex = RecursiveMutex::new();
///
/// LOCK.lock();
/// LOCK.lock(); // re-entry by the owner succeeds
/// unsafe {
///     LOCK.unlock();
///     LOCK.unlock();
/// }
/// ```
///
/// [`unlock`]: RecursiveMutex::unlock
pub struct RecursiveMutex {
    /// Holder plus waiters; the 0 -> 1 transition is ownership.
    thread_count: AtomicU32,
    owner: AtomicUsize,
    /// Written only by the current owner.
    recursion: UnsafeCell<u32>,
    /// Lazily created auto-reset hand-off event.
    event: AtomicPtr<Event>,
}

// SAFETY: `recursion` is only touched by the thread that holds the lock.
unsafe impl Send for RecursiveMutex {}
unsafe impl Sync for RecursiveMutex {}

impl RecursiveMutex {
    /// Creates the lock, unlocked.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            thread_count: AtomicU32::new(0),
            owner: AtomicUsize::new(0),
            recursion: UnsafeCell::new(0),
            event: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Creates the lock with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    pub fn new() -> Self {
        Self {
            thread_count: AtomicU32::new(0),
            owner: AtomicUsize::new(0),
            recursion: UnsafeCell::new(0),
            event: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Acquires the lock, blocking unless it is free or already held by the
    /// calling thread.
    pub fn lock(&self) {
        let tid = current_thread_id();

        if self.thread_count.load(Acquire) != 0 && self.owner.load(Relaxed) == tid {
            // Re-entry by the owner.
            // SAFETY: we hold the lock.
            unsafe { *self.recursion.get() += 1 };
            return;
        }

        if self.thread_count.fetch_add(1, AcqRel) == 0 {
            // Moved the counter from zero: the lock is ours.
            self.owner.store(tid, Relaxed);
            // SAFETY: we hold the lock.
            unsafe { *self.recursion.get() = 1 };
            return;
        }

        self.hand_off().wait();
        self.owner.store(tid, Relaxed);
        // SAFETY: the hand-off signal carried ownership to us.
        unsafe { *self.recursion.get() = 1 };
    }

    /// Releases one level of the lock; the final release wakes one waiter
    /// if any have arrived.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock.
    pub unsafe fn unlock(&self) {
        // SAFETY: the caller holds the lock.
        let recursion = unsafe { &mut *self.recursion.get() };
        *recursion -= 1;
        if *recursion == 0 {
            self.owner.store(0, Relaxed);
            if self.thread_count.fetch_sub(1, AcqRel) > 1 {
                // Someone is waiting; pass the lock on.
                self.hand_off().set();
            }
        }
    }

    /// The hand-off event, created on first use.
    fn hand_off(&self) -> &Event {
        let ptr = self.event.load(Acquire);
        if !ptr.is_null() {
            // SAFETY: a published event is never freed before the lock is.
            return unsafe { &*ptr };
        }

        let fresh = Box::into_raw(Box::new(Event::auto(false)));
        match self.event.compare_exchange(ptr::null_mut(), fresh, AcqRel, Acquire) {
            // SAFETY: just published.
            Ok(_) => unsafe { &*fresh },
            Err(winner) => {
                // Lost the publish race; free ours, use the winner's.
                // SAFETY: `fresh` came out of `Box::into_raw` above and was
                // never shared.
                drop(unsafe { Box::from_raw(fresh) });
                // SAFETY: a published event is never freed before the lock is.
                unsafe { &*winner }
            }
        }
    }
}

impl Drop for RecursiveMutex {
    fn drop(&mut self) {
        let ptr = self.event.load(Relaxed);
        if !ptr.is_null() {
            // SAFETY: exclusive access; the event was created by `hand_off`.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

impl Default for RecursiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

// The plain-mutex degenerate case of the reader-writer contract.
unsafe impl RawRwLock for RecursiveMutex {
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
    use std::sync::Arc;
    use std::thread;

    use once_cell::sync::Lazy;

    use super::RecursiveMutex;
    use crate::test::tests;

    #[test]
    fn reenters_three_deep() {
        let mutex = RecursiveMutex::new();
        mutex.lock();
        mutex.lock();
        mutex.lock();
        unsafe {
            mutex.unlock();
            mutex.unlock();
            mutex.unlock();
        }

        // Fully released: another thread can take it without blocking on a
        // stale recursion count.
        let mutex = Arc::new(mutex);
        let other = Arc::clone(&mutex);
        thread::spawn(move || {
            other.lock();
            unsafe { other.unlock() };
        })
        .join()
        .unwrap();
    }

    #[test]
    fn static_usage() {
        static LOCK: Lazy<RecursiveMutex> = Lazy::new(RecursiveMutex::new);
        LOCK.lock();
        LOCK.lock();
        unsafe {
            LOCK.unlock();
            LOCK.unlock();
        }
    }

    #[test]
    fn hands_off_under_contention() {
        tests::exclusion::<RecursiveMutex>(2, 2);
    }

    #[test]
    fn recursion_inside_contention() {
        const THREADS: usize = 4;
        const ITERS: usize = 5_000;

        let mutex = RecursiveMutex::new();
        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..ITERS {
                        mutex.lock();
                        mutex.lock();
                        unsafe {
                            mutex.unlock();
                            mutex.unlock();
                        }
                    }
                });
            }
        });
    }
}
