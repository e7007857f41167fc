use core::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};

use crate::cfg::atomic::{AtomicBool, AtomicU32};
use crate::cfg::futex;
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::registry::{Exclusive, Registry};

/// Write-locked marker; odd, so readers also treat it as "writer waiting".
const WRITE_LOCKED: u32 = u32::MAX;

/// A plain futex reader-writer lock, two words wide.
///
/// `state` counts readers in its upper bits and keeps a writer-waiting bit
/// at the bottom; a waiting writer sets the bit so new readers go to sleep
/// instead of keeping the count forever non-zero, which is what would
/// otherwise starve the writer. Woken writers re-check against a separate
/// wake counter so a reader exit between the check and the sleep is not
/// lost.
///
/// On its own this is the family's simplest correct member, and it is the
/// slow-path delegate of [`FastSlimRwLock`].
#[derive(Debug)]
pub struct SlimRwLock {
    /// Reader count * 2 + writer-waiting bit; `WRITE_LOCKED` when a writer
    /// is in.
    state: AtomicU32,
    writer_wake: AtomicU32,
}

impl SlimRwLock {
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn new() -> Self {
        Self { state: AtomicU32::new(0), writer_wake: AtomicU32::new(0) }
    }

    #[cfg(all(loom, test))]
    pub fn new() -> Self {
        Self { state: AtomicU32::new(0), writer_wake: AtomicU32::new(0) }
    }

    pub fn read_lock(&self) {
        let mut state = self.state.load(Relaxed);
        loop {
            if state % 2 == 0 {
                assert!(state < WRITE_LOCKED - 2, "reader overflow");
                match self.state.compare_exchange_weak(state, state + 2, Acquire, Relaxed) {
                    Ok(_) => return,
                    Err(observed) => state = observed,
                }
            }
            if state % 2 == 1 {
                futex::wait(&self.state, state);
                state = self.state.load(Relaxed);
            }
        }
    }

    /// # Safety
    ///
    /// The caller must hold the shared side.
    pub unsafe fn read_unlock(&self) {
        // 3 = one reader left + the writer-waiting bit: we were the reader
        // the writer is sleeping on.
        if self.state.fetch_sub(2, Release) == 3 {
            self.writer_wake.fetch_add(1, Release);
            futex::wake_one(&self.writer_wake);
        }
    }

    pub fn write_lock(&self) {
        let mut state = self.state.load(Relaxed);
        loop {
            // Free (or only our own waiting bit): claim it.
            if state <= 1 {
                match self.state.compare_exchange(state, WRITE_LOCKED, Acquire, Relaxed) {
                    Ok(_) => return,
                    Err(observed) => {
                        state = observed;
                        continue;
                    }
                }
            }
            // Block new readers.
            if state % 2 == 0 {
                if let Err(observed) =
                    self.state.compare_exchange(state, state + 1, Relaxed, Relaxed)
                {
                    state = observed;
                    continue;
                }
            }
            let wake = self.writer_wake.load(Acquire);
            state = self.state.load(Relaxed);
            if state >= 2 {
                futex::wait(&self.writer_wake, wake);
                state = self.state.load(Relaxed);
            }
        }
    }

    /// # Safety
    ///
    /// The caller must hold the exclusive side.
    pub unsafe fn write_unlock(&self) {
        self.state.store(0, Release);
        self.writer_wake.fetch_add(1, Release);
        futex::wake_one(&self.writer_wake);
        futex::wake_all(&self.state);
    }
}

impl Default for SlimRwLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl RawRwLock for SlimRwLock {
    fn new() -> Self {
        Self::new()
    }

    fn read_lock(&self) {
        Self::read_lock(self);
    }

    unsafe fn read_unlock(&self) {
        // SAFETY: guaranteed by the caller.
        unsafe { Self::read_unlock(self) }
    }

    fn write_lock(&self) {
        Self::write_lock(self);
    }

    unsafe fn write_unlock(&self) {
        // SAFETY: guaranteed by the caller.
        unsafe { Self::write_unlock(self) }
    }
}

impl Exclusive for SlimRwLock {
    fn enter(&self) {
        self.write_lock();
    }

    fn exit(&self) {
        // SAFETY: `enter`/`exit` pairs are balanced by the callers.
        unsafe { self.write_unlock() }
    }
}

struct ReaderSlot {
    is_reading: AtomicBool,
    /// Owner-thread bookkeeping: whether this reader went through the
    /// delegate's shared side and owes it a release.
    locked: AtomicBool,
    done: Event,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self {
            is_reading: AtomicBool::new(false),
            locked: AtomicBool::new(false),
            done: Event::auto(false),
        }
    }
}

/// The family fast path bolted onto [`SlimRwLock`].
///
/// Uncontended readers never touch the delegate: they publish their slot
/// flag and check the writer flag like every other member of the family. A
/// reader that observes a pending writer retracts and falls back to the
/// delegate's shared side, which is also the writer-exclusion lock the
/// writer holds, so retracted readers pile up there until the writer leaves.
pub struct FastSlimRwLock {
    write_requested: CachePadded<AtomicBool>,
    registry: Registry<ReaderSlot, SlimRwLock>,
}

unsafe impl RawRwLock for FastSlimRwLock {
    fn new() -> Self {
        Self {
            write_requested: CachePadded(AtomicBool::new(false)),
            registry: Registry::new(SlimRwLock::new()),
        }
    }

    fn read_lock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(true, SeqCst);
        if self.write_requested.load(SeqCst) {
            slot.is_reading.store(false, SeqCst);
            slot.done.set();

            self.registry.raw().read_lock();
            slot.is_reading.store(true, SeqCst);
            slot.locked.store(true, Relaxed);
        }
    }

    unsafe fn read_unlock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(false, SeqCst);
        if slot.locked.load(Relaxed) {
            slot.locked.store(false, Relaxed);
            // SAFETY: `locked` records our own shared acquisition.
            unsafe { self.registry.raw().read_unlock() };
        }
        if self.write_requested.load(SeqCst) {
            slot.done.set();
        }
    }

    fn write_lock(&self) {
        self.registry.lock();
        self.write_requested.store(true, SeqCst);
        // SAFETY: the delegate's exclusive side is held for the whole scan.
        for slot in unsafe { self.registry.slots() } {
            while slot.is_reading.load(SeqCst) {
                slot.done.wait();
            }
        }
    }

    unsafe fn write_unlock(&self) {
        self.write_requested.store(false, SeqCst);
        self.registry.unlock();
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::{FastSlimRwLock, SlimRwLock};
    use crate::test::tests;

    #[test]
    fn slim_readers_only() {
        tests::progress::<SlimRwLock>(4, 0);
    }

    #[test]
    fn slim_exclusion() {
        tests::exclusion::<SlimRwLock>(4, 2);
    }

    #[test]
    fn slim_writer_not_starved() {
        tests::writer_makes_progress::<SlimRwLock>(4);
    }

    #[test]
    fn fast_slim_readers_only() {
        tests::progress::<FastSlimRwLock>(4, 0);
    }

    #[test]
    fn fast_slim_writers_only() {
        tests::progress::<FastSlimRwLock>(0, 2);
    }

    #[test]
    fn fast_slim_exclusion() {
        tests::exclusion::<FastSlimRwLock>(4, 2);
    }

    #[test]
    fn fast_slim_writer_not_starved() {
        tests::writer_makes_progress::<FastSlimRwLock>(4);
    }
}
