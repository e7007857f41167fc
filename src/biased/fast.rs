use core::sync::atomic::Ordering::SeqCst;

use crate::cfg::atomic::AtomicBool;
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;
use crate::registry::Registry;

struct ReaderSlot {
    is_reading: AtomicBool,
    /// Set by the reader whenever it drops `is_reading` with a write
    /// pending; the writer's scan sleeps on it.
    done: Event,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self { is_reading: AtomicBool::new(false), done: Event::auto(false) }
    }
}

/// The flagship reader-preferential lock.
///
/// * Heavily biased towards large numbers of concurrent readers with
///   infrequent writers.
/// * Writers take priority over readers: every new reader yields to a
///   pending writer, so writers can starve readers.
/// * With no writer contending, a reader pays one thread-slot store plus one
///   flag load on entry and the same on exit.
///
/// Typical uses are call interception, where ordinary calls take the read
/// side and a background thread write-locks to boot everyone out, and
/// stop-the-world phases over a structure that ordinary threads read-lock.
///
/// Retracted readers park on a manual-reset writer-done event that is kept
/// signaled except while a writer is attempting or holding acquisition; each
/// reader additionally owns an auto-reset done event that wakes the writer's
/// registry scan.
pub struct FastRwLock {
    write_requested: CachePadded<AtomicBool>,
    writer_done: Event,
    registry: Registry<ReaderSlot>,
}

unsafe impl RawRwLock for FastRwLock {
    fn new() -> Self {
        Self {
            write_requested: CachePadded(AtomicBool::new(false)),
            writer_done: Event::manual(true),
            registry: Registry::new(RawMutex::new()),
        }
    }

    fn read_lock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(true, SeqCst);
        while self.write_requested.load(SeqCst) {
            slot.is_reading.store(false, SeqCst);
            slot.done.set();
            self.writer_done.wait();
            slot.is_reading.store(true, SeqCst);
        }
    }

    unsafe fn read_unlock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(false, SeqCst);
        if self.write_requested.load(SeqCst) {
            slot.done.set();
        }
    }

    fn write_lock(&self) {
        self.registry.lock();
        self.writer_done.reset();
        self.write_requested.store(true, SeqCst);
        // SAFETY: the writer-exclusion lock is held for the whole scan.
        for slot in unsafe { self.registry.slots() } {
            while slot.is_reading.load(SeqCst) {
                slot.done.wait();
            }
        }
    }

    unsafe fn write_unlock(&self) {
        self.write_requested.store(false, SeqCst);
        self.writer_done.set();
        self.registry.unlock();
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::FastRwLock;
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<FastRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<FastRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<FastRwLock>(4, 2);
    }

    #[test]
    fn handshake() {
        tests::exclusion::<FastRwLock>(1, 1);
    }

    #[test]
    fn writer_not_starved() {
        tests::writer_makes_progress::<FastRwLock>(4);
    }
}
