use core::sync::atomic::Ordering::SeqCst;
use std::thread;
use std::time::Duration;

use crate::cfg::atomic::AtomicBool;
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;
use crate::registry::Registry;

struct ReaderSlot {
    is_reading: AtomicBool,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self { is_reading: AtomicBool::new(false) }
    }
}

/// The demonstrative variant: reader slots carry no done event, so a
/// scanning writer has nothing to sleep on and probes each published
/// `is_reading` flag with 1 ms sleeps instead.
///
/// Readers keep the full fast path of the family; the sleep probing makes
/// this the weakest variant under reader/writer contention. It exists as the
/// baseline the event-based scans are measured against.
pub struct SpinRwLock {
    write_requested: CachePadded<AtomicBool>,
    writer_done: Event,
    registry: Registry<ReaderSlot>,
}

unsafe impl RawRwLock for SpinRwLock {
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
            self.writer_done.wait();
            slot.is_reading.store(true, SeqCst);
        }
    }

    unsafe fn read_unlock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(false, SeqCst);
    }

    fn write_lock(&self) {
        self.registry.lock();
        self.writer_done.reset();
        self.write_requested.store(true, SeqCst);
        // SAFETY: the writer-exclusion lock is held for the whole scan.
        for slot in unsafe { self.registry.slots() } {
            while slot.is_reading.load(SeqCst) {
                thread::sleep(Duration::from_millis(1));
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
    use super::SpinRwLock;
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<SpinRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<SpinRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<SpinRwLock>(4, 1);
    }
}
