use core::sync::atomic::Ordering::SeqCst;

use crate::cfg::atomic::AtomicBool;
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;
use crate::registry::Registry;

struct ReaderSlot {
    is_reading: AtomicBool,
    done: Event,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self { is_reading: AtomicBool::new(false), done: Event::auto(false) }
    }
}

/// Like [`FastRwLock`] but without the writer-done event: a retracted reader
/// waits out the writer by passing through the writer-exclusion lock itself.
///
/// One lock then arbitrates everything: writers against each other, new
/// readers against an active writer, and readers that arrived behind a
/// writer, which it additionally orders fairly among themselves. The cost is
/// that those readers re-enter one at a time instead of all at once.
///
/// [`FastRwLock`]: super::FastRwLock
pub struct LightRwLock {
    write_requested: CachePadded<AtomicBool>,
    registry: Registry<ReaderSlot>,
}

unsafe impl RawRwLock for LightRwLock {
    fn new() -> Self {
        Self {
            write_requested: CachePadded(AtomicBool::new(false)),
            registry: Registry::new(RawMutex::new()),
        }
    }

    fn read_lock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(true, SeqCst);
        while self.write_requested.load(SeqCst) {
            slot.is_reading.store(false, SeqCst);
            slot.done.set();
            // Wait until the writer finishes; republish before letting the
            // next queued reader (or writer) through.
            self.registry.lock();
            slot.is_reading.store(true, SeqCst);
            self.registry.unlock();
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
        self.registry.unlock();
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::LightRwLock;
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<LightRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<LightRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<LightRwLock>(4, 2);
    }

    #[test]
    fn writer_not_starved() {
        tests::writer_makes_progress::<LightRwLock>(4);
    }
}
