use core::sync::atomic::Ordering::{AcqRel, Relaxed};

use crate::cfg::atomic::{AtomicBool, AtomicI64};
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;
use crate::registry::Registry;

struct ReaderSlot {
    /// Owner-thread bookkeeping: whether this reader took the writer lock
    /// on its cohort's behalf.
    is_first: AtomicBool,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self { is_first: AtomicBool::new(false) }
    }
}

/// The fair ordering of [`FairRwLock`] built from two word locks instead of
/// semaphores.
///
/// The queue lock serializes arrivals, the writer lock carries exclusivity.
/// The first reader of a cohort acquires the writer lock and remembers that
/// in its slot; whichever cohort reader leaves last either releases it (if
/// it is the first) or signals the last-reader event so the first may. That
/// hand-off is the price of word locks being thread-affine where a semaphore
/// is not.
///
/// [`FairRwLock`]: super::FairRwLock
pub struct QueuedFairRwLock {
    reader_count: CachePadded<AtomicI64>,
    queue: RawMutex,
    registry: Registry<ReaderSlot>,
    last_reader: Event,
}

unsafe impl RawRwLock for QueuedFairRwLock {
    fn new() -> Self {
        Self {
            reader_count: CachePadded(AtomicI64::new(0)),
            queue: RawMutex::new(),
            registry: Registry::new(RawMutex::new()),
            last_reader: Event::auto(false),
        }
    }

    fn read_lock(&self) {
        let slot = self.registry.current();
        self.queue.lock();
        if self.reader_count.fetch_add(1, AcqRel) + 1 == 1 {
            // First of a cohort: claim exclusivity for all of us.
            self.registry.lock();
            slot.is_first.store(true, Relaxed);
        }
        // SAFETY: locked right above.
        unsafe { self.queue.unlock() }
    }

    unsafe fn read_unlock(&self) {
        let slot = self.registry.current();
        let prev = self.reader_count.fetch_sub(1, AcqRel);
        if prev == 1 {
            // Last reader of the cohort.
            if slot.is_first.load(Relaxed) {
                slot.is_first.store(false, Relaxed);
                self.registry.unlock();
            } else {
                self.last_reader.set();
            }
        } else if slot.is_first.load(Relaxed) {
            // The first reader leaves while siblings remain: wait for the
            // last of them before giving the writer lock back.
            self.last_reader.wait();
            slot.is_first.store(false, Relaxed);
            self.registry.unlock();
        }
    }

    fn write_lock(&self) {
        self.queue.lock();
        self.registry.lock();
        // SAFETY: locked right above.
        unsafe { self.queue.unlock() }
    }

    unsafe fn write_unlock(&self) {
        self.registry.unlock();
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::QueuedFairRwLock;
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<QueuedFairRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<QueuedFairRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<QueuedFairRwLock>(4, 2);
    }

    #[test]
    fn neither_side_starves() {
        tests::writer_makes_progress::<QueuedFairRwLock>(4);
    }
}
