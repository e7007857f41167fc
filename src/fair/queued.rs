use core::sync::atomic::Ordering::AcqRel;

use crate::cfg::atomic::AtomicI64;
use crate::lock::{CachePadded, RawRwLock};
use crate::semaphore::{CondvarSemaphore, Semaphore};

/// The classic fair reader-writer lock over two binary semaphores.
///
/// Everyone passes through the `queue` semaphore in arrival order. A writer
/// additionally takes `writer` before leaving the queue, so it owns the lock
/// outright; the first reader of a cohort takes `writer` on the cohort's
/// behalf and the last one out returns it. Perfectly fair, and paying a full
/// semaphore round-trip on every operation.
///
/// Generic over the semaphore, which is what makes the semaphore family
/// comparable under an identical load.
pub struct FairRwLock<S = CondvarSemaphore> {
    queue: S,
    writer: S,
    reader_count: CachePadded<AtomicI64>,
}

unsafe impl<S: Semaphore> RawRwLock for FairRwLock<S> {
    fn new() -> Self {
        Self {
            queue: S::new(1, 1),
            writer: S::new(1, 1),
            reader_count: CachePadded(AtomicI64::new(0)),
        }
    }

    fn read_lock(&self) {
        self.queue.acquire();
        if self.reader_count.fetch_add(1, AcqRel) + 1 == 1 {
            // First of a cohort: claim exclusivity for all of us.
            self.writer.acquire();
        }
        self.queue.release(1);
    }

    unsafe fn read_unlock(&self) {
        if self.reader_count.fetch_sub(1, AcqRel) - 1 == 0 {
            self.writer.release(1);
        }
    }

    fn write_lock(&self) {
        self.queue.acquire();
        self.writer.acquire();
        self.queue.release(1);
        debug_assert_eq!(self.reader_count.load(core::sync::atomic::Ordering::SeqCst), 0);
    }

    unsafe fn write_unlock(&self) {
        self.writer.release(1);
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::FairRwLock;
    use crate::semaphore::{LockEventSemaphore, RelaySemaphore, SerialSemaphore};
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<FairRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<FairRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<FairRwLock>(4, 2);
    }

    #[test]
    fn exclusion_over_relay_semaphore() {
        tests::exclusion::<FairRwLock<RelaySemaphore>>(4, 2);
    }

    #[test]
    fn exclusion_over_lock_event_semaphore() {
        tests::exclusion::<FairRwLock<LockEventSemaphore>>(4, 2);
    }

    #[test]
    fn exclusion_over_serial_semaphore() {
        tests::exclusion::<FairRwLock<SerialSemaphore>>(4, 2);
    }

    #[test]
    fn neither_side_starves() {
        tests::writer_makes_progress::<FairRwLock>(4);
    }
}
