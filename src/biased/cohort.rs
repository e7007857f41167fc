use core::sync::atomic::Ordering::{AcqRel, Relaxed, SeqCst};

use crate::cfg::atomic::{AtomicBool, AtomicI64};
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;
use crate::registry::Registry;
use crate::semaphore::{CondvarSemaphore, Semaphore};

struct ReaderSlot {
    is_reading: AtomicBool,
    /// This reader's position in the cohort it joined; 0 when it entered on
    /// the fast path. Owner-thread bookkeeping.
    order: AtomicI64,
    done: Event,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self {
            is_reading: AtomicBool::new(false),
            order: AtomicI64::new(0),
            done: Event::auto(false),
        }
    }
}

/// Reader-preferential lock admitting blocked readers in batches.
///
/// Readers that pile up behind a writer form a cohort. The first of them is
/// the leader: once the writer is gone it takes the writer-exclusion lock on
/// the whole cohort's behalf, converts the arrival count into the cohort
/// size and admits its siblings in one batch through the `ready` semaphore.
/// The exclusion lock stays held for the cohort's entire occupancy, so a
/// writer cannot slip between two members of a batch; the last member out
/// signals the cohort-done event so the leader may release.
///
/// Batching is what this variant buys: a writer waits for at most one
/// cohort instead of an unbounded stream of individually re-entering
/// readers, which gives the best writer throughput of the family.
///
/// Generic over the counting semaphore used for admission.
pub struct CohortRwLock<S = CondvarSemaphore> {
    write_requested: CachePadded<AtomicBool>,
    /// Readers queued behind the current writer, not yet formed into a
    /// cohort.
    reader_count: CachePadded<AtomicI64>,
    /// Members of the admitted cohort still inside.
    cohort_count: CachePadded<AtomicI64>,
    registry: Registry<ReaderSlot>,
    ready: S,
    cohort_done: Event,
}

unsafe impl<S: Semaphore> RawRwLock for CohortRwLock<S> {
    fn new() -> Self {
        Self {
            write_requested: CachePadded(AtomicBool::new(false)),
            reader_count: CachePadded(AtomicI64::new(0)),
            cohort_count: CachePadded(AtomicI64::new(0)),
            registry: Registry::new(RawMutex::new()),
            ready: S::new(0, u32::MAX),
            cohort_done: Event::auto(false),
        }
    }

    fn read_lock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(true, SeqCst);
        if self.write_requested.load(SeqCst) {
            slot.is_reading.store(false, SeqCst);
            slot.done.set();
            let order = self.reader_count.fetch_add(1, AcqRel) + 1;
            slot.order.store(order, Relaxed);

            if order == 1 {
                // Cohort leader: holds the writer-exclusion lock for the
                // whole batch.
                self.registry.lock();
                let cohort = self.reader_count.swap(0, AcqRel);
                self.cohort_count.store(cohort, SeqCst);
                // Must be published before any sibling is admitted.
                slot.is_reading.store(true, SeqCst);
                if cohort > 1 {
                    self.ready.release((cohort - 1) as u32);
                }
            } else {
                self.ready.acquire();
                slot.is_reading.store(true, SeqCst);
            }
        }
    }

    unsafe fn read_unlock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(false, SeqCst);

        let order = slot.order.load(Relaxed);
        if order != 0 {
            let prev = self.cohort_count.fetch_sub(1, AcqRel);
            if prev == 1 {
                // Last member out.
                if order == 1 {
                    self.registry.unlock();
                } else {
                    self.cohort_done.set();
                }
            } else if order == 1 {
                // The leader leaves before its siblings: hold the exclusion
                // lock until the last of them signals.
                self.cohort_done.wait();
                self.registry.unlock();
            }
            slot.order.store(0, Relaxed);
        }

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
    use super::CohortRwLock;
    use crate::semaphore::{CondvarSemaphore, RelaySemaphore};
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<CohortRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<CohortRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<CohortRwLock<CondvarSemaphore>>(4, 2);
    }

    #[test]
    fn exclusion_over_relay_semaphore() {
        tests::exclusion::<CohortRwLock<RelaySemaphore>>(4, 2);
    }

    #[test]
    fn writer_not_starved() {
        tests::writer_makes_progress::<CohortRwLock>(4);
    }
}
