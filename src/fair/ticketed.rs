use core::sync::atomic::Ordering::{AcqRel, Relaxed, SeqCst};

use crate::cfg::atomic::{AtomicBool, AtomicI64};
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;
use crate::registry::Registry;

struct ReaderSlot {
    is_reading: AtomicBool,
    done: Event,
    // Owner-thread bookkeeping.
    is_locked: AtomicBool,
    is_first: AtomicBool,
}

impl Default for ReaderSlot {
    fn default() -> Self {
        Self {
            is_reading: AtomicBool::new(false),
            done: Event::auto(false),
            is_locked: AtomicBool::new(false),
            is_first: AtomicBool::new(false),
        }
    }
}

/// [`QueuedFairRwLock`] with a reader fast path.
///
/// Arrivals draw from a ticket pair: a writer bumps `ticket` by two while a
/// reader cohort stamps `last_reader_ticket` with a fresh ticket, so
/// `ticket - last_reader_ticket <= 1` means no writer has queued since the
/// last reader cohort. A reader observing that publishes its reading flag
/// and is in, with the family's usual store-plus-load cost; the writer scan
/// waits out published flags exactly as the reader-biased locks do. Any
/// other reader falls back to the queued fair protocol.
///
/// [`QueuedFairRwLock`]: super::QueuedFairRwLock
pub struct TicketedRwLock {
    ticket: CachePadded<AtomicI64>,
    last_reader_ticket: CachePadded<AtomicI64>,
    write_requested: CachePadded<AtomicBool>,
    reader_count: CachePadded<AtomicI64>,
    queue: RawMutex,
    registry: Registry<ReaderSlot>,
    last_reader: Event,
}

unsafe impl RawRwLock for TicketedRwLock {
    fn new() -> Self {
        Self {
            ticket: CachePadded(AtomicI64::new(0)),
            last_reader_ticket: CachePadded(AtomicI64::new(0)),
            write_requested: CachePadded(AtomicBool::new(false)),
            reader_count: CachePadded(AtomicI64::new(0)),
            queue: RawMutex::new(),
            registry: Registry::new(RawMutex::new()),
            last_reader: Event::auto(false),
        }
    }

    fn read_lock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(true, SeqCst);
        let last = self.last_reader_ticket.load(SeqCst);
        let ticket = self.ticket.load(SeqCst);
        if ticket - last <= 1 {
            // No writer queued since the last reader cohort.
            return;
        }

        slot.is_reading.store(false, SeqCst);
        slot.done.set();

        self.queue.lock();
        if self.reader_count.fetch_add(1, AcqRel) + 1 == 1 {
            // First of a cohort: claim exclusivity and stamp a fresh reader
            // ticket so arrivals behind us fast-path again.
            self.registry.lock();
            let fresh = self.ticket.fetch_add(1, SeqCst) + 1;
            self.last_reader_ticket.store(fresh, SeqCst);
            slot.is_locked.store(true, Relaxed);
            slot.is_first.store(true, Relaxed);
        } else {
            slot.is_locked.store(true, Relaxed);
        }
        slot.is_reading.store(true, SeqCst);
        // SAFETY: locked right above.
        unsafe { self.queue.unlock() }
    }

    unsafe fn read_unlock(&self) {
        let slot = self.registry.current();
        slot.is_reading.store(false, SeqCst);

        if slot.is_locked.load(Relaxed) {
            slot.is_locked.store(false, Relaxed);
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
                self.last_reader.wait();
                slot.is_first.store(false, Relaxed);
                self.registry.unlock();
            }
        }

        if self.write_requested.load(SeqCst) {
            slot.done.set();
        }
    }

    fn write_lock(&self) {
        self.queue.lock();
        self.ticket.fetch_add(2, SeqCst);
        self.registry.lock();
        self.write_requested.store(true, SeqCst);
        // SAFETY: locked at the top of this function.
        unsafe { self.queue.unlock() }

        // SAFETY: the writer lock is held for the whole scan.
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
    use super::TicketedRwLock;
    use crate::test::tests;

    #[test]
    fn readers_only() {
        tests::progress::<TicketedRwLock>(4, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<TicketedRwLock>(0, 2);
    }

    #[test]
    fn exclusion() {
        tests::exclusion::<TicketedRwLock>(4, 2);
    }

    #[test]
    fn neither_side_starves() {
        tests::writer_makes_progress::<TicketedRwLock>(4);
    }
}
