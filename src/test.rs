//! A duration-based exercise harness shared by every variant's tests.
//!
//! Reader and writer pools are gated on a manual-reset start event, loop
//! until a done flag rises, and count their acquisitions. Instrumented
//! occupancy counters assert the exclusion invariants from inside the
//! critical sections: never a writer while readers are in, never two
//! writers, never readers while a writer is in.

#[cfg(not(loom))]
pub(crate) mod tests {
    use std::sync::atomic::Ordering::SeqCst;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};
    use std::thread;
    use std::time::Duration;

    use crate::event::Event;
    use crate::lock::RawRwLock;

    pub(crate) struct Totals {
        pub reads: u64,
        pub writes: u64,
    }

    /// Runs `readers` + `writers` threads against a fresh `R` for
    /// `duration`, asserting the exclusion invariants throughout.
    pub(crate) fn exercise<R>(readers: usize, writers: usize, duration: Duration) -> Totals
    where
        R: RawRwLock + Sync,
    {
        let lock = R::new();
        let start = Event::manual(false);
        let done = AtomicBool::new(false);
        let readers_in = AtomicI64::new(0);
        let writers_in = AtomicI64::new(0);
        let reads = AtomicU64::new(0);
        let writes = AtomicU64::new(0);

        thread::scope(|scope| {
            for _ in 0..readers {
                scope.spawn(|| {
                    start.wait();
                    let mut count = 0_u64;
                    while !done.load(SeqCst) {
                        lock.read_lock();
                        readers_in.fetch_add(1, SeqCst);
                        assert_eq!(writers_in.load(SeqCst), 0, "writer inside a read region");
                        readers_in.fetch_sub(1, SeqCst);
                        // SAFETY: locked right above, same thread.
                        unsafe { lock.read_unlock() };
                        count += 1;
                    }
                    reads.fetch_add(count, SeqCst);
                });
            }
            for _ in 0..writers {
                scope.spawn(|| {
                    start.wait();
                    let mut count = 0_u64;
                    while !done.load(SeqCst) {
                        lock.write_lock();
                        let writers_before = writers_in.fetch_add(1, SeqCst);
                        assert_eq!(writers_before, 0, "two writers inside");
                        assert_eq!(readers_in.load(SeqCst), 0, "reader inside a write region");
                        writers_in.fetch_sub(1, SeqCst);
                        // SAFETY: locked right above, same thread.
                        unsafe { lock.write_unlock() };
                        count += 1;
                    }
                    writes.fetch_add(count, SeqCst);
                });
            }

            start.set();
            thread::sleep(duration);
            done.store(true, SeqCst);
        });

        Totals { reads: reads.load(SeqCst), writes: writes.load(SeqCst) }
    }

    /// Every non-empty pool makes progress and nothing deadlocks.
    pub(crate) fn progress<R: RawRwLock + Sync>(readers: usize, writers: usize) {
        let totals = exercise::<R>(readers, writers, Duration::from_millis(100));
        if readers > 0 {
            assert!(totals.reads > 0);
        }
        if writers > 0 {
            assert!(totals.writes > 0);
        }
    }

    /// Exclusion invariants hold under sustained mixed contention.
    pub(crate) fn exclusion<R: RawRwLock + Sync>(readers: usize, writers: usize) {
        let totals = exercise::<R>(readers, writers, Duration::from_millis(200));
        if readers > 0 {
            assert!(totals.reads > 0);
        }
        if writers > 0 {
            assert!(totals.writes > 0);
        }
    }

    /// One writer against a pool of self-yielding readers still gets in.
    pub(crate) fn writer_makes_progress<R: RawRwLock + Sync>(readers: usize) {
        let totals = exercise::<R>(readers, 1, Duration::from_millis(300));
        assert!(totals.reads > 0);
        assert!(totals.writes > 0, "writer starved outright");
    }
}
