use core::sync::atomic::Ordering::SeqCst;

use crate::cfg::atomic::AtomicBool;
use crate::event::Event;
use crate::lock::{CachePadded, RawRwLock};
use crate::mutex::RawMutex;

/// The family protocol collapsed to a single shared reader flag.
///
/// With only one reader there is no registry to scan and no per-reader
/// state: the lock itself carries `is_reading`, the writer waits on one
/// reader-done event, and the reader waits on one writer-done event.
///
/// Only valid when at most one thread ever takes the read side. This is not
/// enforced; a second concurrent reader corrupts the flag. The variant
/// exists as the measured upper bound on what the registry-based locks can
/// reach, and as the smallest complete demonstration of the flag handshake.
pub struct SingleReaderRwLock {
    write_requested: CachePadded<AtomicBool>,
    is_reading: CachePadded<AtomicBool>,
    reader_done: Event,
    writer_done: Event,
    writers: RawMutex,
}

unsafe impl RawRwLock for SingleReaderRwLock {
    fn new() -> Self {
        Self {
            write_requested: CachePadded(AtomicBool::new(false)),
            is_reading: CachePadded(AtomicBool::new(false)),
            reader_done: Event::auto(false),
            writer_done: Event::manual(true),
            writers: RawMutex::new(),
        }
    }

    fn read_lock(&self) {
        self.is_reading.store(true, SeqCst);
        while self.write_requested.load(SeqCst) {
            self.is_reading.store(false, SeqCst);
            self.reader_done.set();
            self.writer_done.wait();
            self.is_reading.store(true, SeqCst);
        }
    }

    unsafe fn read_unlock(&self) {
        self.is_reading.store(false, SeqCst);
        if self.write_requested.load(SeqCst) {
            self.reader_done.set();
        }
    }

    fn write_lock(&self) {
        self.writers.lock();
        self.writer_done.reset();
        self.write_requested.store(true, SeqCst);
        while self.is_reading.load(SeqCst) {
            self.reader_done.wait();
        }
    }

    unsafe fn write_unlock(&self) {
        self.write_requested.store(false, SeqCst);
        self.writer_done.set();
        // SAFETY: locked by this thread's `write_lock`.
        unsafe { self.writers.unlock() }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use super::SingleReaderRwLock;
    use crate::test::tests;

    #[test]
    fn reader_only() {
        tests::progress::<SingleReaderRwLock>(1, 0);
    }

    #[test]
    fn writers_only() {
        tests::progress::<SingleReaderRwLock>(0, 2);
    }

    #[test]
    fn handshake() {
        tests::exclusion::<SingleReaderRwLock>(1, 1);
    }

    #[test]
    fn one_reader_two_writers() {
        tests::exclusion::<SingleReaderRwLock>(1, 2);
    }
}

#[cfg(all(loom, test))]
mod model {
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    use super::SingleReaderRwLock;
    use crate::lock::RawRwLock;

    /// One reader against one writer: the instrumented regions never
    /// overlap, in any interleaving of the flag handshake.
    #[test]
    fn handshake_excludes() {
        loom::model(|| {
            let lock = Arc::new(SingleReaderRwLock::new());
            let writers_in = Arc::new(AtomicUsize::new(0));

            let writer = {
                let lock = Arc::clone(&lock);
                let writers_in = Arc::clone(&writers_in);
                thread::spawn(move || {
                    lock.write_lock();
                    writers_in.store(1, Ordering::SeqCst);
                    writers_in.store(0, Ordering::SeqCst);
                    unsafe { lock.write_unlock() };
                })
            };

            lock.read_lock();
            assert_eq!(writers_in.load(Ordering::SeqCst), 0);
            unsafe { lock.read_unlock() };

            writer.join().unwrap();
        });
    }
}
