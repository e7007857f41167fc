//! Counting semaphores built above events and word locks.
//!
//! All five implementations satisfy the same P/V contract; they differ in
//! where the cost lands. [`CondvarSemaphore`] delegates straight to the
//! system. [`RelaySemaphore`] replaces the kernel object with one auto-reset
//! event and a signed counter, trading the thundering herd for serialized
//! wakeups. [`LockEventSemaphore`] and [`SerialSemaphore`] arbitrate through
//! a word lock, [`GateSemaphore`] through a second event. The cohort and
//! fair reader-writer locks are generic over this trait.

use core::sync::atomic::Ordering::{AcqRel, Relaxed};
use std::sync::{Condvar, Mutex, PoisonError};

use crate::cfg::atomic::AtomicI32;
use crate::event::Event;
use crate::mutex::RawMutex;

/// A counting semaphore.
///
/// The externally observable count is never negative: [`acquire`] blocks
/// while the count is zero and decrements it by one, [`release`] increments
/// it by `n` and wakes up to `n` waiters.
///
/// [`acquire`]: Semaphore::acquire
/// [`release`]: Semaphore::release
pub trait Semaphore: Send + Sync {
    /// Creates a semaphore holding `initial` permits.
    ///
    /// `max` is an advisory upper bound carried over from kernel semaphore
    /// interfaces; implementations may ignore it.
    fn new(initial: u32, max: u32) -> Self;

    /// The P operation: blocks until a permit is available and takes it.
    fn acquire(&self);

    /// The V operation: returns `n` permits, waking waiters.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    fn release(&self, n: u32);
}

/// A semaphore that delegates blocking to the system scheduler through a
/// mutex/condvar pair. The baseline the event-based variants are measured
/// against.
#[derive(Debug)]
pub struct CondvarSemaphore {
    count: Mutex<u32>,
    available: Condvar,
    max: u32,
}

impl Semaphore for CondvarSemaphore {
    fn new(initial: u32, max: u32) -> Self {
        assert!(initial <= max);
        Self { count: Mutex::new(initial), available: Condvar::new(), max }
    }

    fn acquire(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self.available.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    fn release(&self, n: u32) {
        assert!(n > 0);
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += n;
        debug_assert!(*count <= self.max);
        drop(count);
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }
}

/// A semaphore made of one auto-reset event and a signed permit count.
///
/// `release` only signals on the zero-to-positive transition, and each woken
/// waiter relays the signal onward while permits remain. Wakeups are
/// serialized through the single event, which is the price for never waking
/// the whole herd.
#[derive(Debug)]
pub struct RelaySemaphore {
    signal: Event,
    count: AtomicI32,
}

impl Semaphore for RelaySemaphore {
    fn new(initial: u32, max: u32) -> Self {
        assert!(initial <= max);
        let this = Self { signal: Event::auto(false), count: AtomicI32::new(0) };
        if initial > 0 {
            this.release(initial);
        }
        this
    }

    fn acquire(&self) {
        self.signal.wait();
        let prev = self.count.fetch_sub(1, AcqRel);
        if prev > 1 {
            // Permits remain; pass the signal to the next waiter.
            self.signal.set();
        }
    }

    fn release(&self, n: u32) {
        assert!(n > 0);
        let prev = self.count.fetch_add(n as i32, AcqRel);
        if prev == 0 {
            self.signal.set();
        }
    }
}

/// A semaphore arbitrated by a word lock, with an auto-reset event for the
/// empty case.
///
/// `acquire` loops: take a permit under the lock if one is there, otherwise
/// sleep on the event outside the lock and try again. The loop makes this
/// variant immune to spurious or stale signals by construction.
#[derive(Debug)]
pub struct LockEventSemaphore {
    lock: RawMutex,
    signal: Event,
    // Guarded by `lock`; atomic only for the shared reference.
    count: AtomicI32,
}

impl Semaphore for LockEventSemaphore {
    fn new(initial: u32, max: u32) -> Self {
        assert!(initial <= max);
        let this = Self {
            lock: RawMutex::new(),
            signal: Event::auto(false),
            count: AtomicI32::new(0),
        };
        if initial > 0 {
            this.release(initial);
        }
        this
    }

    fn acquire(&self) {
        let remaining = loop {
            self.lock.lock();
            let count = self.count.load(Relaxed);
            if count > 0 {
                self.count.store(count - 1, Relaxed);
                // SAFETY: locked right above.
                unsafe { self.lock.unlock() };
                break count - 1;
            }
            // SAFETY: locked right above.
            unsafe { self.lock.unlock() };
            self.signal.wait();
        };
        if remaining > 0 {
            self.signal.set();
        }
    }

    fn release(&self, n: u32) {
        assert!(n > 0);
        self.lock.lock();
        let prev = self.count.load(Relaxed);
        self.count.store(prev + n as i32, Relaxed);
        // SAFETY: locked right above.
        unsafe { self.lock.unlock() };
        if prev <= 0 {
            self.signal.set();
        }
    }
}

/// A semaphore whose waiters serialize themselves through a gate event, so
/// at most one thread at a time runs the permit-count protocol.
///
/// Both counters are uncontended when the semaphore is, which makes the
/// single-threaded path cheap; throughput drops sharply once the gate queue
/// forms.
#[derive(Debug)]
pub struct GateSemaphore {
    gate: Event,
    signal: Event,
    waiters: AtomicI32,
    count: AtomicI32,
}

impl Semaphore for GateSemaphore {
    fn new(initial: u32, max: u32) -> Self {
        assert!(initial <= max);
        let this = Self {
            gate: Event::auto(false),
            signal: Event::auto(false),
            waiters: AtomicI32::new(0),
            count: AtomicI32::new(0),
        };
        if initial > 0 {
            this.release(initial);
        }
        this
    }

    fn acquire(&self) {
        // Pass the gate: only the first arrival goes straight through.
        if self.waiters.fetch_add(1, AcqRel) > 0 {
            self.gate.wait();
        }

        let count = self.count.fetch_sub(1, AcqRel) - 1;
        if count < 0 {
            // Woken when the count transitions back from negative.
            self.signal.wait();
        }

        let waiting = self.waiters.fetch_sub(1, AcqRel) - 1;
        if waiting > 0 {
            self.gate.set();
        }
    }

    fn release(&self, n: u32) {
        assert!(n > 0);
        if self.count.fetch_add(n as i32, AcqRel) < 0 {
            self.signal.set();
        }
    }
}

/// A semaphore whose entire P operation, including the wait, runs under a
/// word lock.
///
/// The same count protocol as [`GateSemaphore`], with the lock playing the
/// gate's role. `release` runs from outside the lock and signals only when
/// the prior count was negative, i.e. when the serialized waiter is inside.
#[derive(Debug)]
pub struct SerialSemaphore {
    lock: RawMutex,
    signal: Event,
    count: AtomicI32,
}

impl Semaphore for SerialSemaphore {
    fn new(initial: u32, max: u32) -> Self {
        assert!(initial <= max);
        let this = Self {
            lock: RawMutex::new(),
            signal: Event::auto(false),
            count: AtomicI32::new(0),
        };
        if initial > 0 {
            this.release(initial);
        }
        this
    }

    fn acquire(&self) {
        self.lock.lock();
        if self.count.fetch_sub(1, AcqRel) - 1 < 0 {
            // Woken when the count transitions back from negative.
            self.signal.wait();
        }
        // SAFETY: locked right above.
        unsafe { self.lock.unlock() };
    }

    fn release(&self, n: u32) {
        assert!(n > 0);
        if self.count.fetch_add(n as i32, AcqRel) < 0 {
            self.signal.set();
        }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::thread;

    use super::{
        CondvarSemaphore, GateSemaphore, LockEventSemaphore, RelaySemaphore, Semaphore,
        SerialSemaphore,
    };

    /// Runs `threads` loops of P / V against `permits` initial permits and
    /// checks that no more than `permits` threads are ever inside, then
    /// drains the final count: exactly `permits` acquires must go through
    /// without blocking, one per completed V.
    fn bounded_gate<S: Semaphore>(permits: u32, threads: usize, iters: usize) {
        let semaphore = S::new(permits, u32::MAX);
        let inside = AtomicI32::new(0);

        thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    for _ in 0..iters {
                        semaphore.acquire();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        assert!(now <= permits as i32);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        semaphore.release(1);
                    }
                });
            }
        });

        for _ in 0..permits {
            semaphore.acquire();
        }
    }

    /// A batched V(n) admits exactly n waiters.
    fn batched_release<S: Semaphore + 'static>() {
        let semaphore = S::new(0, u32::MAX);
        let admitted = AtomicI32::new(0);

        thread::scope(|scope| {
            for _ in 0..3 {
                scope.spawn(|| {
                    semaphore.acquire();
                    admitted.fetch_add(1, Ordering::SeqCst);
                });
            }
            semaphore.release(3);
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn condvar_bounded_gate() {
        bounded_gate::<CondvarSemaphore>(3, 6, 2_000);
    }

    #[test]
    fn condvar_batched_release() {
        batched_release::<CondvarSemaphore>();
    }

    #[test]
    fn relay_bounded_gate() {
        bounded_gate::<RelaySemaphore>(3, 6, 2_000);
    }

    #[test]
    fn relay_batched_release() {
        batched_release::<RelaySemaphore>();
    }

    #[test]
    fn relay_binary() {
        bounded_gate::<RelaySemaphore>(1, 4, 2_000);
    }

    #[test]
    fn lock_event_bounded_gate() {
        bounded_gate::<LockEventSemaphore>(3, 6, 2_000);
    }

    #[test]
    fn lock_event_batched_release() {
        batched_release::<LockEventSemaphore>();
    }

    #[test]
    fn gate_bounded_gate() {
        bounded_gate::<GateSemaphore>(3, 6, 2_000);
    }

    #[test]
    fn gate_batched_release() {
        batched_release::<GateSemaphore>();
    }

    #[test]
    fn serial_bounded_gate() {
        bounded_gate::<SerialSemaphore>(3, 6, 2_000);
    }

    #[test]
    fn serial_batched_release() {
        batched_release::<SerialSemaphore>();
    }

    #[test]
    #[should_panic]
    fn release_zero_is_rejected() {
        let semaphore = RelaySemaphore::new(0, 1);
        semaphore.release(0);
    }
}
