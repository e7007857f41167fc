//! A binary wait event over a single futex word.
//!
//! Events are the signaling backbone of every lock in this crate: writers
//! sleep on per-reader done events, retracted readers sleep on the writer
//! done event, and the event-based semaphores are built directly on top.

use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cfg::atomic::AtomicU32;
use crate::cfg::futex;

const UNSET: u32 = 0;
const SET: u32 = 1;

/// How an [`Event`] returns to the unsignaled state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reset {
    /// The event stays signaled until [`Event::reset`] is called; every
    /// waiter observes the signal.
    Manual,
    /// Exactly one waiter consumes the signal on wakeup; the rest keep
    /// sleeping.
    Auto,
}

/// A binary signal with manual or automatic reset.
///
/// A manual-reset event releases all current and future waiters once set,
/// until someone resets it. An auto-reset event hands its signal to exactly
/// one waiter: setting an already-set event is a no-op, and a wakeup
/// atomically consumes the signal, so one `set` never releases two waits.
///
/// Waits are infinite and spurious-wakeup safe; both flavors re-check the
/// state in a loop around the futex sleep.
#[derive(Debug)]
pub struct Event {
    state: AtomicU32,
    reset: Reset,
}

impl Event {
    /// Creates a manual-reset event, signaled or not.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn manual(signaled: bool) -> Self {
        let state = AtomicU32::new(if signaled { SET } else { UNSET });
        Self { state, reset: Reset::Manual }
    }

    /// Creates an auto-reset event, signaled or not.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn auto(signaled: bool) -> Self {
        let state = AtomicU32::new(if signaled { SET } else { UNSET });
        Self { state, reset: Reset::Auto }
    }

    /// Creates a manual-reset event with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    pub fn manual(signaled: bool) -> Self {
        let state = AtomicU32::new(if signaled { SET } else { UNSET });
        Self { state, reset: Reset::Manual }
    }

    /// Creates an auto-reset event with Loom primitives (non-const).
    #[cfg(all(loom, test))]
    pub fn auto(signaled: bool) -> Self {
        let state = AtomicU32::new(if signaled { SET } else { UNSET });
        Self { state, reset: Reset::Auto }
    }

    /// Blocks the calling thread until the event is signaled.
    ///
    /// For an auto-reset event the signal is consumed before returning.
    pub fn wait(&self) {
        match self.reset {
            Reset::Manual => {
                while self.state.load(Acquire) == UNSET {
                    futex::wait(&self.state, UNSET);
                }
            }
            Reset::Auto => loop {
                if self.state.compare_exchange(SET, UNSET, Acquire, Relaxed).is_ok() {
                    return;
                }
                futex::wait(&self.state, UNSET);
            },
        }
    }

    /// Signals the event.
    ///
    /// Manual-reset: releases every waiter and stays signaled. Auto-reset:
    /// releases at most one waiter; signaling an already-signaled event is a
    /// no-op.
    pub fn set(&self) {
        match self.reset {
            Reset::Manual => {
                self.state.store(SET, Release);
                futex::wake_all(&self.state);
            }
            Reset::Auto => {
                if self.state.swap(SET, Release) == UNSET {
                    futex::wake_one(&self.state);
                }
            }
        }
    }

    /// Returns the event to the unsignaled state.
    pub fn reset(&self) {
        self.state.store(UNSET, Release);
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Event;

    #[test]
    fn manual_set_releases_every_waiter() {
        let event = Arc::new(Event::manual(false));
        let woken = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                let woken = Arc::clone(&woken);
                thread::spawn(move || {
                    event.wait();
                    woken.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(woken.load(Ordering::SeqCst), 0);

        event.set();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 3);

        // Stays signaled: a late waiter passes straight through.
        event.wait();
    }

    #[test]
    fn manual_reset_rearms() {
        let event = Event::manual(true);
        event.wait();
        event.wait();
        event.reset();

        let event = Arc::new(event);
        let waiter = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.wait())
        };
        thread::sleep(Duration::from_millis(20));
        event.set();
        waiter.join().unwrap();
    }

    #[test]
    fn auto_signal_is_consumed() {
        let event = Event::auto(true);
        event.wait();

        // The signal is gone; a second set is needed for a second wait.
        let event = Arc::new(event);
        let waiter = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.wait())
        };
        thread::sleep(Duration::from_millis(20));
        event.set();
        waiter.join().unwrap();
    }

    #[test]
    fn auto_set_when_set_is_noop() {
        let event = Event::auto(false);
        event.set();
        event.set();
        event.wait();
        // Exactly one signal was stored; a second wait would block.
    }

    #[test]
    fn auto_relay_chain() {
        // Each waiter passes the baton to the next, one at a time.
        let event = Arc::new(Event::auto(false));
        let passes = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let event = Arc::clone(&event);
                let passes = Arc::clone(&passes);
                thread::spawn(move || {
                    event.wait();
                    passes.fetch_add(1, Ordering::SeqCst);
                    event.set();
                })
            })
            .collect();

        event.set();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(passes.load(Ordering::SeqCst), 4);
    }
}

#[cfg(all(loom, test))]
mod model {
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    use super::Event;

    #[test]
    fn manual_set_publishes() {
        loom::model(|| {
            let event = Arc::new(Event::manual(false));
            let data = Arc::new(AtomicUsize::new(0));

            let handle = {
                let event = Arc::clone(&event);
                let data = Arc::clone(&data);
                thread::spawn(move || {
                    data.store(1, Ordering::Relaxed);
                    event.set();
                })
            };

            event.wait();
            assert_eq!(data.load(Ordering::Relaxed), 1);
            handle.join().unwrap();
        });
    }

    #[test]
    fn auto_single_consumption() {
        loom::model(|| {
            let event = Arc::new(Event::auto(true));

            let handle = {
                let event = Arc::clone(&event);
                thread::spawn(move || {
                    event.wait();
                    event.set();
                })
            };

            event.wait();
            event.set();
            handle.join().unwrap();

            // Both waits consumed a signal and re-armed; one signal is left.
            event.wait();
        });
    }
}
