//! Read-biased reader-writer locks, and the primitives they stand on.
//!
//! The center of this crate is a family of reader-preferential locks for
//! workloads where many threads read constantly and a writer shows up
//! rarely: call interception, where ordinary calls hold the read side and a
//! background thread write-locks to evict everyone; stop-the-world phases
//! over a structure ordinary threads only read; configuration that is
//! swapped once an hour and read a million times a second.
//!
//! On the uncontended path a reader pays one store to a thread-local slot
//! and one load of the writer flag — no read-modify-write, no syscall.
//! Writers pay for that: they raise the flag, then walk every registered
//! reader slot and wait each published flag out. The whole trade is tilted
//! toward the readers.
//!
//! # Variants
//!
//! Reader-preferential, in [`biased`]: [`FastRwLock`] (the flagship),
//! [`SpinRwLock`], [`LightRwLock`], [`SingleReaderRwLock`],
//! [`FastSlimRwLock`] with its delegate [`SlimRwLock`], and
//! [`CohortRwLock`], which admits blocked readers in batches.
//!
//! Fair (FIFO between writers and reader cohorts), in [`fair`]:
//! [`FairRwLock`], [`QueuedFairRwLock`], [`TicketedRwLock`].
//!
//! Exclusive: [`RecursiveMutex`], [`RawMutex`]; both satisfy the
//! reader-writer contract by aliasing reads onto writes.
//!
//! A production user wants [`FastRwLock`] when writers may starve readers
//! and [`QueuedFairRwLock`] when they may not. The rest are kept as
//! documented, measured alternatives.
//!
//! # Structure
//!
//! Every lock implements the raw [`RawRwLock`] contract: blocking
//! `read_lock`/`write_lock`, unsafe owner-only unlocks, no try variants, no
//! timeouts. [`RwMutex`] wraps any of them around owned data and hands out
//! RAII guards, which is the safe way to use this crate.
//!
//! Underneath sit the support primitives, public because the locks are
//! assembled from them and they are useful on their own: [`Event`]
//! (manual/auto reset binary signal), [`RawMutex`] (futex word lock), and
//! the [`semaphore`] family behind the [`Semaphore`] trait.
//!
//! Blocking everywhere is futex-shaped, via the `atomic-wait` crate; there
//! are no kernel handles and construction never fails.
//!
//! # Example
//!
//! ```
//! use urwlock::FastRwMutex;
//!
//! let config = FastRwMutex::new(String::from("initial"));
//!
//! // Hot path: shared access, two thread-local operations when no writer
//! // is around.
//! assert_eq!(config.read().as_str(), "initial");
//!
//! // Rare path: exclusive access evicts all readers.
//! *config.write() = String::from("swapped");
//! assert_eq!(config.read().as_str(), "swapped");
//! ```

mod cfg;

pub mod biased;
pub mod event;
pub mod fair;
pub mod lock;
pub mod mutex;
pub mod recursive;
pub mod rwmutex;
pub mod semaphore;

mod registry;

#[cfg(test)]
mod test;

pub use biased::{
    CohortRwLock, FastRwLock, FastSlimRwLock, LightRwLock, SingleReaderRwLock, SlimRwLock,
    SpinRwLock,
};
pub use event::Event;
pub use fair::{FairRwLock, QueuedFairRwLock, TicketedRwLock};
pub use lock::RawRwLock;
pub use mutex::RawMutex;
pub use recursive::RecursiveMutex;
pub use rwmutex::{ReadGuard, RwMutex, WriteGuard};
pub use semaphore::{
    CondvarSemaphore, GateSemaphore, LockEventSemaphore, RelaySemaphore, Semaphore,
    SerialSemaphore,
};

/// Data protected by the recommended reader-preferential lock.
pub type FastRwMutex<T> = RwMutex<T, FastRwLock>;

/// Data protected by the recommended fair lock.
pub type FairRwMutex<T> = RwMutex<T, QueuedFairRwLock>;
