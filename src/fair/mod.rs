//! Fair lock variants.
//!
//! Fair here means FIFO between writer arrivals and reader cohorts: a writer
//! that arrives behind three readers runs after those three but before any
//! reader that arrives behind it. None of these starve either side.
//!
//! * [`FairRwLock`] — the textbook two-binary-semaphore construction.
//! * [`QueuedFairRwLock`] — the same ordering from a pair of word locks and
//!   a first-reader hand-off.
//! * [`TicketedRwLock`] — [`QueuedFairRwLock`] plus a ticket pair that lets
//!   readers skip the queue entirely while no writer is queued.

mod lock;
mod queued;
mod ticketed;

pub use lock::QueuedFairRwLock;
pub use queued::FairRwLock;
pub use ticketed::TicketedRwLock;
