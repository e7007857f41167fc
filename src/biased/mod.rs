//! Reader-preferential lock variants.
//!
//! All of these share one protocol skeleton. Each lock keeps a
//! writer-requested flag and a per-thread reader slot holding an `is_reading`
//! flag. A reader entering publishes its slot flag, then checks the writer
//! flag: if no writer is pending it is in, having spent one store and one
//! load, no read-modify-write, no syscall. If a writer is pending the reader
//! retracts its flag, signals its done event so a scanning writer can
//! advance, waits for the writer to finish and tries again.
//!
//! A writer takes the writer-exclusion lock, raises the flag, then walks the
//! slot registry and waits for every published `is_reading` to drop. Holding
//! the exclusion lock also stalls brand-new reader threads, which must
//! register their slot under it.
//!
//! The flag exchange is the classic store-then-check-the-other-side
//! handshake: both sides' stores and loads are sequentially consistent, so
//! either the reader sees the writer's flag or the writer sees the reader's,
//! never neither.
//!
//! The variants differ in how a retracted reader waits out the writer:
//!
//! * [`SpinRwLock`] — writer probes reader flags with 1 ms sleeps;
//!   demonstrative baseline.
//! * [`FastRwLock`] — readers sleep on a writer-done event, writers on
//!   per-reader done events; the fastest variant, writers can starve readers
//!   without bound.
//! * [`LightRwLock`] — no writer-done event; retracted readers serialize
//!   through the writer-exclusion lock instead.
//! * [`SingleReaderRwLock`] — the protocol reduced to one shared reader
//!   flag; only valid with a single reader thread, a measured upper bound.
//! * [`FastSlimRwLock`] — retracted readers fall back to [`SlimRwLock`], a
//!   plain futex reader-writer lock; the simplest correct slow path.
//! * [`CohortRwLock`] — retracted readers are admitted in batches through a
//!   counting semaphore; the best writer throughput of the family.

mod cohort;
mod fast;
mod light;
mod single;
mod slim;
mod spin;

pub use cohort::CohortRwLock;
pub use fast::FastRwLock;
pub use light::LightRwLock;
pub use single::SingleReaderRwLock;
pub use slim::{FastSlimRwLock, SlimRwLock};
pub use spin::SpinRwLock;
