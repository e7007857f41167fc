//! Duration-based throughput sweep over the lock variants, CSV on stdout.
//!
//! Reader and writer pools spin on acquire/release until a done flag rises;
//! a warmup pass runs first so lazily-registered thread slots and first-touch
//! page faults stay out of the measured numbers.
//!
//! ```text
//! cargo run --release --example throughput
//! ```

use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::thread;
use std::time::Duration;

use urwlock::{
    CohortRwLock, Event, FairRwLock, FastRwLock, FastSlimRwLock, LightRwLock, QueuedFairRwLock,
    RawMutex, RawRwLock, SlimRwLock, SpinRwLock, TicketedRwLock,
};

const DURATION: Duration = Duration::from_millis(700);

struct Stats {
    name: &'static str,
    readers: usize,
    writers: usize,
    reads_per_second: f64,
    writes_per_second: f64,
}

impl Stats {
    fn total_per_second(&self) -> f64 {
        self.reads_per_second + self.writes_per_second
    }

    /// Share of the per-thread throughput budget the readers got.
    fn read_ratio(&self) -> f64 {
        let threads = (self.readers + self.writers) as f64;
        self.reads_per_second * threads / self.total_per_second()
    }

    /// Share of the per-thread throughput budget the writers got.
    fn write_ratio(&self) -> f64 {
        let threads = (self.readers + self.writers) as f64;
        self.writes_per_second * threads / self.total_per_second()
    }
}

fn run<R>(name: &'static str, readers: usize, writers: usize, duration: Duration) -> Stats
where
    R: RawRwLock + Sync,
{
    let lock = R::new();
    let start = Event::manual(false);
    let done = AtomicBool::new(false);
    let reads = AtomicU64::new(0);
    let writes = AtomicU64::new(0);

    thread::scope(|scope| {
        for _ in 0..readers {
            scope.spawn(|| {
                start.wait();
                let mut count = 0_u64;
                while !done.load(SeqCst) {
                    lock.read_lock();
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

    let seconds = duration.as_secs_f64();
    Stats {
        name,
        readers,
        writers,
        reads_per_second: reads.load(SeqCst) as f64 / seconds,
        writes_per_second: writes.load(SeqCst) as f64 / seconds,
    }
}

fn sweep<R: RawRwLock + Sync>(name: &'static str, stats: &mut Vec<Stats>) {
    for &writers in &[0, 1, 2] {
        for &readers in &[0, 1, 2, 4, 8] {
            if readers == 0 && writers == 0 {
                continue;
            }
            stats.push(run::<R>(name, readers, writers, DURATION));
        }
    }
}

fn main() {
    // Warmup.
    run::<FastRwLock>("warmup", 1, 1, Duration::from_millis(200));

    let mut stats = Vec::new();
    sweep::<RawMutex>("raw_mutex", &mut stats);
    sweep::<SpinRwLock>("spin", &mut stats);
    sweep::<FastRwLock>("fast", &mut stats);
    sweep::<LightRwLock>("light", &mut stats);
    sweep::<SlimRwLock>("slim", &mut stats);
    sweep::<FastSlimRwLock>("fast_slim", &mut stats);
    sweep::<CohortRwLock>("cohort", &mut stats);
    sweep::<FairRwLock>("fair", &mut stats);
    sweep::<QueuedFairRwLock>("queued_fair", &mut stats);
    sweep::<TicketedRwLock>("ticketed", &mut stats);

    println!("name,readers,writers,reads_per_s,writes_per_s,total_per_s,read_ratio,write_ratio");
    for s in &stats {
        println!(
            "{},{},{},{:.1},{:.1},{:.1},{:.6},{:.6}",
            s.name,
            s.readers,
            s.writers,
            s.reads_per_second,
            s.writes_per_second,
            s.total_per_second(),
            s.read_ratio(),
            s.write_ratio()
        );
    }
}
