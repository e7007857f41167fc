use std::sync::Arc;
use std::thread;

use criterion::{black_box, Bencher};
use urwlock::{RawRwLock, RwMutex};

pub fn gen_create<R: RawRwLock>(bencher: &mut Bencher) {
    bencher.iter(|| {
        let value = black_box(0_u32);
        RwMutex::<u32, R>::new(value)
    });
}

pub fn gen_read_uncontended<R: RawRwLock>(bencher: &mut Bencher) {
    let mutex = RwMutex::<u32, R>::new(0);

    bencher.iter(|| {
        black_box(*mutex.read());
    });
}

pub fn gen_write_uncontended<R: RawRwLock>(bencher: &mut Bencher) {
    let mutex = RwMutex::<u32, R>::new(0);

    bencher.iter(|| {
        let mut guard = mutex.write();
        *guard = guard.wrapping_add(1);
        drop(guard);
    });
}

pub fn gen_read_with_writer<R>(bencher: &mut Bencher)
where
    R: RawRwLock + Send + Sync + 'static,
{
    let mutex = Arc::new(RwMutex::<u32, R>::new(0));

    let writer = thread::spawn({
        let mutex = Arc::clone(&mutex);

        move || {
            while Arc::strong_count(&mutex) > 1 {
                for _ in 0..100 {
                    let mut guard = mutex.write();
                    *guard = guard.wrapping_add(1);
                    drop(guard);
                }
                thread::yield_now();
            }
        }
    });

    bencher.iter(|| {
        black_box(*mutex.read());
    });

    drop(mutex);
    writer.join().unwrap();
}

#[macro_export]
macro_rules! generate_bench {
    ($lock:ty, $prefix:literal) => {
        use criterion::{criterion_group, criterion_main, Criterion};
        use $crate::*;

        fn create(criterion: &mut Criterion) {
            criterion.bench_function(concat!($prefix, "/create"), |bench| {
                gen_create::<$lock>(bench)
            });
        }

        fn read_uncontended(criterion: &mut Criterion) {
            criterion.bench_function(concat!($prefix, "/read_uncontended"), |bench| {
                gen_read_uncontended::<$lock>(bench)
            });
        }

        fn write_uncontended(criterion: &mut Criterion) {
            criterion.bench_function(concat!($prefix, "/write_uncontended"), |bench| {
                gen_write_uncontended::<$lock>(bench)
            });
        }

        fn read_with_writer(criterion: &mut Criterion) {
            criterion.bench_function(concat!($prefix, "/read_with_writer"), |bench| {
                gen_read_with_writer::<$lock>(bench)
            });
        }

        criterion_group!(
            locks,
            create,
            read_uncontended,
            write_uncontended,
            read_with_writer,
        );

        criterion_main!(locks);
    };
}
