benches::generate_bench!(urwlock::SpinRwLock, "spin");
