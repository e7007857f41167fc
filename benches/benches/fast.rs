benches::generate_bench!(urwlock::FastRwLock, "fast");
