benches::generate_bench!(urwlock::SlimRwLock, "slim");
