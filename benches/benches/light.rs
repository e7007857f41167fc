benches::generate_bench!(urwlock::LightRwLock, "light");
