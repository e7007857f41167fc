benches::generate_bench!(urwlock::FairRwLock, "fair");
