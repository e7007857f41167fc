benches::generate_bench!(urwlock::RecursiveMutex, "recursive");
