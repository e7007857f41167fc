benches::generate_bench!(urwlock::CohortRwLock, "cohort");
