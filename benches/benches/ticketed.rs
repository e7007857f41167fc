benches::generate_bench!(urwlock::TicketedRwLock, "ticketed");
