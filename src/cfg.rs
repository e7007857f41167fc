pub mod atomic {
    #[cfg(not(all(loom, test)))]
    pub use core::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicPtr, AtomicU32};

    #[cfg(all(loom, test))]
    pub use loom::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicPtr, AtomicU32};
}

pub mod futex {
    #[cfg(not(all(loom, test)))]
    pub use atomic_wait::{wait, wake_all, wake_one};

    /// Loom cannot model a real futex sleep; waiting degrades to a yield and
    /// the surrounding re-check loop drives the model forward.
    #[cfg(all(loom, test))]
    pub fn wait(_atomic: &super::atomic::AtomicU32, _value: u32) {
        loom::thread::yield_now();
    }

    #[cfg(all(loom, test))]
    pub fn wake_one(_atomic: *const super::atomic::AtomicU32) {}

    #[cfg(all(loom, test))]
    pub fn wake_all(_atomic: *const super::atomic::AtomicU32) {}
}

pub mod hint {
    #[cfg(not(all(loom, test)))]
    pub use core::hint::spin_loop;

    #[cfg(all(loom, test))]
    pub use loom::hint::spin_loop;
}
