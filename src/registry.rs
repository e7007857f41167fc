//! Per-lock reader-thread state.
//!
//! Every reader-preferential lock gives each participating thread one slot
//! (its reading flag, its done event, variant extras) and must be able to
//! enumerate all slots from the writer side. Slots are found through a
//! single thread-local map keyed by registry identity, so a lookup costs one
//! hash probe instead of a dedicated TLS index per lock instance.
//!
//! Registration appends under the lock's own writer-exclusion section, which
//! is also what makes enumeration safe: a writer that holds the section can
//! walk the slots while new reader threads are stalled in registration.
//! A slot is removed again when its thread exits, from the thread-local
//! destructor, under the same section.

use core::any::Any;
use core::cell::{RefCell, UnsafeCell};
use core::sync::atomic::Ordering::Relaxed;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Weak};

use crate::mutex::RawMutex;

/// An exclusive section a registry can append and enumerate under.
///
/// This is the variant's writer-exclusion lock. It is stored inside the
/// registry so that the thread-exit destructor can reach it, and handed back
/// to the variant through [`Registry::raw`].
pub(crate) trait Exclusive {
    fn enter(&self);
    fn exit(&self);
}

impl Exclusive for RawMutex {
    fn enter(&self) {
        self.lock();
    }

    fn exit(&self) {
        // SAFETY: `enter`/`exit` pairs are balanced by the callers.
        unsafe { self.unlock() }
    }
}

/// Source of never-reused registry identities.
static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// This thread's slots, across every registry it has touched.
    static SLOTS: RefCell<HashMap<usize, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// One thread's entry in the shared map. Dropping it (at thread exit)
/// deregisters the slot.
struct LocalSlot<T: 'static, L: Exclusive + 'static> {
    slot: Arc<T>,
    registry: Weak<Shared<T, L>>,
}

impl<T: 'static, L: Exclusive + 'static> Drop for LocalSlot<T, L> {
    fn drop(&mut self) {
        // The registry may be long gone; then there is nothing to remove
        // from and the slot simply dies with us.
        if let Some(shared) = self.registry.upgrade() {
            shared.lock.enter();
            // SAFETY: the slot vector is only touched inside `lock`.
            let slots = unsafe { &mut *shared.slots.get() };
            slots.retain(|slot| !Arc::ptr_eq(slot, &self.slot));
            shared.lock.exit();
        }
    }
}

struct Shared<T, L> {
    id: usize,
    lock: L,
    // Guarded by `lock`.
    slots: UnsafeCell<Vec<Arc<T>>>,
}

// SAFETY: the slot vector is only accessed under `lock`; the slots
// themselves are Sync.
unsafe impl<T: Send + Sync, L: Send + Sync> Send for Shared<T, L> {}
unsafe impl<T: Send + Sync, L: Send + Sync> Sync for Shared<T, L> {}

/// Thread slot storage for one lock instance.
///
/// `T` is the per-thread slot type, `L` the exclusive section protecting
/// registration and enumeration.
pub(crate) struct Registry<T, L = RawMutex> {
    shared: Arc<Shared<T, L>>,
}

impl<T, L> Registry<T, L>
where
    T: Default + Send + Sync + 'static,
    L: Exclusive + Send + Sync + 'static,
{
    pub(crate) fn new(lock: L) -> Self {
        let id = NEXT_ID.fetch_add(1, Relaxed);
        let shared = Arc::new(Shared { id, lock, slots: UnsafeCell::new(Vec::new()) });
        Self { shared }
    }

    /// Returns the calling thread's slot, registering it first if this is
    /// the thread's first contact with this lock.
    ///
    /// Registration blocks while a writer holds the exclusion section, which
    /// keeps brand-new reader threads out of an in-progress write.
    pub(crate) fn current(&self) -> &T {
        let id = self.shared.id;
        let found = SLOTS.with(|slots| {
            slots
                .borrow()
                .get(&id)
                .and_then(|any| any.downcast_ref::<LocalSlot<T, L>>())
                .map(|local| Arc::as_ptr(&local.slot))
        });
        let ptr = match found {
            Some(ptr) => ptr,
            None => self.register(),
        };
        // SAFETY: the slot is kept alive by this thread's `LocalSlot` (we
        // are the thread that would drop it) and by the registry itself, so
        // it outlives this borrow of `self`.
        unsafe { &*ptr }
    }

    #[cold]
    fn register(&self) -> *const T {
        let slot = Arc::new(T::default());
        let ptr = Arc::as_ptr(&slot);

        self.shared.lock.enter();
        // SAFETY: the slot vector is only touched inside `lock`.
        unsafe { (*self.shared.slots.get()).push(Arc::clone(&slot)) };
        self.shared.lock.exit();

        let local = LocalSlot { slot, registry: Arc::downgrade(&self.shared) };
        SLOTS.with(|slots| slots.borrow_mut().insert(self.shared.id, Box::new(local)));
        ptr
    }

    /// Enters the writer-exclusion section.
    pub(crate) fn lock(&self) {
        self.shared.lock.enter();
    }

    /// Leaves the writer-exclusion section.
    pub(crate) fn unlock(&self) {
        self.shared.lock.exit();
    }

    /// The exclusion section itself, for variants that also take its shared
    /// side or park readers on it.
    pub(crate) fn raw(&self) -> &L {
        &self.shared.lock
    }

    /// All currently registered slots.
    ///
    /// # Safety
    ///
    /// The caller must hold the exclusion section (via [`lock`] or an
    /// exclusive acquisition of [`raw`]) for the lifetime of the returned
    /// borrow; registration and removal mutate the vector under it.
    ///
    /// [`lock`]: Registry::lock
    /// [`raw`]: Registry::raw
    pub(crate) unsafe fn slots(&self) -> &[Arc<T>] {
        // SAFETY: exclusion guaranteed by the caller.
        unsafe { &*self.shared.slots.get() }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::Registry;
    use crate::mutex::RawMutex;

    #[derive(Default)]
    struct Slot {
        touched: AtomicUsize,
    }

    #[test]
    fn one_slot_per_thread() {
        let registry: Registry<Slot> = Registry::new(RawMutex::new());

        let first = registry.current() as *const Slot as usize;
        let again = registry.current() as *const Slot as usize;
        assert_eq!(first, again);

        registry.current().touched.fetch_add(1, Ordering::Relaxed);

        thread::scope(|scope| {
            scope.spawn(|| {
                let other = registry.current() as *const Slot as usize;
                assert_ne!(first, other);
                registry.current().touched.fetch_add(1, Ordering::Relaxed);
            });
        });

        // The spawned thread has exited, so its slot deregistered itself.
        registry.lock();
        let slots = unsafe { registry.slots() };
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].touched.load(Ordering::Relaxed), 1);
        registry.unlock();
    }

    #[test]
    fn enumeration_sees_live_threads() {
        const THREADS: usize = 4;
        let registry: Registry<Slot> = Registry::new(RawMutex::new());
        let arrived = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    registry.current();
                    arrived.fetch_add(1, Ordering::SeqCst);
                    while arrived.load(Ordering::SeqCst) != THREADS + 1 {
                        thread::yield_now();
                    }
                });
            }

            while arrived.load(Ordering::SeqCst) != THREADS {
                thread::yield_now();
            }
            registry.lock();
            assert_eq!(unsafe { registry.slots() }.len(), THREADS);
            registry.unlock();
            arrived.fetch_add(1, Ordering::SeqCst);
        });
    }

    #[test]
    fn distinct_registries_do_not_share_slots() {
        let a: Registry<Slot> = Registry::new(RawMutex::new());
        let b: Registry<Slot> = Registry::new(RawMutex::new());

        let slot_a = a.current() as *const Slot;
        let slot_b = b.current() as *const Slot;
        assert_ne!(slot_a, slot_b);
    }
}
