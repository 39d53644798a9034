//! Deferred reclamation for testing.
//!
//! `DeferredReclaim` postpones every retirement until the reclaimer itself
//! drops, which for a container means: when the container drops. That gives
//! deterministic destruction timing for tests at the cost of memory growth,
//! so it is not meant for long-running production use.

use std::ops::Deref;
use std::sync::Mutex;

use super::Reclaim;

/// Defers all node destruction until the reclaimer is dropped.
///
/// Retirements from any thread are collected under a mutex and freed in
/// one batch on drop. Debug builds panic on a duplicate retirement, which
/// would otherwise surface as a double free much later.
pub struct DeferredReclaim {
    retired: Mutex<Vec<Retired>>,
    #[cfg(debug_assertions)]
    seen: Mutex<std::collections::HashSet<usize>>,
}

struct Retired {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// The pointers are only touched under the mutex and freed exactly once.
unsafe impl Send for Retired {}

impl DeferredReclaim {
    pub fn new() -> Self {
        DeferredReclaim {
            retired: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(std::collections::HashSet::new()),
        }
    }
}

impl Default for DeferredReclaim {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredReclaim {
    fn drop(&mut self) {
        let retired = self.retired.get_mut().unwrap();
        for node in retired.drain(..) {
            unsafe { (node.dealloc)(node.ptr) };
        }
    }
}

/// A plain reference wrapper: with deferred reclamation every retired node
/// outlives the container, so no per-reference protection is needed.
pub struct DeferredRef<'a, T> {
    data: &'a T,
}

impl<T> Deref for DeferredRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl Reclaim for DeferredReclaim {
    type GuardedRef<'a, T: 'a> = DeferredRef<'a, T>;

    /// Protection is provided by the reclaimer stored in the container, so
    /// the read guard carries no state.
    type ReadGuard = ();

    fn enter() -> Self::ReadGuard {}

    unsafe fn retire<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let mut seen = self.seen.lock().unwrap();
            if !seen.insert(node as usize) {
                panic!("duplicate retire of {:#x}", node as usize);
            }
        }

        let node = Retired {
            ptr: node as *mut (),
            dealloc: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc)
            },
        };
        self.retired.lock().unwrap().push(node);
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        DeferredRef { data: unsafe { &*ptr } }
    }
}
