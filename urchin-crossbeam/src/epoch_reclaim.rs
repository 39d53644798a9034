//! Epoch-based reclamation built on crossbeam-epoch.
//!
//! [`EpochReclaim`] is a zero-sized `Reclaim` implementation that routes
//! everything through the global epoch collector: `enter` pins the calling
//! thread, `retire` defers destruction until every thread pinned at retire
//! time has unpinned, and `make_ref` bundles a pinned guard with the
//! borrow so it stays valid for the caller's protection region.

use std::ops::Deref;

use crossbeam_epoch::{self as epoch, Guard as EpochGuard};
use urchin_core::Reclaim;

/// Epoch-based memory reclamation.
///
/// Zero-sized: all state lives in the global epoch collector, so the
/// instance stored in a container costs nothing and the container stays
/// `Send + Sync`. Threads are registered with the collector lazily on
/// their first pin.
///
/// # Performance
///
/// - **Pin overhead**: a thread-local check per operation
/// - **Reclamation**: batched, amortized O(1) per retired node
/// - **Memory**: retirements may accumulate while threads stay pinned
#[derive(Clone, Copy, Default)]
pub struct EpochReclaim;

/// A reference protected by a pinned epoch guard.
///
/// The guard is held for the lifetime of the reference; dropping the
/// `EpochRef` unpins and lets reclamation proceed.
pub struct EpochRef<'a, T> {
    _guard: EpochGuard,
    reference: &'a T,
}

impl<T> Deref for EpochRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.reference
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for EpochRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EpochRef({:?})", self.reference)
    }
}

impl Reclaim for EpochReclaim {
    type GuardedRef<'a, T: 'a> = EpochRef<'a, T>;

    type ReadGuard = EpochGuard;

    fn enter() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn retire<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || dealloc(node));
        }
        // guard drops here; the deferred dealloc runs once every thread
        // pinned at this point has unpinned
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        let guard = epoch::pin();
        EpochRef {
            _guard: guard,
            reference: unsafe { &*ptr },
        }
    }
}
