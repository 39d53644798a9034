//! Reclamation interface for the lock-free containers.
//!
//! The containers unlink nodes while readers may still hold pointers into
//! them, so destruction has to wait until no such reader remains. This
//! module defines the [`Reclaim`] trait the containers consume; the actual
//! scheme (epoch-based, deferred, hazard pointers) is supplied by the
//! implementation:
//!
//! ```text
//! SkipList<T, R: Reclaim>
//!     ├── SkipList<T, EpochReclaim>      (production, urchin-crossbeam)
//!     └── SkipList<T, DeferredReclaim>   (deterministic tests)
//! ```

mod deferred;

use std::ops::Deref;

pub use deferred::{DeferredReclaim, DeferredRef};

/// A memory reclamation strategy protecting concurrent access to nodes.
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. An object passed to `retire` is destroyed only after every thread
///    holding a `ReadGuard` taken before the `retire` call has dropped it.
///    Destruction is exclusive: no protected reader may still dereference
///    the object when its `dealloc` runs.
/// 2. A `GuardedRef` keeps the referenced data valid for its own lifetime.
///
/// Thread registration, where the scheme needs it, is the implementation's
/// concern (epoch collectors register threads lazily on first `enter`).
///
/// Every container operation - mutating or read-only - brackets itself in
/// `enter()`; dereferencing container nodes outside a protection region is
/// undefined behavior.
pub trait Reclaim: Sized + Default + Send + Sync {
    /// A reference protected by this reclamation strategy.
    ///
    /// Owns whatever protection it needs and derefs to the value.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>;

    /// An active protection region; dropping it ends the region.
    type ReadGuard: Sized;

    /// Enter a protection region. Objects retired from this point on stay
    /// alive at least until the returned guard drops.
    fn enter() -> Self::ReadGuard;

    /// Schedule `node` for destruction through `dealloc` once no protected
    /// reader can still observe it.
    ///
    /// # Safety
    ///
    /// - `node` must be a valid pointer that is no longer reachable from
    ///   any container root
    /// - `dealloc` must be the matching deallocation routine for `node`
    /// - `node` must be retired at most once
    unsafe fn retire<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));

    /// Wrap a raw pointer into a reference that carries its own protection.
    ///
    /// # Safety
    ///
    /// `ptr` must point to valid data that is protected by a region active
    /// at the call site.
    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T>;
}
