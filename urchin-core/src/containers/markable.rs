// Atomic (pointer, deletion-mark) pair, packed into one machine word.
//
// Bit layout:
//   Bit 0: MARK_BIT - the node owning this pair is logically removed
//
// Packing the mark into the low bit of the aligned node pointer keeps the
// pair CAS-able as a single word, so updates allocate nothing and only node
// retirements ever reach the reclaimer.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

const MARK_BIT: usize = 0b1;

/// An atomic pair of a successor pointer and a logical-deletion mark.
///
/// The mark refers to the node *owning* this pair: a node whose successor
/// pair reads `deleted` is logically removed and no new observer may treat
/// it as a member.
pub(crate) struct MarkableRef<N> {
    pair: AtomicPtr<N>,
}

impl<N> MarkableRef<N> {
    #[inline]
    pub(crate) fn new(ptr: *mut N, deleted: bool) -> Self {
        MarkableRef {
            pair: AtomicPtr::new(Self::pack(ptr, deleted)),
        }
    }

    #[inline]
    pub(crate) fn null() -> Self {
        Self::new(ptr::null_mut(), false)
    }

    #[inline]
    fn pack(ptr: *mut N, deleted: bool) -> *mut N {
        debug_assert_eq!(ptr as usize & MARK_BIT, 0, "node pointer must be aligned");
        (ptr as usize | deleted as usize) as *mut N
    }

    #[inline]
    fn unpack(raw: *mut N) -> (*mut N, bool) {
        let bits = raw as usize;
        ((bits & !MARK_BIT) as *mut N, bits & MARK_BIT != 0)
    }

    /// Load the (pointer, mark) pair (Acquire ordering).
    #[inline]
    pub(crate) fn load(&self) -> (*mut N, bool) {
        Self::unpack(self.pair.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn get_ptr(&self) -> *mut N {
        self.load().0
    }

    #[inline]
    pub(crate) fn get_mark(&self) -> bool {
        self.load().1
    }

    /// CAS over the full pair (AcqRel/Acquire ordering).
    ///
    /// Fails iff either field diverges from its expected value.
    #[inline]
    pub(crate) fn cas(
        &self,
        expected_ptr: *mut N,
        new_ptr: *mut N,
        expected_mark: bool,
        new_mark: bool,
    ) -> bool {
        self.pair
            .compare_exchange(
                Self::pack(expected_ptr, expected_mark),
                Self::pack(new_ptr, new_mark),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Set the mark iff the pointer half still equals `expected_ptr`.
    ///
    /// This is a CAS loop over the packed word, not a read-then-write of
    /// the mark alone: a transition only succeeds against the pair value it
    /// was decided on. Returns `true` when the pair already reads
    /// `(expected_ptr, new_mark)`, so helping callers can treat
    /// "already marked" as success.
    pub(crate) fn attempt_mark(&self, expected_ptr: *mut N, new_mark: bool) -> bool {
        loop {
            let raw = self.pair.load(Ordering::Acquire);
            let (ptr, mark) = Self::unpack(raw);
            if ptr != expected_ptr {
                return false;
            }
            if mark == new_mark {
                return true;
            }
            if self
                .pair
                .compare_exchange(
                    raw,
                    Self::pack(ptr, new_mark),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Publish a fresh pair unconditionally (Release ordering).
    ///
    /// Used only to initialize pairs of nodes that are not yet reachable.
    #[inline]
    pub(crate) fn store(&self, ptr: *mut N, deleted: bool) {
        self.pair.store(Self::pack(ptr, deleted), Ordering::Release);
    }
}
