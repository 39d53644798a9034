//! Concurrent ordered-key containers.
//!
//! # Organization
//!
//! - [`ordered_list`] - lock-free sorted singly-linked list
//! - [`skip_list`] - lock-free multi-level skip list with `pop_min`
//! - `markable` - the atomic (pointer, mark) pair both are built on
//!
//! Containers are generic over the reclamation strategy `R: Reclaim`.

pub(crate) mod markable;
pub mod ordered_list;
pub mod skip_list;

pub use ordered_list::OrderedList;
pub use skip_list::SkipList;

use crate::reclaim::Reclaim;

/// The operations shared by both containers.
///
/// Keys are `u64`; the value `u64::MAX` is reserved for the tail sentinel
/// and must not be used. Each container is bound to the reclamation
/// strategy it retires nodes through, which also determines the guarded
/// reference type [`get`](OrderedContainer::get) hands out.
pub trait OrderedContainer<T>: Send + Sync {
    type Reclaim: Reclaim;

    /// Inserts `value` under `key`. Returns `false` if the key is already
    /// present; the container takes ownership of the value otherwise.
    fn add(&self, key: u64, value: T) -> bool;

    /// Removes the entry for `key`. Returns `false` if absent. The value is
    /// handed to the reclaimer and destroyed once no reader can still
    /// observe it.
    fn remove(&self, key: u64) -> bool;

    /// Membership test. Never helps with physical unlinking.
    fn contains(&self, key: u64) -> bool;

    /// Borrow the value under `key` if it is present and live at the moment
    /// observed. The returned reference carries its own protection region
    /// and must not outlive the container.
    fn get(&self, key: u64) -> Option<<Self::Reclaim as Reclaim>::GuardedRef<'_, T>>;
}
