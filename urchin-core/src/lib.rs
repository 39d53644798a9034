//! Lock-free concurrent ordered-key containers.
//!
//! Two containers share one design: a sorted singly-linked list
//! ([`OrderedList`]) and a multi-level skip list ([`SkipList`]), both built
//! on an atomic (pointer, deletion-mark) pair and two-phase removal:
//! a node is first *logically* removed by setting the mark on its successor
//! pair, then *physically* unlinked by whichever thread gets there first.
//! The skip list additionally orders extraction by key via
//! [`SkipList::pop_min`], which gives it the contract of a concurrent
//! priority queue.
//!
//! Containers are generic over a memory-reclamation strategy `R:`[`Reclaim`]:
//!
//! ```text
//! SkipList<T, R: Reclaim>
//!     ├── SkipList<T, EpochReclaim>      (production, urchin-crossbeam)
//!     └── SkipList<T, DeferredReclaim>   (deterministic tests)
//! ```

pub mod common_tests;
pub mod containers;
pub mod reclaim;

pub use containers::{OrderedContainer, OrderedList, SkipList};
pub use reclaim::{DeferredReclaim, DeferredRef, Reclaim};
