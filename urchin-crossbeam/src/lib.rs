//! Epoch-based reclamation for urchin containers.
//!
//! This crate provides [`EpochReclaim`], an implementation of the
//! `Reclaim` trait using crossbeam-epoch.
//!
//! # Usage
//!
//! ```ignore
//! use urchin_core::SkipList;
//! use urchin_crossbeam::EpochReclaim;
//!
//! let queue: SkipList<u64, EpochReclaim> = SkipList::new();
//! queue.add(42, 420);
//! assert_eq!(queue.pop_min(), Some(420));
//! ```

pub mod epoch_reclaim;

pub use epoch_reclaim::{EpochReclaim, EpochRef};
