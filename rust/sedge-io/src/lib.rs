//! Scratch-file management for the index build pipeline.
//!
//! A [`SpillStore`] owns a temporary directory and hands out uniquely named
//! file paths for spilled chunks. The directory and everything left in it
//! are removed when the store is dropped, so an aborted build does not leak
//! scratch files. The finished index can be rescued from the scratch
//! directory with [`SpillStore::keep`].

pub mod spill_store;

pub use spill_store::SpillStore;
