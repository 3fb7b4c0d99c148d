//! # Storage Module
//!
//! Persistence for the dog profile list.
//!
//! The profile store never writes diffs: every change replaces the complete
//! snapshot held in a single key/value slot. This module provides the port
//! ([`SnapshotStorage`]) and its implementations:
//!
//! - **JsonFileStorage**: one JSON file per slot in the data directory,
//!   replaced atomically through a temp file
//! - **MemoryStorage**: in-process slot for tests

pub mod json_file;
pub mod memory;
pub mod traits;

pub use json_file::{JsonFileStorage, DEFAULT_SLOT};
pub use memory::MemoryStorage;
pub use traits::SnapshotStorage;
