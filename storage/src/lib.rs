#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-storage
//!
//! Atomic, versioned file-backed persistence (spec §4.9): `save`/`load`/
//! `exists`/`list`/`delete` keyed by instance id, write-temp-then-rename +
//! fsync durability, and periodic backup.

pub mod envelope;
pub mod error;
pub mod store;

pub use envelope::Envelope;
pub use error::StorageError;
pub use store::Storage;
