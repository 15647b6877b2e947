#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-data
//!
//! Collaborator contracts the core consumes (DLMM client, swap client, RPC
//! client, gas service, analytics service — spec §6) and the
//! [`adapter::DataAdapter`] that turns them into a
//! [`snapshot::MarketSnapshot`] each tick (spec §4.4).

pub mod adapter;
pub mod collaborators;
pub mod error;
pub mod price_ring;
pub mod snapshot;
pub mod yield_ring;

pub use adapter::{DataAdapter, SnapshotRequest};
pub use error::DataError;
pub use snapshot::MarketSnapshot;
