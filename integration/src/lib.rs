#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # dlmm-integration
//!
//! Low-level, high-performance integration primitives reused by the rest of
//! the workspace: the [`event_bus::EventBus`] (spec §4.1) and the
//! `FnvIndexMap`/`FnvIndexSet` collection types used for the bus's internal
//! tables and the decision modules' per-instance state registries.

pub mod collection;
pub mod event_bus;
pub mod retry;

pub use collection::{FnvIndexMap, FnvIndexSet};
pub use event_bus::{Event, EventBus, SubscriptionId};
pub use retry::{CancelToken, RetryExecutor, RetryPolicy};
