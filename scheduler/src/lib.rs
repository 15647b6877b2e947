#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
// Dependencies are used by downstream crates via generic types; suppress to avoid false positives
#![allow(unused_crate_dependencies)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! Per-instance worker tasks, the instance-table Manager, and the health
//! checker (spec §4.8, §4.9).

pub mod error;
pub mod health;
pub mod manager;
pub mod snapshot;
pub mod worker;

pub use error::SchedulerError;
pub use health::{HealthCategory, HealthCheckConfig, HealthIssue, WorkerHealth};
pub use manager::Manager;
pub use snapshot::PersistedSnapshot;
pub use worker::{spawn_worker, WorkerCommand, WorkerContext, WorkerDeps, WorkerHandle};
