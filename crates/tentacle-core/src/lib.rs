//! Tentacle Core Library
//!
//! Role resolution and concurrent launch of the tentacular proxy across a
//! master/slave fleet.
//!
//! # Module layout
//!
//! - [`machine`] — `Machine`, `Role`, name prefixes
//! - [`classifier`] — `classify`, `classify_strict`, `FleetView`
//! - [`command`] — per-role launch command strings
//! - [`executor`] — `RemoteExecutor` seam
//! - [`provider`] — `FleetProvider` seam, `create_fleet`, `delete_all`
//! - [`orchestrator`] — `FleetOrchestrator`, `RunConfig`, `DispatchPlan`
//! - [`outcome`] — `RunOutcome`, `NodeReport`, `FailurePolicy`
//! - [`settings`] — credential paths and environment overrides

pub mod classifier;
pub mod command;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod machine;
pub mod orchestrator;
pub mod outcome;
pub mod provider;
pub mod settings;
pub mod telemetry;

pub use classifier::{classify, classify_strict, FleetView};
pub use command::{
    build_master_command, build_slave_command, master_control_url, CONTROL_PORT, DATA_PORT,
    PROXY_IMAGE, TRAILING_DELAY,
};
pub use error::{FleetError, FleetResult, RemoteError, RemoteResult};
pub use executor::RemoteExecutor;
pub use machine::{AddressKind, Machine, MachineId, Role, MASTER_PREFIX, SLAVE_PREFIX};
pub use orchestrator::{DispatchPlan, FleetOrchestrator, PlannedAction, RoleSelection, RunConfig};
pub use outcome::{FailurePolicy, NodeReport, NodeStatus, OutcomeSummary, RunOutcome};
pub use provider::{create_fleet, delete_all, FleetProvider, MachineSpec, DEFAULT_SLAVE_COUNT};
pub use settings::{expand_home, read_token, Settings};
pub use telemetry::init_tracing;

pub use tokio_util::sync::CancellationToken;
