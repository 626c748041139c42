//! Concurrent proxy launch across a classified fleet.
//!
//! A run is planned first: precondition failures (no master, no master
//! private address, slaves requested but none exist) abort before anything
//! is dispatched. Every dispatchable node then gets its own task on a
//! [`JoinSet`] and the orchestrator joins exactly that many completions.
//! Per-node failures are recorded in the [`RunOutcome`] and never stop
//! sibling tasks. The join honours an optional deadline and a
//! [`CancellationToken`]; either one aborts the tasks still in flight.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::classifier::FleetView;
use crate::command::{build_master_command, build_slave_command};
use crate::error::{FleetError, FleetResult, RemoteError, RemoteResult};
use crate::executor::RemoteExecutor;
use crate::machine::{AddressKind, Role};
use crate::outcome::{NodeReport, NodeStatus, RunOutcome};

/// Which roles a run activates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoleSelection {
    #[default]
    Both,
    MasterOnly,
    SlavesOnly,
}

impl RoleSelection {
    pub fn master(self) -> bool {
        matches!(self, RoleSelection::Both | RoleSelection::MasterOnly)
    }

    pub fn slaves(self) -> bool {
        matches!(self, RoleSelection::Both | RoleSelection::SlavesOnly)
    }
}

impl FromStr for RoleSelection {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(RoleSelection::Both),
            "master" => Ok(RoleSelection::MasterOnly),
            "slave" | "slaves" => Ok(RoleSelection::SlavesOnly),
            other => Err(FleetError::Config(format!("unknown install type {other}"))),
        }
    }
}

/// Caller-supplied parameters for one run. Immutable for its duration.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub roles: RoleSelection,
    /// Passed verbatim into every node's command.
    pub extra_args: String,
    /// Upper bound on the whole run, also handed to each executor call.
    pub deadline: Option<Duration>,
}

impl RunConfig {
    pub fn new(roles: RoleSelection, extra_args: impl Into<String>) -> Self {
        Self {
            roles,
            extra_args: extra_args.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// What the orchestrator will do with one node.
#[derive(Debug)]
pub enum PlannedAction {
    Dispatch { address: String, command: Arc<str> },
    /// Recorded as a failure without dispatching.
    Fail(FleetError),
    /// Left out of the run entirely.
    Skip(String),
}

#[derive(Debug)]
pub struct PlannedNode {
    pub node: String,
    pub role: Role,
    pub action: PlannedAction,
}

/// Per-node actions for a run, master first, then slaves in fleet order.
#[derive(Debug)]
pub struct DispatchPlan {
    pub nodes: Vec<PlannedNode>,
}

impl DispatchPlan {
    /// Check run preconditions and resolve every node's address and command.
    ///
    /// The slave command is built once from the master's private address and
    /// shared read-only by every slave.
    pub fn build(fleet: &FleetView, config: &RunConfig) -> FleetResult<Self> {
        let roles = config.roles;
        if roles.slaves() && fleet.slaves.is_empty() {
            return Err(FleetError::NoSlaveNodes);
        }
        let master = fleet.master.as_ref().ok_or(FleetError::MissingMaster)?;

        let slave_command: Option<Arc<str>> = if roles.slaves() {
            let private = master.address(AddressKind::Private).ok_or_else(|| {
                FleetError::MissingMasterPrivateAddress {
                    master: master.name.clone(),
                }
            })?;
            Some(build_slave_command(private, &config.extra_args)?.into())
        } else {
            None
        };

        let mut nodes = Vec::with_capacity(fleet.slaves.len() + 1);

        if roles.master() {
            let action = match master.require_address(AddressKind::Public) {
                Ok(address) => PlannedAction::Dispatch {
                    address: address.to_string(),
                    command: build_master_command(&config.extra_args).into(),
                },
                Err(error) => PlannedAction::Fail(error),
            };
            nodes.push(PlannedNode {
                node: master.name.clone(),
                role: Role::Master,
                action,
            });
        }

        if let Some(command) = slave_command {
            for slave in &fleet.slaves {
                let action = match slave.address(AddressKind::Public) {
                    Some(address) => PlannedAction::Dispatch {
                        address: address.to_string(),
                        command: Arc::clone(&command),
                    },
                    None => PlannedAction::Skip("public address unavailable".to_string()),
                };
                nodes.push(PlannedNode {
                    node: slave.name.clone(),
                    role: Role::Slave,
                    action,
                });
            }
        }

        Ok(Self { nodes })
    }

    /// Number of remote commands the run will wait for.
    pub fn node_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.action, PlannedAction::Dispatch { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
enum Interruption {
    Cancelled,
    Deadline,
}

struct Slot {
    node: String,
    role: Role,
    address: Option<String>,
    status: Option<NodeStatus>,
}

/// Launches the proxy on every activated node and joins the results.
pub struct FleetOrchestrator {
    executor: Arc<dyn RemoteExecutor>,
    cancel: CancellationToken,
}

impl FleetOrchestrator {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one tied to Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the proxy on the fleet.
    ///
    /// Returns `Err` only for precondition failures, which happen before any
    /// dispatch. Everything else, including master failure, lands in the
    /// returned [`RunOutcome`]; see [`RunOutcome::check`].
    ///
    /// A missing master is a precondition failure for every role selection,
    /// master-only included, so an empty fleet is reported rather than
    /// treated as a no-op run. Requesting slaves when none exist fails with
    /// [`FleetError::NoSlaveNodes`] even if the master alone could have run.
    ///
    /// On cancellation or deadline every executor call sees its token fire
    /// before the node tasks are aborted.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, roles = ?config.roles))]
    pub async fn run(&self, fleet: &FleetView, config: &RunConfig) -> FleetResult<RunOutcome> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();

        let plan = DispatchPlan::build(fleet, config)?;
        let node_count = plan.node_count();
        if node_count == 0 {
            info!("no dispatchable nodes");
        }
        let deadline = config.deadline.map(|d| Instant::now() + d);
        let run_cancel = self.cancel.child_token();
        let mut slots = Vec::with_capacity(plan.nodes.len());
        let mut join_set = JoinSet::new();

        for (index, planned) in plan.nodes.into_iter().enumerate() {
            let PlannedNode { node, role, action } = planned;
            match action {
                PlannedAction::Dispatch { address, command } => {
                    info!(node = %node, role = %role, address = %address, "dispatching");
                    debug!(node = %node, command = %command, "remote command");
                    let executor = Arc::clone(&self.executor);
                    let target = address.clone();
                    let timeout = config.deadline;
                    let cancel = run_cancel.clone();
                    join_set.spawn(async move {
                        let result = executor.run(&target, &command, timeout, &cancel).await;
                        (index, result)
                    });
                    slots.push(Slot {
                        node,
                        role,
                        address: Some(address),
                        status: None,
                    });
                }
                PlannedAction::Fail(error) => {
                    warn!(node = %node, role = %role, error = %error, "node not dispatched");
                    slots.push(Slot {
                        node,
                        role,
                        address: None,
                        status: Some(NodeStatus::Failed { error }),
                    });
                }
                PlannedAction::Skip(reason) => {
                    warn!(node = %node, role = %role, reason = %reason, "skipping node");
                    slots.push(Slot {
                        node,
                        role,
                        address: None,
                        status: Some(NodeStatus::Skipped { reason }),
                    });
                }
            }
        }

        info!(node_count, "waiting for nodes to finish");
        let mut remaining = node_count;
        let interruption = loop {
            if remaining == 0 {
                break None;
            }
            tokio::select! {
                biased;
                joined = join_set.join_next() => match joined {
                    Some(Ok((index, result))) => {
                        remaining -= 1;
                        record(&mut slots[index], result);
                    }
                    Some(Err(e)) => {
                        remaining -= 1;
                        warn!(error = %e, "node task ended without reporting");
                    }
                    None => break None,
                },
                _ = self.cancel.cancelled() => break Some(Interruption::Cancelled),
                _ = deadline_reached(deadline) => break Some(Interruption::Deadline),
            }
        };

        if let Some(reason) = interruption {
            warn!(pending = remaining, ?reason, "aborting in-flight nodes");
            run_cancel.cancel();
            join_set.abort_all();
        }

        let nodes: Vec<NodeReport> = slots
            .into_iter()
            .map(|slot| {
                let status = slot.status.unwrap_or_else(|| NodeStatus::Failed {
                    error: match interruption {
                        Some(Interruption::Cancelled) => FleetError::Cancelled,
                        Some(Interruption::Deadline) => FleetError::DeadlineExceeded {
                            deadline_ms: config
                                .deadline
                                .map(|d| d.as_millis() as u64)
                                .unwrap_or_default(),
                        },
                        None => FleetError::TaskAborted(format!("{} did not report", slot.node)),
                    },
                });
                NodeReport {
                    node: slot.node,
                    role: slot.role,
                    address: slot.address,
                    status,
                }
            })
            .collect();

        let outcome = RunOutcome {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dispatched: node_count,
            nodes,
        };
        info!(
            dispatched = outcome.dispatched,
            failed = outcome.failures().count(),
            skipped = outcome.skipped().count(),
            "run finished"
        );
        Ok(outcome)
    }
}

fn record(slot: &mut Slot, result: RemoteResult<String>) {
    let status = match result {
        Ok(output) => {
            info!(node = %slot.node, role = %slot.role, "node terminated");
            debug!(node = %slot.node, output = %output, "captured output");
            NodeStatus::Succeeded { output }
        }
        Err(RemoteError::Cancelled) => {
            warn!(node = %slot.node, role = %slot.role, "node cancelled");
            NodeStatus::Failed {
                error: FleetError::Cancelled,
            }
        }
        Err(source) => {
            warn!(node = %slot.node, role = %slot.role, error = %source, "node terminated with error");
            NodeStatus::Failed {
                error: FleetError::Remote {
                    node: slot.node.clone(),
                    source,
                },
            }
        }
    };
    slot.status = Some(status);
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
