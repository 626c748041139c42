//! Aggregate result of one orchestration call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{FleetError, FleetResult};
use crate::machine::Role;

/// What happened to one node during a run.
#[derive(Debug)]
pub enum NodeStatus {
    /// The remote command exited cleanly; carries captured stdout.
    Succeeded { output: String },
    /// The node was dispatched (or should have been) and failed.
    Failed { error: FleetError },
    /// The node was never dispatched and does not count against the run.
    Skipped { reason: String },
}

/// Per-node entry in a [`RunOutcome`].
#[derive(Debug)]
pub struct NodeReport {
    pub node: String,
    pub role: Role,
    /// Address the command was sent to, if one was resolved.
    pub address: Option<String>,
    pub status: NodeStatus,
}

impl NodeReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, NodeStatus::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, NodeStatus::Failed { .. })
    }

    pub fn error(&self) -> Option<&FleetError> {
        match &self.status {
            NodeStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// How much per-node failure the caller tolerates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Master failure fails the run; slave failures are reported only.
    #[default]
    TolerateSlaveFailures,
    /// Any node failure fails the run.
    Strict,
}

/// Result of one [`FleetOrchestrator::run`](crate::orchestrator::FleetOrchestrator::run).
///
/// `nodes` is in plan order: master first, then slaves in fleet order.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Number of remote commands actually dispatched.
    pub dispatched: usize,
    pub nodes: Vec<NodeReport>,
}

impl RunOutcome {
    /// True when no node failed. Skipped nodes do not count as failures.
    pub fn all_succeeded(&self) -> bool {
        !self.nodes.iter().any(NodeReport::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| n.is_failure())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.status, NodeStatus::Skipped { .. }))
    }

    /// First failed node in plan order.
    pub fn first_failure(&self) -> Option<&NodeReport> {
        self.failures().next()
    }

    pub fn master(&self) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.role == Role::Master)
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.node == name)
    }

    /// Apply a tolerance policy, turning the offending node into an error.
    pub fn check(&self, policy: FailurePolicy) -> FleetResult<()> {
        let offending = match policy {
            FailurePolicy::Strict => self.first_failure(),
            FailurePolicy::TolerateSlaveFailures => self.master().filter(|m| m.is_failure()),
        };
        match offending {
            Some(report) => Err(FleetError::NodeFailed {
                node: report.node.clone(),
                reason: report
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            dispatched: self.dispatched,
            succeeded: self.nodes.iter().filter(|n| n.is_success()).count(),
            failed: self.failures().count(),
            skipped: self.skipped().count(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSummary {
                    node: n.node.clone(),
                    role: n.role,
                    address: n.address.clone(),
                    status: match &n.status {
                        NodeStatus::Succeeded { .. } => "succeeded",
                        NodeStatus::Failed { .. } => "failed",
                        NodeStatus::Skipped { .. } => "skipped",
                    },
                    detail: match &n.status {
                        NodeStatus::Succeeded { .. } => None,
                        NodeStatus::Failed { error } => Some(error.to_string()),
                        NodeStatus::Skipped { reason } => Some(reason.clone()),
                    },
                })
                .collect(),
        }
    }
}

/// Serializable view of a [`RunOutcome`] for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub node: String,
    pub role: Role,
    pub address: Option<String>,
    pub status: &'static str,
    pub detail: Option<String>,
}
