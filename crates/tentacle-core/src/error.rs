//! Error taxonomy for fleet orchestration.
//!
//! [`FleetError`] covers run preconditions, per-node dispatch failures and
//! the provider/config edges. [`RemoteError`] is what a
//! [`RemoteExecutor`](crate::executor::RemoteExecutor) reports for one command.

use crate::machine::AddressKind;

/// Failures reported by a remote-shell executor for a single command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("connection to {address} failed: {detail}")]
    Connect { address: String, detail: String },

    #[error("ssh handshake with {address} failed: {detail}")]
    Handshake { address: String, detail: String },

    #[error("authentication as {user} failed: {detail}")]
    Auth { user: String, detail: String },

    #[error("remote session failed: {0}")]
    Session(String),

    #[error("remote command exited with status {exit_status}: {stderr}")]
    CommandFailed {
        exit_status: i32,
        stdout: String,
        stderr: String,
    },

    #[error("credential error: {0}")]
    Credential(String),

    #[error("remote command timed out after {elapsed_ms}ms")]
    TimedOut { elapsed_ms: u64 },

    #[error("remote call cancelled")]
    Cancelled,
}

/// Result type for remote executor calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Fleet orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("missing master node")]
    MissingMaster,

    #[error("master node {master} has no private address")]
    MissingMasterPrivateAddress { master: String },

    #[error("no slave nodes available")]
    NoSlaveNodes,

    #[error("more than one machine claims the master role: {names:?}")]
    AmbiguousMaster { names: Vec<String> },

    #[error("{kind} address of node {node} could not be resolved")]
    AddressUnresolved { node: String, kind: AddressKind },

    #[error("node {node}: {source}")]
    Remote {
        node: String,
        #[source]
        source: RemoteError,
    },

    #[error("node {node} failed: {reason}")]
    NodeFailed { node: String, reason: String },

    #[error("run cancelled before node completed")]
    Cancelled,

    #[error("run deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded { deadline_ms: u64 },

    #[error("node task aborted: {0}")]
    TaskAborted(String),

    #[error("fleet provider error: {0}")]
    Provider(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fleet operations.
pub type FleetResult<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_errors_display() {
        assert_eq!(FleetError::NoSlaveNodes.to_string(), "no slave nodes available");
        assert_eq!(FleetError::MissingMaster.to_string(), "missing master node");

        let err = FleetError::MissingMasterPrivateAddress {
            master: "master1".to_string(),
        };
        assert!(err.to_string().contains("master1"));
    }

    #[test]
    fn test_remote_error_carries_node_name() {
        let err = FleetError::Remote {
            node: "slave3".to_string(),
            source: RemoteError::CommandFailed {
                exit_status: 125,
                stdout: String::new(),
                stderr: "no such image".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("slave3"));
        assert!(msg.contains("125"));
        assert!(msg.contains("no such image"));
    }

    #[test]
    fn test_address_unresolved_names_kind() {
        let err = FleetError::AddressUnresolved {
            node: "slave0".to_string(),
            kind: AddressKind::Public,
        };
        assert_eq!(
            err.to_string(),
            "public address of node slave0 could not be resolved"
        );
    }
}
