//! The remote-shell seam used by the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RemoteResult;

/// Runs one command on one host and returns its captured stdout.
///
/// Implementations authenticate with a locally held private credential and
/// must report connection, authentication and non-zero exit as distinct
/// [`RemoteError`](crate::error::RemoteError) variants.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `command` on `address`.
    ///
    /// `timeout`, when set, bounds the whole call. It is derived from the run
    /// deadline so a hung session does not outlive the orchestration call.
    ///
    /// `cancel` fires when the run is cancelled or its deadline passes.
    /// Implementations doing blocking I/O must unblock and return
    /// [`RemoteError::Cancelled`](crate::error::RemoteError::Cancelled) once it
    /// fires; aborting the calling task does not stop a blocking thread.
    async fn run(
        &self,
        address: &str,
        command: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> RemoteResult<String>;
}
