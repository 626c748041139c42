//! Tentacle SSH: remote executor over libssh2
//!
//! [`SshExecutor`] logs in with a private key file and runs one command per
//! call. The blocking libssh2 session runs on Tokio's blocking pool so many
//! nodes can be driven concurrently. Cancelling the call's token closes the
//! socket, which releases the blocking thread.

pub mod session;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use tentacle_core::{CancellationToken, RemoteError, RemoteExecutor, RemoteResult, Settings};

pub use session::{run_command, CommandOutput};

/// Login parameters shared by every session.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
    /// TCP connect limit when the call itself has no timeout.
    pub connect_timeout: Option<Duration>,
}

impl SshConfig {
    /// Root on port 22 with the given key.
    pub fn new(private_key: impl Into<PathBuf>) -> Self {
        SshConfig {
            user: "root".to_string(),
            port: 22,
            private_key: private_key.into(),
            passphrase: None,
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        SshConfig {
            user: settings.ssh_user.clone(),
            port: settings.ssh_port,
            ..SshConfig::new(settings.ssh_key.clone())
        }
    }
}

/// [`RemoteExecutor`] backed by libssh2.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        SshExecutor { config }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(
        &self,
        address: &str,
        command: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> RemoteResult<String> {
        let config = self.config.clone();
        let address = address.to_string();
        let command = command.to_string();
        let cancel = cancel.clone();

        let output = tokio::task::spawn_blocking(move || {
            debug!(address = %address, user = %config.user, "opening ssh session");
            run_command(&config, &address, &command, timeout, &cancel)
        })
        .await
        .map_err(|e| RemoteError::Session(format!("ssh worker failed: {e}")))??;

        output.into_result()
    }
}
