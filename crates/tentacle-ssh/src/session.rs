//! Blocking SSH session: connect, authenticate, run one command.

use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

use ssh2::{ErrorCode, HashType, Session};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use tentacle_core::{RemoteError, RemoteResult};

use crate::SshConfig;

/// libssh2's `LIBSSH2_ERROR_TIMEOUT`.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Captured result of a finished remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    /// Stdout on a zero exit, [`RemoteError::CommandFailed`] otherwise.
    pub fn into_result(self) -> RemoteResult<String> {
        if self.exit_status == 0 {
            Ok(self.stdout)
        } else {
            Err(RemoteError::CommandFailed {
                exit_status: self.exit_status,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Run `command` on `address` and wait for it to exit.
///
/// When called inside a Tokio runtime, firing `cancel` shuts the socket down
/// so a blocked handshake or read returns [`RemoteError::Cancelled`].
pub fn run_command(
    config: &SshConfig,
    address: &str,
    command: &str,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> RemoteResult<CommandOutput> {
    let started = Instant::now();
    check_key_file(&config.private_key)?;
    if cancel.is_cancelled() {
        return Err(RemoteError::Cancelled);
    }

    let socket = resolve(address, config.port)?;
    let tcp = match timeout.or(config.connect_timeout) {
        Some(limit) => TcpStream::connect_timeout(&socket, limit),
        None => TcpStream::connect(socket),
    }
    .map_err(|e| RemoteError::Connect {
        address: socket.to_string(),
        detail: e.to_string(),
    })?;

    let _watch = watch_cancellation(&tcp, cancel);
    exchange(config, socket, tcp, command, timeout, started).map_err(|e| {
        if cancel.is_cancelled() {
            RemoteError::Cancelled
        } else {
            e
        }
    })
}

/// Shut `tcp` down once `cancel` fires. The watch ends when the guard drops.
fn watch_cancellation(tcp: &TcpStream, cancel: &CancellationToken) -> Option<DropGuard> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let stream = match tcp.try_clone() {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "cannot watch ssh socket for cancellation");
            return None;
        }
    };
    let cancel = cancel.clone();
    let finished = CancellationToken::new();
    let done = finished.clone();
    handle.spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("cancelled, closing ssh socket");
                let _ = stream.shutdown(Shutdown::Both);
            }
            _ = done.cancelled() => {}
        }
    });
    Some(finished.drop_guard())
}

fn exchange(
    config: &SshConfig,
    socket: SocketAddr,
    tcp: TcpStream,
    command: &str,
    timeout: Option<Duration>,
    started: Instant,
) -> RemoteResult<CommandOutput> {
    let mut session = Session::new().map_err(|e| RemoteError::Session(e.to_string()))?;
    if let Some(limit) = timeout {
        session.set_timeout(limit.as_millis().min(u32::MAX as u128) as u32);
    }
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| RemoteError::Handshake {
        address: socket.to_string(),
        detail: e.to_string(),
    })?;

    if let Some(hash) = session.host_key_hash(HashType::Sha256) {
        debug!(address = %socket, fingerprint = %hex::encode(hash), "host key");
    }

    session
        .userauth_pubkey_file(
            &config.user,
            None,
            &config.private_key,
            config.passphrase.as_deref(),
        )
        .map_err(|e| RemoteError::Auth {
            user: config.user.clone(),
            detail: e.to_string(),
        })?;
    if !session.authenticated() {
        return Err(RemoteError::Auth {
            user: config.user.clone(),
            detail: "server did not accept the key".to_string(),
        });
    }

    let io_err = |e: ssh2::Error| session_error(e, started);

    let mut channel = session.channel_session().map_err(io_err)?;
    channel.exec(command).map_err(io_err)?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| read_error(e, started))?;
    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| read_error(e, started))?;

    channel.wait_close().map_err(io_err)?;
    let exit_status = channel.exit_status().map_err(io_err)?;

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_status,
    })
}

fn check_key_file(path: &Path) -> RemoteResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RemoteError::Credential(format!(
            "private key file does not exist: {}",
            path.display()
        )))
    }
}

fn resolve(address: &str, port: u16) -> RemoteResult<SocketAddr> {
    (address, port)
        .to_socket_addrs()
        .map_err(|e| RemoteError::Connect {
            address: format!("{address}:{port}"),
            detail: e.to_string(),
        })?
        .next()
        .ok_or_else(|| RemoteError::Connect {
            address: format!("{address}:{port}"),
            detail: "address resolved to nothing".to_string(),
        })
}

fn session_error(err: ssh2::Error, started: Instant) -> RemoteError {
    if matches!(err.code(), ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)) {
        RemoteError::TimedOut {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    } else {
        RemoteError::Session(err.to_string())
    }
}

fn read_error(err: std::io::Error, started: Instant) -> RemoteError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => RemoteError::TimedOut {
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        _ => RemoteError::Session(format!("reading command output: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_exit_returns_stdout() {
        let output = CommandOutput {
            stdout: "proxy started\n".to_string(),
            stderr: String::new(),
            exit_status: 0,
        };
        assert_eq!(output.into_result().unwrap(), "proxy started\n");
    }

    #[test]
    fn test_non_zero_exit_is_command_failed() {
        let output = CommandOutput {
            stdout: "partial".to_string(),
            stderr: "docker: not found".to_string(),
            exit_status: 127,
        };
        match output.into_result() {
            Err(RemoteError::CommandFailed {
                exit_status,
                stdout,
                stderr,
            }) => {
                assert_eq!(exit_status, 127);
                assert_eq!(stdout, "partial");
                assert_eq!(stderr, "docker: not found");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let config = SshConfig::new(dir.path().join("id_rsa"));
        // Unroutable address: reaching the network would hang or fail differently.
        let err = run_command(&config, "192.0.2.1", "true", None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, RemoteError::Credential(_)));
    }

    #[test]
    fn test_cancelled_token_fails_before_connecting() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let config = SshConfig::new(key.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_command(&config, "192.0.2.1", "true", None, &cancel).unwrap_err();
        assert_eq!(err, RemoteError::Cancelled);
    }

    #[test]
    fn test_resolve_literal_address() {
        let socket = resolve("10.0.0.1", 22).unwrap();
        assert_eq!(socket.to_string(), "10.0.0.1:22");
    }

    #[test]
    fn test_timed_out_read_maps_to_timeout() {
        let err = read_error(
            std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"),
            Instant::now(),
        );
        assert!(matches!(err, RemoteError::TimedOut { .. }));

        let err = read_error(
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
            Instant::now(),
        );
        assert!(matches!(err, RemoteError::Session(_)));
    }
}
