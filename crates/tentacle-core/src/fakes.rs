//! In-memory fakes for the executor and provider seams (testing only)
//!
//! `RecordingExecutor` records every call and replays a per-address script.
//! `MemoryFleetProvider` keeps machines in a `Vec` with sequential ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{FleetError, FleetResult, RemoteError, RemoteResult};
use crate::executor::RemoteExecutor;
use crate::machine::{Machine, MachineId};
use crate::provider::{FleetProvider, MachineSpec};

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// One recorded executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub address: String,
    pub command: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
enum Script {
    Respond {
        output: String,
        delay: Option<Duration>,
    },
    Fail(RemoteError),
    Hang,
}

/// Executor that records calls and answers from a per-address script.
///
/// Unscripted addresses succeed immediately with empty output.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecCall>>,
    tokens: Mutex<Vec<CancellationToken>>,
    scripts: Mutex<HashMap<String, Script>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, address: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), script);
        self
    }

    pub fn respond(self, address: &str, output: &str) -> Self {
        self.script(
            address,
            Script::Respond {
                output: output.to_string(),
                delay: None,
            },
        )
    }

    /// Succeed after `delay`; useful with paused time to observe overlap.
    pub fn respond_after(self, address: &str, output: &str, delay: Duration) -> Self {
        self.script(
            address,
            Script::Respond {
                output: output.to_string(),
                delay: Some(delay),
            },
        )
    }

    pub fn fail(self, address: &str, error: RemoteError) -> Self {
        self.script(address, Script::Fail(error))
    }

    /// Never complete. Models a hung remote session.
    pub fn hang(self, address: &str) -> Self {
        self.script(address, Script::Hang)
    }

    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.address).collect()
    }

    /// Calls whose cancellation token has fired.
    pub fn cancelled_calls(&self) -> usize {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_cancelled())
            .count()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn run(
        &self,
        address: &str,
        command: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> RemoteResult<String> {
        self.calls.lock().unwrap().push(ExecCall {
            address: address.to_string(),
            command: command.to_string(),
            timeout,
        });
        self.tokens.lock().unwrap().push(cancel.clone());
        let script = self.scripts.lock().unwrap().get(address).cloned();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match script {
            None => Ok(String::new()),
            Some(Script::Respond { output, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(output)
            }
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Hang) => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// MemoryFleetProvider
// ---------------------------------------------------------------------------

/// In-memory provider backed by a `Vec<Machine>`.
#[derive(Debug, Default)]
pub struct MemoryFleetProvider {
    machines: Mutex<Vec<Machine>>,
    next_id: AtomicUsize,
    fail_create_on: Option<String>,
}

impl MemoryFleetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_machines(machines: Vec<Machine>) -> Self {
        Self {
            next_id: AtomicUsize::new(machines.len()),
            machines: Mutex::new(machines),
            fail_create_on: None,
        }
    }

    /// Make `create` fail for the given machine name.
    pub fn fail_create_on(mut self, name: &str) -> Self {
        self.fail_create_on = Some(name.to_string());
        self
    }
}

#[async_trait]
impl FleetProvider for MemoryFleetProvider {
    async fn list(&self) -> FleetResult<Vec<Machine>> {
        Ok(self.machines.lock().unwrap().clone())
    }

    async fn create(&self, name: &str, _spec: &MachineSpec) -> FleetResult<Machine> {
        if self.fail_create_on.as_deref() == Some(name) {
            return Err(FleetError::Provider(format!("create {name} rejected")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let machine = Machine::new(id.to_string(), name);
        self.machines.lock().unwrap().push(machine.clone());
        Ok(machine)
    }

    async fn delete(&self, id: &MachineId) -> FleetResult<()> {
        let mut machines = self.machines.lock().unwrap();
        let before = machines.len();
        machines.retain(|m| &m.id != id);
        if machines.len() == before {
            return Err(FleetError::Provider(format!("machine {id} not found")));
        }
        Ok(())
    }
}
