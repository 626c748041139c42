//! Machine records and the name-derived role vocabulary.

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Name prefix that marks the control-plane machine.
pub const MASTER_PREFIX: &str = "master";

/// Name prefix that marks a data-plane worker.
pub const SLAVE_PREFIX: &str = "slave";

/// Provider-assigned machine identifier. Opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineId(pub String);

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MachineId {
    fn from(id: u64) -> Self {
        MachineId(id.to_string())
    }
}

/// Which network interface an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Public,
    Private,
}

impl std::fmt::Display for AddressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressKind::Public => write!(f, "public"),
            AddressKind::Private => write!(f, "private"),
        }
    }
}

/// A read-only view of one provisioned machine.
///
/// Addresses stay `None` until the provider finishes network provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub public_ipv4: Option<String>,
    pub private_ipv4: Option<String>,
}

impl Machine {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MachineId(id.into()),
            name: name.into(),
            public_ipv4: None,
            private_ipv4: None,
        }
    }

    pub fn with_public(mut self, addr: impl Into<String>) -> Self {
        self.public_ipv4 = Some(addr.into());
        self
    }

    pub fn with_private(mut self, addr: impl Into<String>) -> Self {
        self.private_ipv4 = Some(addr.into());
        self
    }

    pub fn role(&self) -> Role {
        Role::from_name(&self.name)
    }

    /// Look up an address, treating an empty string as absent.
    pub fn address(&self, kind: AddressKind) -> Option<&str> {
        let addr = match kind {
            AddressKind::Public => self.public_ipv4.as_deref(),
            AddressKind::Private => self.private_ipv4.as_deref(),
        };
        addr.map(str::trim).filter(|a| !a.is_empty())
    }

    /// Like [`Machine::address`], but reports absence as
    /// [`FleetError::AddressUnresolved`].
    pub fn require_address(&self, kind: AddressKind) -> FleetResult<&str> {
        self.address(kind)
            .ok_or_else(|| FleetError::AddressUnresolved {
                node: self.name.clone(),
                kind,
            })
    }
}

/// Role of a machine within one fleet, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Master,
    Slave,
    Unclassified,
}

impl Role {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with(MASTER_PREFIX) {
            Role::Master
        } else if name.starts_with(SLAVE_PREFIX) {
            Role::Slave
        } else {
            Role::Unclassified
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Master => "master",
            Role::Slave => "slave",
            Role::Unclassified => "unclassified",
        };
        write!(f, "{s}")
    }
}
