//! Cloud fleet provider seam plus fleet-wide create/delete helpers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FleetResult;
use crate::machine::{Machine, MachineId, MASTER_PREFIX, SLAVE_PREFIX};

/// Default number of slaves created alongside the master.
pub const DEFAULT_SLAVE_COUNT: usize = 5;

/// Sizing and networking options for a new machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub region: String,
    pub size: String,
    /// Image slug, e.g. `docker`.
    pub image: String,
    pub private_networking: bool,
    /// Fingerprints of SSH keys installed for root on first boot.
    pub ssh_key_fingerprints: Vec<String>,
}

impl Default for MachineSpec {
    fn default() -> Self {
        Self {
            region: "sfo1".to_string(),
            size: "512mb".to_string(),
            image: "docker".to_string(),
            private_networking: true,
            ssh_key_fingerprints: Vec::new(),
        }
    }
}

/// Account-level access to compute instances.
#[async_trait]
pub trait FleetProvider: Send + Sync {
    /// List every machine, following provider pagination transparently.
    async fn list(&self) -> FleetResult<Vec<Machine>>;

    /// Create one machine.
    async fn create(&self, name: &str, spec: &MachineSpec) -> FleetResult<Machine>;

    /// Delete one machine by id.
    async fn delete(&self, id: &MachineId) -> FleetResult<()>;
}

/// Create `master` followed by `slave0..slave{N-1}`, stopping at the first error.
pub async fn create_fleet(
    provider: &dyn FleetProvider,
    slave_count: usize,
    spec: &MachineSpec,
) -> FleetResult<Vec<Machine>> {
    let mut created = Vec::with_capacity(slave_count + 1);

    info!(name = MASTER_PREFIX, "creating master");
    created.push(provider.create(MASTER_PREFIX, spec).await?);

    for i in 0..slave_count {
        let name = format!("{SLAVE_PREFIX}{i}");
        info!(name = %name, "creating slave");
        created.push(provider.create(&name, spec).await?);
    }
    Ok(created)
}

/// Delete every machine in the account, stopping at the first error.
///
/// Returns the number of machines deleted.
pub async fn delete_all(provider: &dyn FleetProvider) -> FleetResult<usize> {
    info!("deleting all machines");
    let machines = provider.list().await?;
    for machine in &machines {
        info!(id = %machine.id, name = %machine.name, "deleting machine");
        provider.delete(&machine.id).await?;
    }
    Ok(machines.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryFleetProvider;

    #[tokio::test]
    async fn test_create_fleet_names_master_then_slaves() {
        let provider = MemoryFleetProvider::new();
        let created = create_fleet(&provider, 3, &MachineSpec::default())
            .await
            .unwrap();

        let names: Vec<&str> = created.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["master", "slave0", "slave1", "slave2"]);
        assert_eq!(provider.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_create_fleet_stops_at_first_error() {
        let provider = MemoryFleetProvider::new().fail_create_on("slave1");
        let result = create_fleet(&provider, 3, &MachineSpec::default()).await;

        assert!(result.is_err());
        let names: Vec<String> = provider
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["master".to_string(), "slave0".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_all_empties_account() {
        let provider = MemoryFleetProvider::new();
        create_fleet(&provider, 2, &MachineSpec::default())
            .await
            .unwrap();

        let deleted = delete_all(&provider).await.unwrap();
        assert_eq!(deleted, 3);
        assert!(provider.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_default_spec_matches_small_docker_droplet() {
        let spec = MachineSpec::default();
        assert_eq!(spec.region, "sfo1");
        assert_eq!(spec.size, "512mb");
        assert_eq!(spec.image, "docker");
        assert!(spec.private_networking);
    }
}
