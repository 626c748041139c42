//! Partition a flat machine list into one master and an ordered slave set.

use crate::error::{FleetError, FleetResult};
use crate::machine::{Machine, Role};

/// Result of classification.
///
/// A machine appears in at most one group. Unclassified machines appear in
/// neither. Slaves keep input order and are not deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetView {
    pub master: Option<Machine>,
    pub slaves: Vec<Machine>,
}

impl FleetView {
    pub fn is_empty(&self) -> bool {
        self.master.is_none() && self.slaves.is_empty()
    }
}

/// Classify machines by name prefix.
///
/// If several machines carry the master prefix the **last** one wins. Fleets
/// are expected to hold at most one master; use [`classify_strict`] when that
/// cannot be guaranteed.
pub fn classify<I>(machines: I) -> FleetView
where
    I: IntoIterator<Item = Machine>,
{
    let mut view = FleetView::default();
    for machine in machines {
        match machine.role() {
            Role::Master => view.master = Some(machine),
            Role::Slave => view.slaves.push(machine),
            Role::Unclassified => {}
        }
    }
    view
}

/// Classify machines, rejecting fleets with more than one master candidate.
pub fn classify_strict<I>(machines: I) -> FleetResult<FleetView>
where
    I: IntoIterator<Item = Machine>,
{
    let machines: Vec<Machine> = machines.into_iter().collect();
    let masters: Vec<String> = machines
        .iter()
        .filter(|m| m.role() == Role::Master)
        .map(|m| m.name.clone())
        .collect();
    if masters.len() > 1 {
        return Err(FleetError::AmbiguousMaster { names: masters });
    }
    Ok(classify(machines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(names: &[&str]) -> Vec<Machine> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Machine::new(i.to_string(), *n))
            .collect()
    }

    #[test]
    fn test_empty_input_yields_empty_view() {
        let view = classify(Vec::new());
        assert!(view.is_empty());
    }

    #[test]
    fn test_slaves_keep_input_order_and_others_dropped() {
        let view = classify(named(&["slave2", "other", "master", "slave0", "slave1"]));
        let slaves: Vec<&str> = view.slaves.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(slaves, vec!["slave2", "slave0", "slave1"]);
        assert_eq!(view.master.unwrap().name, "master");
    }

    #[test]
    fn test_last_master_wins() {
        let view = classify(named(&["master-a", "slave0", "master-b"]));
        let master = view.master.unwrap();
        assert_eq!(master.name, "master-b");
        assert_eq!(master.id.0, "2");
    }

    #[test]
    fn test_duplicate_slaves_not_deduplicated() {
        let mut machines = named(&["slave0"]);
        machines.push(machines[0].clone());
        let view = classify(machines);
        assert_eq!(view.slaves.len(), 2);
    }

    #[test]
    fn test_strict_rejects_two_masters() {
        let err = classify_strict(named(&["master1", "master2"])).unwrap_err();
        match err {
            FleetError::AmbiguousMaster { names } => {
                assert_eq!(names, vec!["master1".to_string(), "master2".to_string()])
            }
            other => panic!("expected AmbiguousMaster, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_accepts_single_master() {
        let view = classify_strict(named(&["master", "slave0"])).unwrap();
        assert_eq!(view.master.unwrap().name, "master");
        assert_eq!(view.slaves.len(), 1);
    }
}
