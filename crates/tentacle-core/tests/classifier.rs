//! Classification laws checked over every short sequence of sample names.

use tentacle_core::{classify, Machine, Role};

const NAMES: &[&str] = &["master", "master-b", "slave0", "slave1", "other", ""];

/// Every sequence of `NAMES` up to `max_len` entries, ids encoding position.
fn sequences(max_len: usize) -> Vec<Vec<Machine>> {
    let mut out = vec![Vec::new()];
    let mut frontier: Vec<Vec<&str>> = vec![Vec::new()];
    for _ in 0..max_len {
        let mut next = Vec::new();
        for seq in &frontier {
            for name in NAMES {
                let mut extended = seq.clone();
                extended.push(name);
                next.push(extended);
            }
        }
        for seq in &next {
            out.push(
                seq.iter()
                    .enumerate()
                    .map(|(i, n)| Machine::new(i.to_string(), *n))
                    .collect(),
            );
        }
        frontier = next;
    }
    out
}

#[test]
fn test_classification_laws_hold_for_all_short_sequences() {
    for machines in sequences(4) {
        let view = classify(machines.clone());

        let expected_slaves: Vec<&Machine> = machines
            .iter()
            .filter(|m| m.name.starts_with("slave"))
            .collect();
        let got_slaves: Vec<&Machine> = view.slaves.iter().collect();
        assert_eq!(got_slaves, expected_slaves, "slave group for {machines:?}");

        let last_master = machines.iter().rev().find(|m| m.name.starts_with("master"));
        assert_eq!(view.master.as_ref(), last_master, "master for {machines:?}");

        if let Some(master) = &view.master {
            assert!(!view.slaves.iter().any(|s| s.id == master.id));
        }
        assert!(view
            .slaves
            .iter()
            .chain(view.master.iter())
            .all(|m| m.role() != Role::Unclassified));
    }
}
