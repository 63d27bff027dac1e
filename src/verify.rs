//! verify
//!
//! Deterministic structural audit of a genealogy.
//!
//! # Checks
//!
//! - Stem strain present
//! - Parent and child lists agree for every edge
//! - No duplicate edges, no edges to unregistered strains
//! - No non-stem strain without parents
//! - Every strain reachable from the stem
//! - No cycle through the ancestry
//!
//! # Invariants
//!
//! - Never mutates the genealogy
//! - Output is deterministic: defects are reported in identifier order
//!
//! The engine maintains these properties itself; the audit exists for
//! tests, debugging, and hosts that drive [`Genealogy::connect`] with
//! edges the engine accepts but cannot vouch for (a connect closing a
//! cycle is representable and is reported here, not rejected there).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use thiserror::Error;

use crate::genealogy::Genealogy;
use crate::node::Node;
use crate::strain::Strain;

/// Defects reported by the audit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("stem strain missing from the registry")]
    StemMissing,

    #[error("non-stem strain has no parents: {0}")]
    OrphanedStrain(String),

    #[error("edge references an unregistered strain: {from} -> {to}")]
    DanglingEdge { from: String, to: String },

    #[error("parent and child lists disagree: {child} -> {parent}")]
    AsymmetricLink { child: String, parent: String },

    #[error("duplicate edge: {child} -> {parent}")]
    DuplicateEdge { child: String, parent: String },

    #[error("strain not reachable from the stem: {0}")]
    Unreachable(String),

    #[error("cycle detected through strain: {0}")]
    CycleDetected(String),
}

/// Result of an audit pass.
#[derive(Debug)]
pub struct VerifyResult {
    /// Whether the audit passed
    pub ok: bool,
    /// Defects found during the audit
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    /// Create a passing result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: vec![],
        }
    }

    /// Create a failing result with defects.
    pub fn failure(errors: Vec<VerifyError>) -> Self {
        Self { ok: false, errors }
    }
}

/// Audit the whole genealogy.
pub fn verify<V: Strain>(genealogy: &Genealogy<V>) -> VerifyResult {
    let mut errors = Vec::new();
    let nodes = genealogy.node_map();
    let stem = genealogy.stem_id();

    if !nodes.contains_key(stem) {
        errors.push(VerifyError::StemMissing);
    }

    let mut entries: Vec<(&V::Id, &Node<V>)> = nodes.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for &(id, node) in &entries {
        for parent_id in node.parent_ids() {
            match nodes.get(parent_id) {
                None => errors.push(VerifyError::DanglingEdge {
                    from: label(id),
                    to: label(parent_id),
                }),
                Some(parent) if !parent.has_child(id) => {
                    errors.push(VerifyError::AsymmetricLink {
                        child: label(id),
                        parent: label(parent_id),
                    })
                }
                _ => {}
            }
        }
        for child_id in node.child_ids() {
            match nodes.get(child_id) {
                None => errors.push(VerifyError::DanglingEdge {
                    from: label(id),
                    to: label(child_id),
                }),
                Some(child) if !child.has_parent(id) => {
                    errors.push(VerifyError::AsymmetricLink {
                        child: label(child_id),
                        parent: label(id),
                    })
                }
                _ => {}
            }
        }

        for parent_id in duplicates(node.parent_ids()) {
            errors.push(VerifyError::DuplicateEdge {
                child: label(id),
                parent: label(parent_id),
            });
        }
        for child_id in duplicates(node.child_ids()) {
            errors.push(VerifyError::DuplicateEdge {
                child: label(child_id),
                parent: label(id),
            });
        }

        if id != stem && node.is_orphan() {
            errors.push(VerifyError::OrphanedStrain(label(id)));
        }
    }

    // Reachability sweep: breadth-first over children from the stem.
    let mut reachable: HashSet<&V::Id> = HashSet::new();
    let mut queue: VecDeque<&V::Id> = VecDeque::new();
    if nodes.contains_key(stem) {
        queue.push_back(stem);
    }
    while let Some(current) = queue.pop_front() {
        if reachable.insert(current) {
            if let Some(node) = nodes.get(current) {
                queue.extend(node.child_ids());
            }
        }
    }
    for &(id, _) in &entries {
        if !reachable.contains(id) {
            errors.push(VerifyError::Unreachable(label(id)));
        }
    }

    // Cycle scan: depth-first over parents with a path set.
    let mut visited: HashSet<&V::Id> = HashSet::new();
    for &(id, _) in &entries {
        let mut path = HashSet::new();
        if has_cycle_from(nodes, id, &mut visited, &mut path) {
            errors.push(VerifyError::CycleDetected(label(id)));
        }
    }

    if errors.is_empty() {
        VerifyResult::success()
    } else {
        VerifyResult::failure(errors)
    }
}

fn has_cycle_from<'a, V: Strain>(
    nodes: &'a HashMap<V::Id, Node<V>>,
    id: &'a V::Id,
    visited: &mut HashSet<&'a V::Id>,
    path: &mut HashSet<&'a V::Id>,
) -> bool {
    if path.contains(id) {
        return true;
    }
    if visited.contains(id) {
        return false;
    }

    visited.insert(id);
    path.insert(id);

    if let Some(node) = nodes.get(id) {
        for parent_id in node.parent_ids() {
            if has_cycle_from(nodes, parent_id, visited, path) {
                return true;
            }
        }
    }

    path.remove(id);
    false
}

/// Identifiers appearing more than once, each reported once.
fn duplicates<Id: PartialEq>(ids: &[Id]) -> Vec<&Id> {
    let mut seen: Vec<&Id> = Vec::new();
    let mut dups: Vec<&Id> = Vec::new();
    for id in ids {
        if seen.contains(&id) {
            if !dups.contains(&id) {
                dups.push(id);
            }
        } else {
            seen.push(id);
        }
    }
    dups
}

fn label<Id: Debug>(id: &Id) -> String {
    format!("{id:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Sample(u32);

    impl Strain for Sample {
        type Id = u32;

        fn from_id(id: u32) -> Self {
            Sample(id)
        }

        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn fresh_genealogy_passes() {
        let g: Genealogy<Sample> = Genealogy::new(0);
        let report = verify(&g);
        assert!(report.ok);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn healthy_lineage_passes() {
        let mut g: Genealogy<Sample> = Genealogy::new(0);
        g.create(1, &0).unwrap();
        g.create(2, &0).unwrap();
        g.create_recombinant(3, &[1, 2]).unwrap();
        g.remove(&1).unwrap();

        assert!(verify(&g).ok);
    }

    #[test]
    fn cycle_closed_by_connect_is_reported() {
        let mut g: Genealogy<Sample> = Genealogy::new(0);
        g.create(1, &0).unwrap();
        g.create(2, &1).unwrap();
        // 1 now descends from its own descendant.
        g.connect(&1, &2).unwrap();

        let report = verify(&g);
        assert!(!report.ok);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, VerifyError::CycleDetected(_))));
    }

    #[test]
    fn cycle_island_left_by_removal_is_reported() {
        let mut g: Genealogy<Sample> = Genealogy::new(0);
        g.create(1, &0).unwrap();
        g.create(2, &1).unwrap();
        g.create(3, &2).unwrap();
        // Mutual ancestry between 2 and 3 keeps both alive once 1 goes.
        g.connect(&2, &3).unwrap();
        g.remove(&1).unwrap();

        let report = verify(&g);
        assert!(!report.ok);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, VerifyError::Unreachable(_))));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, VerifyError::CycleDetected(_))));
    }

    #[test]
    fn defect_order_is_deterministic() {
        let mut g: Genealogy<Sample> = Genealogy::new(0);
        g.create(1, &0).unwrap();
        g.create(2, &1).unwrap();
        g.connect(&1, &2).unwrap();
        g.remove(&0).unwrap_err();

        let first = verify(&g).errors;
        let second = verify(&g).errors;
        assert_eq!(first, second);
    }

    #[test]
    fn duplicates_reports_each_repeat_once() {
        assert_eq!(duplicates(&[1, 2, 1, 1, 3, 2]), vec![&1, &2]);
        assert!(duplicates::<u32>(&[]).is_empty());
    }
}
