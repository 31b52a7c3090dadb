//! Tree listing of the processes running on the system.
//!
//! One snapshot of /proc is turned into a table of (pid, ppid) records, the
//! table into a forest organized by parent/child relationships, and the
//! forest into an ordered, indented listing. The listing can be restricted
//! to the lineages (ancestors + descendants) of a chosen set of pids.

use std::collections::HashSet;

use itertools::Itertools;
use log::warn;

pub mod render;
pub mod table;
pub mod tree;

use crate::table::ProcessTable;
use crate::tree::ProcessTree;

/// Process identifier. 0 or negative means "no parent".
pub type Pid = i32;

/// Restrict `table` and `tree` to the union of the lineages of `targets`.
///
/// Targets are deduplicated; a pid not present in the table is dropped with
/// a warning. Returns `None` when no valid target remains, the caller then
/// falls back to the unrestricted forest.
///
/// The restricted forest is rebuilt from a filtered copy of the table rather
/// than spliced out of the full tree: overlapping ancestor chains merge
/// through idempotent insertion, so the result is always a well-formed
/// forest containing exactly the union of the lineages.
pub fn lineage_forest(
    table: &ProcessTable,
    tree: &ProcessTree,
    targets: &[Pid],
) -> Option<(ProcessTable, ProcessTree)> {
    let mut keep: HashSet<Pid> = HashSet::new();
    let mut valid = 0;

    for &target in targets.iter().unique() {
        if !table.contains(target) {
            warn!("pid {target} is not running, ignoring");
            continue;
        }
        valid += 1;
        keep.extend(tree.family(target));
    }

    if valid == 0 {
        return None;
    }

    let restricted = table.restrict(&keep);
    let tree = ProcessTree::from_table(&restricted);
    Some((restricted, tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ProcessRecord;

    fn record(pid: Pid, ppid: Pid) -> ProcessRecord {
        ProcessRecord {
            pid,
            ppid,
            comm: format!("comm{pid}"),
            executable: format!("/usr/bin/cmd{pid}"),
            args: vec![format!("cmd{pid}")],
            envs: vec![],
        }
    }

    fn sample() -> (ProcessTable, ProcessTree) {
        let table = ProcessTable::from_records([
            record(1, 0),
            record(2, 1),
            record(3, 1),
            record(4, 2),
        ]);
        let tree = ProcessTree::from_table(&table);
        (table, tree)
    }

    #[test]
    fn restriction_keeps_exactly_the_lineage() {
        let (table, tree) = sample();

        let (restricted, subtree) = lineage_forest(&table, &tree, &[4]).unwrap();

        // ancestors of 4 plus 4 itself; 3 is out
        assert_eq!(restricted.len(), 3);
        assert!(restricted.contains(1));
        assert!(restricted.contains(2));
        assert!(restricted.contains(4));
        assert_eq!(subtree.len(), 3);
        assert!(subtree.find(3).is_none());
        // 1 has no in-closure parent, so it is the single root
        assert_eq!(subtree.family(1).len(), 3);
    }

    #[test]
    fn overlapping_targets_merge_without_duplicates() {
        let (table, tree) = sample();

        let (restricted, subtree) = lineage_forest(&table, &tree, &[4, 2, 4]).unwrap();

        // family(4) and family(2) are the same closure
        assert_eq!(restricted.len(), 3);
        assert_eq!(subtree.len(), 3);
    }

    #[test]
    fn unknown_targets_are_dropped() {
        let (table, tree) = sample();

        let (restricted, _) = lineage_forest(&table, &tree, &[99, 3]).unwrap();

        assert_eq!(restricted.len(), 2);
        assert!(restricted.contains(1));
        assert!(restricted.contains(3));
    }

    #[test]
    fn no_valid_target_means_no_restriction() {
        let (table, tree) = sample();

        assert!(lineage_forest(&table, &tree, &[]).is_none());
        assert!(lineage_forest(&table, &tree, &[99, 1000]).is_none());
    }

    #[test]
    fn restricted_roots_reparent_when_ancestors_drop_out() {
        // 5's parent 99 never made it into the table
        let table = ProcessTable::from_records([record(1, 0), record(5, 99), record(6, 5)]);
        let tree = ProcessTree::from_table(&table);

        let (restricted, subtree) = lineage_forest(&table, &tree, &[6]).unwrap();

        assert_eq!(restricted.len(), 2);
        assert!(subtree.find(5).is_some());
        assert_eq!(subtree.family(5), [5, 6].into_iter().collect());
    }
}
