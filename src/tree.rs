use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use clap::ValueEnum;

use crate::table::ProcessTable;
use crate::Pid;

/// Process forest: each node maps a child pid to that child's own subtree,
/// an empty map is a leaf.
///
/// The outermost node is anonymous and its children are the roots: processes
/// whose recorded parent is the pid 0 sentinel or has already exited.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessTree {
    children: BTreeMap<Pid, ProcessTree>,
}

impl ProcessTree {
    pub fn new() -> ProcessTree {
        ProcessTree::default()
    }

    /// Build the forest for a whole table by inserting every pid's ancestor
    /// chain. O(n.d) for n processes at depth d, fine at /proc scale.
    pub fn from_table(table: &ProcessTable) -> ProcessTree {
        let mut tree = ProcessTree::new();
        for pid in table.pids() {
            tree.insert_path(&table.ancestors(pid));
        }
        tree
    }

    /// Insert a root-first pid path, reusing any existing prefix. Inserting
    /// the same path twice is a no-op.
    pub fn insert_path(&mut self, path: &[Pid]) {
        let Some((&first, rest)) = path.split_first() else {
            return;
        };
        self.children.entry(first).or_default().insert_path(rest);
    }

    /// Subtree rooted at `pid`, looked up anywhere in the forest.
    pub fn find(&self, pid: Pid) -> Option<&ProcessTree> {
        if let Some(subtree) = self.children.get(&pid) {
            return Some(subtree);
        }
        self.children.values().find_map(|child| child.find(pid))
    }

    /// Lineage of `pid`: every pid on the path from a root down to `pid`,
    /// plus every pid in the subtree below it. Empty when `pid` is not in
    /// the forest.
    pub fn family(&self, pid: Pid) -> HashSet<Pid> {
        let mut family = HashSet::new();
        self.collect_family(pid, &mut Vec::new(), &mut family);
        family
    }

    fn collect_family(
        &self,
        target: Pid,
        path: &mut Vec<Pid>,
        family: &mut HashSet<Pid>,
    ) -> bool {
        for (&pid, subtree) in &self.children {
            if pid == target {
                family.extend(path.iter().copied());
                family.insert(pid);
                subtree.collect_pids(family);
                return true;
            }
            path.push(pid);
            let found = subtree.collect_family(target, path, family);
            path.pop();
            if found {
                return true;
            }
        }
        false
    }

    fn collect_pids(&self, out: &mut HashSet<Pid>) {
        for (&pid, subtree) in &self.children {
            out.insert(pid);
            subtree.collect_pids(out);
        }
    }

    /// Number of nodes in the forest.
    pub fn len(&self) -> usize {
        self.children.values().map(|child| child.len() + 1).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Length of the longest chain below this node, 0 for a leaf.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Depth-first pre-order flattening into (depth, pid) pairs, roots at
    /// depth 0. `cmp` decides the visiting order between siblings; the output
    /// length always equals the node count.
    pub fn flatten<F>(&self, cmp: &mut F) -> Vec<(usize, Pid)>
    where
        F: FnMut((Pid, &ProcessTree), (Pid, &ProcessTree)) -> Ordering,
    {
        let mut flat = Vec::new();
        self.flatten_into(0, cmp, &mut flat);
        flat
    }

    fn flatten_into<F>(&self, depth: usize, cmp: &mut F, flat: &mut Vec<(usize, Pid)>)
    where
        F: FnMut((Pid, &ProcessTree), (Pid, &ProcessTree)) -> Ordering,
    {
        let mut children: Vec<(&Pid, &ProcessTree)> = self.children.iter().collect();
        children.sort_by(|a, b| cmp((*a.0, a.1), (*b.0, b.1)));

        for (&pid, subtree) in children {
            flat.push((depth, pid));
            subtree.flatten_into(depth + 1, cmp, flat);
        }
    }
}

/// Sibling ordering in the printed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChildOrder {
    /// Deepest subtree first, so the busiest branches print first
    Depth,
    /// Lexical by command name
    Command,
}

impl ChildOrder {
    /// Comparator over sibling (pid, subtree) pairs. Both policies break
    /// ties by pid ascending, which keeps the listing deterministic.
    pub fn comparator<'a>(
        self,
        table: &'a ProcessTable,
    ) -> impl FnMut((Pid, &ProcessTree), (Pid, &ProcessTree)) -> Ordering + 'a {
        move |(a_pid, a_sub), (b_pid, b_sub)| match self {
            ChildOrder::Depth => b_sub
                .depth()
                .cmp(&a_sub.depth())
                .then(a_pid.cmp(&b_pid)),
            ChildOrder::Command => table
                .command(a_pid)
                .cmp(&table.command(b_pid))
                .then(a_pid.cmp(&b_pid)),
        }
    }
}
