use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use log::{debug, warn};
use procfs::process::Process;

use crate::Pid;

/// State of one process, captured once at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub ppid: Pid,
    /// Kernel task name from /proc/<pid>/stat, always available
    pub comm: String,
    /// Full path of the executable, empty if unreadable
    pub executable: String,
    pub args: Vec<String>,
    pub envs: Vec<String>,
}

impl ProcessRecord {
    fn capture(process: &Process) -> procfs::ProcResult<ProcessRecord> {
        let stat = process.stat()?;

        // exe, cmdline and environ need more permissions than stat, and are
        // empty for kernel threads. Missing detail is not a reason to drop
        // the process from the snapshot.
        let executable = process
            .exe()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();
        let args = process.cmdline().unwrap_or_default();
        let mut envs: Vec<String> = process
            .environ()
            .map(|environ| {
                environ
                    .iter()
                    .map(|(k, v)| format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
                    .collect()
            })
            .unwrap_or_default();
        // /proc/<pid>/environ is exposed as a map, sort to get a stable listing
        envs.sort();

        Ok(ProcessRecord {
            pid: process.pid,
            ppid: stat.ppid,
            comm: stat.comm,
            executable,
            args,
            envs,
        })
    }

    /// Short display name: base name of the executable, else of argv[0],
    /// else the bracketed comm (kernel threads, unreadable processes).
    pub fn command(&self) -> String {
        if let Some(name) = basename(&self.executable) {
            return name.to_string();
        }
        if let Some(name) = self.args.first().and_then(|argv0| basename(argv0)) {
            return name.to_string();
        }
        format!("[{}]", self.comm)
    }
}

fn basename(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Snapshot of the running processes, keyed by pid. Built once per run,
/// read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct ProcessTable {
    records: BTreeMap<Pid, ProcessRecord>,
}

impl ProcessTable {
    /// Capture every process currently listed in /proc.
    ///
    /// Failing to enumerate /proc at all is an error. A single process that
    /// vanishes between enumeration and detail read is skipped: its children,
    /// if any, surface as roots of their own branches.
    pub fn snapshot() -> Result<ProcessTable> {
        let processes =
            procfs::process::all_processes().context("can't enumerate processes in /proc")?;

        let mut records = BTreeMap::new();
        for process in processes {
            let process = match process {
                Ok(process) => process,
                Err(e) => {
                    debug!("skipping unreadable process entry: {e}");
                    continue;
                }
            };
            match ProcessRecord::capture(&process) {
                Ok(record) => {
                    records.insert(record.pid, record);
                }
                Err(e) => debug!("process {} vanished mid-snapshot: {e}", process.pid),
            }
        }

        Ok(ProcessTable { records })
    }

    pub fn from_records(records: impl IntoIterator<Item = ProcessRecord>) -> ProcessTable {
        ProcessTable {
            records: records.into_iter().map(|r| (r.pid, r)).collect(),
        }
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.records.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pids in ascending order.
    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.records.keys().copied()
    }

    /// Display name for a pid, "?" when the pid is not in the table.
    pub fn command(&self, pid: Pid) -> String {
        self.get(pid)
            .map(|record| record.command())
            .unwrap_or_else(|| String::from("?"))
    }

    /// Ancestor chain of `pid`: root first, `pid` last.
    ///
    /// The walk stops at the pid 0 sentinel, at a parent missing from the
    /// table (exited since), or when it would revisit a pid already on the
    /// chain. /proc is read live, so pid reuse during the snapshot can close
    /// a parent loop; the smallest pid of the loop becomes the root so that
    /// walks entering the loop anywhere agree on one chain.
    pub fn ancestors(&self, pid: Pid) -> Vec<Pid> {
        let mut chain = vec![pid];
        let mut seen: HashSet<Pid> = HashSet::from([pid]);

        let mut current = pid;
        while let Some(record) = self.records.get(&current) {
            let ppid = record.ppid;
            if ppid <= 0 || !self.records.contains_key(&ppid) {
                break;
            }
            if !seen.insert(ppid) {
                warn!("parent chain of pid {pid} loops at {ppid}");
                truncate_at_loop_root(&mut chain, ppid);
                break;
            }
            chain.push(ppid);
            current = ppid;
        }

        chain.reverse();
        chain
    }

    /// Copy of the table containing only the `keep` pids.
    pub fn restrict(&self, keep: &HashSet<Pid>) -> ProcessTable {
        ProcessTable {
            records: self
                .records
                .iter()
                .filter(|(pid, _)| keep.contains(pid))
                .map(|(pid, record)| (*pid, record.clone()))
                .collect(),
        }
    }
}

/// Cut an ancestor chain that ran into a parent loop. `repeated` is the pid
/// the walk saw twice; every pid from its first occurrence to the end of the
/// chain is on the loop. The chain is truncated right after the smallest
/// looped pid, which makes that pid the root.
fn truncate_at_loop_root(chain: &mut Vec<Pid>, repeated: Pid) {
    let Some(start) = chain.iter().position(|&p| p == repeated) else {
        return;
    };
    let Some(&root) = chain[start..].iter().min() else {
        return;
    };
    if let Some(end) = chain.iter().position(|&p| p == root) {
        chain.truncate(end + 1);
    }
}
