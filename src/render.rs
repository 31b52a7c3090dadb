use std::collections::HashSet;

use colored::Colorize;

use crate::table::ProcessTable;
use crate::Pid;

/// Prints the flattened forest, one process per line, with `|` guides
/// matching the tree depth.
pub struct Renderer<'a> {
    table: &'a ProcessTable,
    verbose: bool,
    targets: HashSet<Pid>,
}

impl<'a> Renderer<'a> {
    pub fn new(table: &'a ProcessTable, verbose: bool, targets: &[Pid]) -> Renderer<'a> {
        Renderer {
            table,
            verbose,
            targets: targets.iter().copied().collect(),
        }
    }

    pub fn print(&self, flat: &[(usize, Pid)]) {
        for &(depth, pid) in flat {
            print!("{}", self.entry(depth, pid));
        }
    }

    /// One process entry, trailing newline included. A verbose entry spans
    /// several lines: executable path, then arguments, then environment.
    fn entry(&self, depth: usize, pid: Pid) -> String {
        let guide = "|\t".repeat(depth);

        // requested pids stand out from the rest of their lineage
        let pid_field = if self.targets.contains(&pid) {
            format!("{pid:>7}").yellow().bold().to_string()
        } else {
            format!("{pid:>7}").bold().to_string()
        };

        let Some(record) = self.table.get(pid) else {
            return format!("{guide}{pid_field} ?\n");
        };

        if !self.verbose {
            return format!("{guide}{pid_field} {}\n", record.command());
        }

        let title = if record.executable.is_empty() {
            record.command()
        } else {
            record.executable.clone()
        };
        let mut out = format!("{guide}{pid_field} {title}\n");

        // argv[0] repeats the executable, skip it
        let detail_guide = format!("{guide}|\t");
        for arg in record.args.iter().skip(1) {
            out.push_str(&format!("{detail_guide}{}\n", arg.blue()));
        }
        for env in &record.envs {
            out.push_str(&format!("{detail_guide}{}\n", env.magenta()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ProcessRecord;

    fn record(pid: Pid, ppid: Pid) -> ProcessRecord {
        ProcessRecord {
            pid,
            ppid,
            comm: String::from("bash"),
            executable: String::from("/usr/bin/bash"),
            args: vec![String::from("bash"), String::from("-l")],
            envs: vec![String::from("HOME=/root"), String::from("TERM=xterm")],
        }
    }

    #[test]
    fn plain_entry_shows_pid_and_command() {
        colored::control::set_override(false);
        let table = ProcessTable::from_records([record(42, 1)]);
        let renderer = Renderer::new(&table, false, &[]);

        assert_eq!(renderer.entry(0, 42), "     42 bash\n");
        assert_eq!(renderer.entry(2, 42), "|\t|\t     42 bash\n");
    }

    #[test]
    fn verbose_entry_lists_args_and_envs() {
        colored::control::set_override(false);
        let table = ProcessTable::from_records([record(42, 1)]);
        let renderer = Renderer::new(&table, true, &[]);

        let entry = renderer.entry(1, 42);
        let lines: Vec<&str> = entry.lines().collect();

        assert_eq!(
            lines,
            vec![
                "|\t     42 /usr/bin/bash",
                "|\t|\t-l",
                "|\t|\tHOME=/root",
                "|\t|\tTERM=xterm",
            ],
        );
    }

    #[test]
    fn kernel_thread_falls_back_to_comm() {
        colored::control::set_override(false);
        let mut kworker = record(9, 2);
        kworker.comm = String::from("kworker/0:1");
        kworker.executable = String::new();
        kworker.args = vec![];
        kworker.envs = vec![];
        let table = ProcessTable::from_records([kworker]);
        let renderer = Renderer::new(&table, true, &[]);

        assert_eq!(renderer.entry(0, 9), "      9 [kworker/0:1]\n");
    }
}
