use anyhow::Context;
use clap::Parser;
use log::info;

use ptree::render::Renderer;
use ptree::table::ProcessTable;
use ptree::tree::{ChildOrder, ProcessTree};
use ptree::{lineage_forest, Pid};

/// Print a tree listing of the processes running on the system
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Print the tree for specific processes, comma separated list: each
    /// pid's ancestors and descendants
    #[arg(short, long, value_delimiter = ',')]
    pids: Vec<Pid>,

    /// Include full command path, arguments, and environment variables for
    /// each process in the list
    #[arg(short, long)]
    verbose: bool,

    /// Sibling ordering in the printed tree
    #[arg(long, value_enum, default_value = "depth")]
    sort: ChildOrder,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let table = ProcessTable::snapshot().context("could not build the process table")?;
    info!("captured {} processes", table.len());

    let tree = ProcessTree::from_table(&table);

    // no valid target pid means the full forest is shown
    let (table, tree) = match lineage_forest(&table, &tree, &cli.pids) {
        Some(restricted) => restricted,
        None => (table, tree),
    };

    let flat = tree.flatten(&mut cli.sort.comparator(&table));
    Renderer::new(&table, cli.verbose, &cli.pids).print(&flat);

    Ok(())
}
