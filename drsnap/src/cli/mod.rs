// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Host list read when `--hosts` is not given.
pub const DEFAULT_HOST_FILE: &str = "snapshot_vmlist.txt";

#[derive(Debug, Clone, Parser)]
#[command(name = "drsnap")]
#[command(about = "Create expiring disaster-recovery snapshots of VM OS disks in bulk")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a drsnap configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Snapshot every VM of a host list
    Create {
        /// File with one hostname per line
        #[arg(long, default_value = DEFAULT_HOST_FILE)]
        hosts: PathBuf,

        /// Change request number, embedded in snapshot names
        #[arg(long)]
        chg: String,

        /// Days until the snapshots expire (defaults to the configured TTL)
        #[arg(long)]
        ttl: Option<u32>,

        /// Skip VMs whose inventory line contains any of these keywords
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which VMs a run would snapshot, grouped by subscription
    Plan {
        /// File with one hostname per line
        #[arg(long, default_value = DEFAULT_HOST_FILE)]
        hosts: PathBuf,

        /// Skip VMs whose inventory line contains any of these keywords
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the identity snapshots will be attributed to
    Whoami,
}
