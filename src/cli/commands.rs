use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bf", about = concat!("bf v", env!("CARGO_PKG_VERSION"), " - drag-and-drop board reordering engine"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log at debug level (BF_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the item ordering of a board file
    Check(CheckArgs),
    /// Move an item and write the board file back
    Move(MoveArgs),
    /// Fold a file of push events (one JSON object per line) into a board file
    Apply(ApplyArgs),
    /// Follow a live board and print every change
    Watch(WatchArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    /// Board JSON file ({"columns": [...], "tasks": [...]})
    pub board: PathBuf,
}

#[derive(Args)]
pub struct MoveArgs {
    /// Board JSON file
    pub board: PathBuf,
    /// Item (task) id
    pub item: String,
    /// Target column id
    pub column: String,
    /// Target position within the column (clamped)
    pub position: usize,
    /// Show the result without writing the file
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Board JSON file
    pub board: PathBuf,
    /// Events file (JSON lines)
    pub events: PathBuf,
    /// Board the events must be scoped to (default: the first event's)
    #[arg(long = "board-id")]
    pub board_id: Option<String>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Config file (default: ./boardflow.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Board id, overriding [server] board_id
    #[arg(long)]
    pub board: Option<String>,
}
