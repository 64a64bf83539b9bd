use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::store::DEFAULT_CHUNK_SIZE;

#[derive(Parser, Debug)]
#[command(
    name = "plenargraph",
    version,
    about = "Load Bundestag plenary protocols into a property graph"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Status(StatusArgs),
    Stats(StatsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Directory holding the plenary protocol XML files.
    pub input_dir: PathBuf,

    #[arg(long, default_value = ".cache/plenargraph")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    /// Upsert operations per transaction.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    #[arg(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Parse and plan, but leave the store untouched.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Write every operation as a Cypher statement (JSON lines).
    #[arg(long)]
    pub cypher_out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/plenargraph")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(long, default_value = ".cache/plenargraph")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn default_db_path(cache_root: &Path) -> PathBuf {
    cache_root.join("plenargraph.sqlite")
}
