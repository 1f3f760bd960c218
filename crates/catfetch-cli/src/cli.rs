use std::path::PathBuf;

use catfetch_types::VersionId;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "catfetch",
    about = "Versioned, content-addressable store for fetched cat images",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store file
    #[arg(long, global = true, default_value = "catfetch.redb")]
    pub db: PathBuf,

    /// TOML file with store settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store an image described by an upstream metadata JSON record
    Put(PutArgs),
    /// Store an image with metadata given on the command line
    Add(AddArgs),
    /// Show the metadata of a stored version
    Show(VersionArgs),
    /// Write the image bytes of a stored version
    Cat(CatArgs),
    /// List entities, or the versions of one entity
    List(ListArgs),
    /// Print the version id a URL maps to
    Hash(HashArgs),
    /// Show store statistics
    Stats,
}

#[derive(Args)]
pub struct PutArgs {
    /// JSON file with `id`, `tags`, `created_at`, `url`, `mimetype`
    #[arg(long)]
    pub meta: PathBuf,
    pub image: PathBuf,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub mime: String,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// RFC 3339 timestamp; defaults to now
    #[arg(long)]
    pub created_at: Option<String>,
    pub image: PathBuf,
}

#[derive(Args)]
pub struct VersionArgs {
    pub entity: String,
    pub version: VersionId,
}

#[derive(Args)]
pub struct CatArgs {
    #[command(flatten)]
    pub target: VersionArgs,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    pub entity: Option<String>,
}

#[derive(Args)]
pub struct HashArgs {
    pub url: String,
}
