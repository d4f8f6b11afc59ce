use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::ArtifactFormat;

#[derive(Debug, Clone, Parser)]
#[command(name = "implementor-discovery")]
#[command(about = "Generate per-interface lists of PHP classes implementing configured interfaces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root holding `app/`, `vendor/` and `discovery.json`
    #[arg(long, value_name = "DIR", global = true)]
    pub base: Option<PathBuf>,

    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Scan sources and write one artifact per interface
    Run(RunArgs),
    /// Print the implementors recorded for one interface
    Show { interface: String },
    /// Print the detected host resource profile
    Profile {
        #[arg(long, value_name = "SIZE")]
        memory_limit: Option<String>,
    },
    /// Remove the artifact directory
    Clear,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    #[arg(short = 'i', long = "interface", value_name = "NAME")]
    pub interfaces: Vec<String>,

    #[arg(long = "vendor", value_name = "PACKAGE")]
    pub vendors: Vec<String>,

    #[arg(long)]
    pub all_vendors: bool,

    #[arg(long, value_name = "SIZE")]
    pub memory_limit: Option<String>,

    #[arg(long, value_enum)]
    pub artifact_format: Option<ArtifactFormat>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Copy, Clone, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}
