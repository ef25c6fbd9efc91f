use crate::commands::Command;
use crate::logging::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clirack")]
#[command(about = "Fetch and cache external resources by locator (github://, https://, local://)")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Directory resources are materialized under [default: tmp/external, env: CLIRACK_TARGET_DIR]"
    )]
    pub target_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        help = "Deadline for each network call, 0 disables it [default: 60, env: CLIRACK_TIMEOUT_SECS]"
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Print results and logs as JSON")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Load a resource and print where it was materialized")]
    Load {
        #[arg(help = "Resource locator, e.g. github://owner/repo@ref")]
        locator: String,
        #[arg(
            long,
            value_name = "NAME",
            help = "Require a folder with this name in the resource root and select it"
        )]
        require_dir: Option<String>,
        #[arg(long, help = "Fetch again even if the cached copy is current")]
        force: bool,
    },
    #[command(about = "List registered locator schemes")]
    Schemes,
    #[command(about = "Inspect the cache index of the target directory")]
    Cache {
        #[command(subcommand)]
        subcommand: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    #[command(about = "List cached resources")]
    List,
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Load {
                locator,
                require_dir,
                force,
            } => Self::Load {
                locator,
                require_dir,
                force,
            },
            Commands::Schemes => Self::Schemes,
            Commands::Cache { subcommand } => match subcommand {
                CacheCommands::List => Self::CacheList,
            },
        }
    }
}

impl Cli {
    /// Log format after `--json` is taken into account.
    pub fn tracing_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.log_format
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
