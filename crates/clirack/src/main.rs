//! clirack: fetch and cache external resources by locator.

mod cli;
mod commands;
mod logging;

use crate::cli::parse;
use crate::commands::{Command, GlobalOptions};
use crate::logging::{TracingConfig, correlation_id};
use tracing::Instrument;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = parse();

    logging::init_tracing(TracingConfig {
        format: cli.tracing_format(),
        level: cli.level.into(),
        ..TracingConfig::default()
    })?;

    let options = GlobalOptions {
        target_dir: cli.target_dir,
        timeout: cli.timeout,
        json: cli.json,
    };
    let command: Command = cli.command.into();

    let span = tracing::info_span!(
        "command",
        command = ?command,
        correlation_id = %correlation_id(),
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::execute(command, &options, &mut out)
        .instrument(span)
        .await
}
