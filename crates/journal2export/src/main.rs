use std::path::PathBuf;

use clap::Parser;
use journal_export::{ExportError, JournalctlClient, RenderMode, DEFAULT_CHECKPOINT_PATH};
use tracing_subscriber::EnvFilter;

/// Follows the systemd journal and emits normalized, indexer-ready JSON
/// records on stdout, checkpointing the journal cursor between records.
#[derive(Debug, Parser)]
#[command(name = "journal2export", version)]
struct Cli {
    /// Where the last exported cursor is persisted across restarts.
    #[arg(long, default_value = DEFAULT_CHECKPOINT_PATH)]
    checkpoint_file: PathBuf,

    /// journalctl binary to spawn; falls back to $JOURNALCTL_BINARY, then
    /// to `journalctl` on PATH.
    #[arg(long)]
    journalctl: Option<PathBuf>,

    /// Overrides the local hostname used for host reconciliation.
    #[arg(long)]
    hostname: Option<String>,

    /// Emit single-line JSON documents instead of indented blocks.
    #[arg(long)]
    compact: bool,

    /// Extra arguments appended to the journalctl invocation, e.g. `-u nginx`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    journalctl_args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ExportError> {
    // Diagnostics go to stderr; stdout carries nothing but records.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = JournalctlClient::builder()
        .checkpoint_path(cli.checkpoint_file)
        .render_mode(if cli.compact {
            RenderMode::Compact
        } else {
            RenderMode::Pretty
        })
        .args(cli.journalctl_args);
    if let Some(binary) = cli.journalctl {
        builder = builder.binary(binary);
    }
    if let Some(hostname) = cli.hostname {
        builder = builder.hostname(hostname);
    }
    let client = builder.build();

    tokio::select! {
        result = client.export_stdout() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("termination signal received, stopping journal follow");
            Ok(())
        }
    }
}
