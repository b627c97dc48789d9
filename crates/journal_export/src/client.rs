use std::{ffi::OsString, path::PathBuf, process::Stdio};

use tokio::io::AsyncWrite;
use tokio::process::Command;
use tracing::debug;

use crate::checkpoint::CheckpointStore;
use crate::error::ExportError;
use crate::normalize::Normalizer;
use crate::record::RenderMode;
use crate::stream::pump_records;

/// Default checkpoint location, shared with init-script deployments.
pub const DEFAULT_CHECKPOINT_PATH: &str = "/var/run/journal2export.cursor";

#[derive(Debug, Clone)]
pub struct JournalctlClientBuilder {
    binary: Option<PathBuf>,
    checkpoint_path: PathBuf,
    hostname: Option<String>,
    render_mode: RenderMode,
    extra_args: Vec<OsString>,
}

impl Default for JournalctlClientBuilder {
    fn default() -> Self {
        Self {
            binary: None,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            hostname: None,
            render_mode: RenderMode::default(),
            extra_args: Vec::new(),
        }
    }
}

impl JournalctlClientBuilder {
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    /// Overrides the hostname used for host reconciliation; defaults to the
    /// machine name reported by the OS.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// Appends pass-through journalctl arguments (filters such as `-u`).
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> JournalctlClient {
        let normalizer = match self.hostname {
            Some(hostname) => Normalizer::new(hostname),
            None => Normalizer::local(),
        };
        JournalctlClient {
            binary: self.binary,
            store: CheckpointStore::new(self.checkpoint_path),
            normalizer,
            render_mode: self.render_mode,
            extra_args: self.extra_args,
        }
    }
}

/// Spawns the journal producer and drives its output through the
/// decode/normalize/checkpoint pipeline.
#[derive(Debug)]
pub struct JournalctlClient {
    binary: Option<PathBuf>,
    store: CheckpointStore,
    normalizer: Normalizer,
    render_mode: RenderMode,
    extra_args: Vec<OsString>,
}

impl JournalctlClient {
    pub fn builder() -> JournalctlClientBuilder {
        JournalctlClientBuilder::default()
    }

    /// Follows the journal and writes normalized records to stdout until
    /// the producer stream ends.
    pub async fn export_stdout(&self) -> Result<(), ExportError> {
        self.export(tokio::io::stdout()).await
    }

    /// Same as [`JournalctlClient::export_stdout`] with an explicit sink.
    ///
    /// A prior checkpoint turns into `--after-cursor`; anything short of a
    /// successful spawn is fatal, since without a producer there is no
    /// stream to normalize. The producer's exit status is logged but not
    /// inspected: any stream end is a clean end.
    pub async fn export<W>(&self, sink: W) -> Result<(), ExportError>
    where
        W: AsyncWrite + Unpin,
    {
        let resume = self.store.load().await;
        let binary = self.resolve_binary();
        let args = journalctl_args(
            resume.as_ref().map(|checkpoint| checkpoint.cursor.as_str()),
            &self.extra_args,
        );

        let mut command = Command::new(&binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExportError::Spawn {
            binary: binary.clone(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or(ExportError::MissingStdout)?;

        debug!(binary = ?binary, resumed = resume.is_some(), "following journal stream");
        pump_records(
            stdout,
            sink,
            &self.normalizer,
            &self.store,
            self.render_mode,
        )
        .await?;

        let status = child.wait().await.map_err(ExportError::Wait)?;
        debug!(?status, "journal producer exited");
        Ok(())
    }

    fn resolve_binary(&self) -> PathBuf {
        if let Some(binary) = self.binary.as_ref() {
            return binary.clone();
        }
        if let Ok(value) = std::env::var("JOURNALCTL_BINARY") {
            if !value.trim().is_empty() {
                return PathBuf::from(value);
            }
        }
        PathBuf::from("journalctl")
    }
}

fn journalctl_args(resume: Option<&str>, extra: &[OsString]) -> Vec<OsString> {
    let mut args = vec![OsString::from("--output=json"), OsString::from("--follow")];
    if let Some(cursor) = resume {
        args.push(OsString::from(format!("--after-cursor={cursor}")));
    }
    args.extend(extra.iter().cloned());
    args
}
