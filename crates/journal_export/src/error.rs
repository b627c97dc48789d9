use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to spawn journal producer (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("failed waiting for journal producer: {0}")]
    Wait(std::io::Error),
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("failed reading producer stream: {0}")]
    StreamRead(std::io::Error),
    #[error("failed writing record to sink: {0}")]
    SinkWrite(std::io::Error),
    #[error("failed writing checkpoint {path:?}: {source}")]
    CheckpointWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}
