use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::ExportError;
use crate::normalize::Normalizer;
use crate::record::{decode_line, render, RenderMode};

/// Journald's position token on raw records; its value is what checkpoints
/// persist.
const CURSOR_KEY: &str = "__CURSOR";

/// The per-line pipeline: read, decode, normalize, emit, checkpoint.
///
/// Strictly sequential: each record is fully processed and flushed before
/// the next line is read, so checkpoint saves apply in stream order. Lines
/// are read as bytes so invalid UTF-8 becomes a per-record outcome instead
/// of a stream error.
pub(crate) async fn pump_records<R, W>(
    reader: R,
    mut sink: W,
    normalizer: &Normalizer,
    store: &CheckpointStore,
    mode: RenderMode,
) -> Result<(), ExportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(ExportError::StreamRead)?;
        if read == 0 {
            break;
        }
        if buf.ends_with(b"\n") {
            buf.pop();
        }
        if buf.ends_with(b"\r") {
            buf.pop();
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let record = decode_line(&buf);
        // The cursor comes off the raw decode: normalization must never be
        // able to advance or invent a stream position.
        let cursor = record
            .get(CURSOR_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);

        let record = normalizer.normalize(record);
        let rendered = render(&record, mode);
        sink.write_all(rendered.as_bytes())
            .await
            .map_err(ExportError::SinkWrite)?;
        sink.write_all(b"\n").await.map_err(ExportError::SinkWrite)?;
        sink.flush().await.map_err(ExportError::SinkWrite)?;

        // Only checkpoint a position that has already been emitted; a
        // failed save costs re-delivery on restart, nothing more.
        if let Some(cursor) = cursor {
            if let Err(err) = store.save(&cursor).await {
                warn!(error = %err, "checkpoint not updated, restart may re-deliver");
            }
        }
    }
    debug!("producer stream ended");
    Ok(())
}
