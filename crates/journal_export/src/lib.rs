#![forbid(unsafe_code)]
//! Async pipeline around `journalctl --output=json --follow`.
//!
//! The journal process is treated purely as an external byte-stream
//! producer: this crate spawns it, decodes its newline-delimited JSON
//! output one record at a time, normalizes each record into the field
//! conventions a log-indexing backend expects, and persists the journal
//! cursor after every emitted record so a restart resumes where the last
//! run left off (at-least-once; a crash between emit and checkpoint costs
//! re-delivery, never loss).

mod checkpoint;
mod client;
mod error;
mod normalize;
mod record;
mod stream;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use client::{JournalctlClient, JournalctlClientBuilder, DEFAULT_CHECKPOINT_PATH};
pub use error::ExportError;
pub use normalize::{Normalizer, RESERVED_KEYS};
pub use record::{decode_line, render, Record, RenderMode};
