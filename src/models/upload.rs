//! Represents one POST request's upload lifecycle and the parts framed from it.

use crate::services::{multipart::ParseError, notifier::Notifier};
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use std::{fmt, path::PathBuf, sync::Arc};

/// Identifies one upload request and where its progress is reported.
#[derive(Clone)]
pub struct UploadSession {
    /// Opaque id supplied by the client via `?socketId=`; scopes notifications.
    pub session_id: String,

    /// Flat directory that receives every file of this session.
    pub destination: PathBuf,

    /// Process-wide publish/subscribe handle.
    pub notifier: Arc<dyn Notifier>,
}

impl UploadSession {
    pub fn new(
        session_id: impl Into<String>,
        destination: impl Into<PathBuf>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            destination: destination.into(),
            notifier,
        }
    }
}

impl fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("session_id", &self.session_id)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// One file-bearing part of a multipart body.
///
/// `stream` is single-pass: bytes are pulled from the request connection as
/// the consumer asks for them and cannot be replayed.
pub struct FilePart {
    pub field_name: Option<String>,
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub stream: BoxStream<'static, Result<Bytes, ParseError>>,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("field_name", &self.field_name)
            .field("original_filename", &self.original_filename)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkStatus {
    Completed,
    Failed,
}

/// Terminal outcome of writing one [`FilePart`] to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkResult {
    /// Name of the file as written inside the destination directory.
    pub filename: String,
    pub bytes_written: u64,
    /// MD5 of the written bytes, lowercase hex. Empty for failed writes.
    pub checksum: String,
    pub status: SinkStatus,
}

impl SinkResult {
    pub fn completed(filename: impl Into<String>, bytes_written: u64, checksum: String) -> Self {
        Self {
            filename: filename.into(),
            bytes_written,
            checksum,
            status: SinkStatus::Completed,
        }
    }

    pub fn failed(filename: impl Into<String>, bytes_written: u64) -> Self {
        Self {
            filename: filename.into(),
            bytes_written,
            checksum: String::new(),
            status: SinkStatus::Failed,
        }
    }
}

/// What a finished session hands back to the route layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub session_id: String,
    pub files: Vec<SinkResult>,
}

impl UploadReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes_written).sum()
    }
}
