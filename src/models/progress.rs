//! Events pushed to socket subscribers.

use crate::models::upload::SinkResult;
use serde::Serialize;

/// Wire format: `{"event": "<kebab-name>", "data": {...}}`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ProgressEvent {
    /// Sent once when a socket subscribes, echoing the id to put in `?socketId=`.
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: String },

    /// A file part has been fully written to disk.
    #[serde(rename_all = "camelCase")]
    FileProcessed {
        filename: String,
        bytes_written: u64,
        checksum: String,
    },
}

impl ProgressEvent {
    pub fn file_processed(result: &SinkResult) -> Self {
        Self::FileProcessed {
            filename: result.filename.clone(),
            bytes_written: result.bytes_written,
            checksum: result.checksum.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::FileProcessed { .. } => "file-processed",
        }
    }
}
