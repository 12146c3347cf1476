//! Streams one file part onto local disk.
//!
//! Bytes are pulled from the part only after the previous chunk has been
//! handed to the file, so the request connection is read no faster than the
//! disk accepts writes.

use crate::{
    models::upload::{FilePart, SinkResult},
    services::multipart::ParseError,
};
use async_trait::async_trait;
use futures::StreamExt;
use md5::Context;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("filename `{0}` is not usable on disk")]
    InvalidFilename(String),
    #[error("cannot create `{}`: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("write to `{}` failed after {bytes_written} bytes: {source}", path.display())]
    Write {
        path: PathBuf,
        bytes_written: u64,
        source: io::Error,
    },
    #[error("upstream body failed after {bytes_written} bytes: {source}")]
    Upstream {
        bytes_written: u64,
        source: ParseError,
    },
}

impl SinkError {
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::InvalidFilename(_) | Self::Open { .. } => 0,
            Self::Write { bytes_written, .. } | Self::Upstream { bytes_written, .. } => {
                *bytes_written
            }
        }
    }
}

/// Capability to persist one [`FilePart`].
#[async_trait]
pub trait Sink: Send + Sync {
    /// Consume `part` completely and persist it under `destination`.
    async fn write(&self, part: FilePart, destination: &Path) -> Result<SinkResult, SinkError>;
}

/// Writes parts as plain files named after their (sanitized) original filename.
///
/// An existing file with the same name is truncated and overwritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

#[async_trait]
impl Sink for FileSink {
    async fn write(&self, part: FilePart, destination: &Path) -> Result<SinkResult, SinkError> {
        let filename = disk_filename(&part.original_filename)?;
        let path = destination.join(&filename);

        let mut file = File::create(&path).await.map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        let mut guard = PartialFile::new(path.clone());

        let mut bytes_written: u64 = 0;
        let mut digest = Context::new();
        let mut stream = part.stream;
        while let Some(chunk_res) = stream.next().await {
            let chunk = chunk_res.map_err(|source| SinkError::Upstream {
                bytes_written,
                source,
            })?;
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk)
                .await
                .map_err(|source| SinkError::Write {
                    path: path.clone(),
                    bytes_written,
                    source,
                })?;
            digest.consume(&chunk);
            bytes_written += chunk.len() as u64;
        }

        let finish = async {
            file.flush().await?;
            file.sync_all().await
        };
        finish.await.map_err(|source| SinkError::Write {
            path: path.clone(),
            bytes_written,
            source,
        })?;

        guard.keep();
        debug!("wrote {} bytes to {}", bytes_written, path.display());

        Ok(SinkResult::completed(
            filename,
            bytes_written,
            format!("{:x}", digest.compute()),
        ))
    }
}

/// Reduce a client-supplied name to a single path component.
fn disk_filename(original: &str) -> Result<String, SinkError> {
    let sanitized = sanitize_filename::sanitize(original);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(SinkError::InvalidFilename(original.to_string()));
    }
    if sanitized != original {
        warn!("sanitized upload filename {:?} to {:?}", original, sanitized);
    }
    Ok(sanitized)
}

/// Removes a half-written file unless the write reached the end.
///
/// Runs on error returns and when the enclosing future is dropped mid-stream
/// (client disconnect, request timeout).
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(_) => debug!("removed partial file {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove partial file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::upload::SinkStatus;
    use bytes::Bytes;
    use futures::stream;
    use std::time::Duration;

    fn part(name: &str, chunks: Vec<Result<Bytes, ParseError>>) -> FilePart {
        FilePart {
            field_name: Some("file".into()),
            original_filename: name.into(),
            mime_type: None,
            stream: stream::iter(chunks).boxed(),
        }
    }

    #[tokio::test]
    async fn writes_every_chunk_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"world")),
        ];

        let result = FileSink
            .write(part("greeting.txt", chunks), dir.path())
            .await
            .unwrap();

        assert_eq!(result.status, SinkStatus::Completed);
        assert_eq!(result.filename, "greeting.txt");
        assert_eq!(result.bytes_written, 11);
        assert_eq!(result.checksum, format!("{:x}", md5::compute(b"hello world")));
        let on_disk = std::fs::read(dir.path().join("greeting.txt")).unwrap();
        assert_eq!(on_disk, b"hello world");
    }

    #[tokio::test]
    async fn empty_part_still_creates_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = FileSink
            .write(part("empty.bin", vec![]), dir.path())
            .await
            .unwrap();

        assert_eq!(result.bytes_written, 0);
        assert_eq!(result.status, SinkStatus::Completed);
        assert!(dir.path().join("empty.bin").exists());
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("same.txt"), b"a much longer previous body").unwrap();

        FileSink
            .write(
                part("same.txt", vec![Ok(Bytes::from_static(b"new"))]),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("same.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn upstream_failure_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(ParseError::MissingContentType),
        ];

        let err = FileSink
            .write(part("broken.txt", chunks), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::Upstream { bytes_written: 7, .. }));
        assert!(!dir.path().join("broken.txt").exists());
    }

    #[tokio::test]
    async fn dropped_write_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let stalled = FilePart {
            field_name: Some("file".into()),
            original_filename: "stalled.txt".into(),
            mime_type: None,
            stream: stream::iter(vec![Ok(Bytes::from_static(b"first chunk"))])
                .chain(stream::pending())
                .boxed(),
        };

        let mut write = FileSink.write(stalled, dir.path());
        let waited = tokio::time::timeout(Duration::from_millis(200), write.as_mut()).await;
        assert!(waited.is_err());
        assert!(dir.path().join("stalled.txt").exists());

        drop(write);
        assert!(!dir.path().join("stalled.txt").exists());
    }

    #[tokio::test]
    async fn missing_destination_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = FileSink
            .write(part("a.txt", vec![]), &missing)
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::Open { .. }));
    }

    #[tokio::test]
    async fn path_components_are_stripped_from_filename() {
        let dir = tempfile::tempdir().unwrap();

        let result = FileSink
            .write(
                part("../../etc/passwd", vec![Ok(Bytes::from_static(b"x"))]),
                dir.path(),
            )
            .await
            .unwrap();

        assert!(!result.filename.contains('/'));
        assert!(dir.path().join(&result.filename).exists());
    }

    #[test]
    fn unusable_filenames_are_rejected() {
        assert!(matches!(
            disk_filename(".."),
            Err(SinkError::InvalidFilename(_))
        ));
        assert!(matches!(
            disk_filename("/"),
            Err(SinkError::InvalidFilename(_))
        ));
    }
}
