//! Shared utilities for the integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use filedrop::{
    models::progress::ProgressEvent,
    services::notifier::{Notifier, NotifyError},
};
use futures::{Stream, StreamExt, stream};
use std::{io, sync::Mutex};

pub const BOUNDARY: &str = "----filedrop-test-boundary";

pub fn content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Builds a `multipart/form-data` body part by part.
#[derive(Default)]
pub struct MultipartBody {
    raw: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.raw.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.raw.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        self.raw.extend_from_slice(data);
        self.raw.extend_from_slice(b"\r\n");
        self
    }

    /// Append the closing boundary.
    pub fn finish(mut self) -> Vec<u8> {
        self.raw
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.raw
    }

    /// Stop without a closing boundary, as if the client went away.
    pub fn truncated(self) -> Vec<u8> {
        self.raw
    }
}

/// Split `raw` into `chunk_size` pieces, the way a socket would deliver it.
pub fn chunked(
    raw: Vec<u8>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    let chunks: Vec<Result<Bytes, io::Error>> = raw
        .chunks(chunk_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks)
}

/// Like [`chunked`], but the connection errors after the given bytes.
pub fn chunked_then_reset(
    raw: Vec<u8>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    let mut chunks: Vec<Result<Bytes, io::Error>> = raw
        .chunks(chunk_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    chunks.push(Err(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "client disconnected",
    )));
    stream::iter(chunks)
}

/// Like [`chunked`], but the client then goes silent without closing.
pub fn chunked_then_stall(
    raw: Vec<u8>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    chunked(raw, chunk_size).chain(stream::pending())
}

/// Records every emit with the session it was targeted at.
#[derive(Default)]
pub struct RecordingNotifier {
    pub emitted: Mutex<Vec<(String, ProgressEvent)>>,
}

impl RecordingNotifier {
    pub fn emitted(&self) -> Vec<(String, ProgressEvent)> {
        self.emitted.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, session_id: &str, event: ProgressEvent) -> Result<(), NotifyError> {
        self.emitted
            .lock()
            .unwrap()
            .push((session_id.to_string(), event));
        Ok(())
    }
}
