//! UploadHandler: drives one multipart request body to disk.
//!
//! ```text
//! Idle ─▶ Receiving ─┬─▶ Streaming ─▶ Sunk ─┐
//!                    │        ▲              │
//!                    │        └──────────────┘  (one loop per file part)
//!                    └─▶ Draining ─▶ Finished
//!
//! any state ─▶ Failed   (parse error, sink error, broken body)
//! ```
//!
//! File parts are sunk one at a time in wire order: the multipart framing
//! cannot move past a part whose bytes have not been consumed, so the sink
//! reading a part *is* the parser advancing through the body. The returned
//! future is the end-of-upload signal; it resolves once, after the body is
//! exhausted and every framed file part has a terminal [`SinkResult`].

use crate::{
    models::{
        progress::ProgressEvent,
        upload::{SinkResult, UploadReport, UploadSession},
    },
    services::{
        multipart::{MultipartParser, ParseError, PartEvent},
        notifier::Notifier,
        storage_sink::{Sink, SinkError},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, stream::BoxStream};
use std::{io, path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Sink(SinkError),
    #[error("{framed} file parts framed but {sunk} reached storage")]
    Incomplete { framed: usize, sunk: usize },
    #[error("upload session already ran to {0:?}")]
    AlreadyRun(UploadState),
}

impl From<SinkError> for UploadError {
    /// A body that broke while a part was streaming is a parse failure, not a
    /// storage one.
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Upstream { source, .. } => UploadError::Parse(source),
            other => UploadError::Sink(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Receiving,
    Streaming,
    Sunk,
    Draining,
    Finished,
    Failed,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Counts framed file parts against terminal sink results.
#[derive(Debug, Default)]
struct PartLedger {
    framed: usize,
    results: Vec<SinkResult>,
}

impl PartLedger {
    fn frame(&mut self) {
        self.framed += 1;
    }

    fn settle(&mut self, result: SinkResult) {
        self.results.push(result);
    }

    fn is_drained(&self) -> bool {
        self.framed == self.results.len()
    }
}

pub struct UploadHandler {
    session: UploadSession,
    sink: Arc<dyn Sink>,
    state: UploadState,
    ledger: PartLedger,
}

impl UploadHandler {
    pub fn new(session: UploadSession, sink: Arc<dyn Sink>) -> Self {
        Self {
            session,
            sink,
            state: UploadState::Idle,
            ledger: PartLedger::default(),
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Every terminal result recorded so far, failed parts included.
    pub fn results(&self) -> &[SinkResult] {
        &self.ledger.results
    }

    /// Consume `body` as `multipart/form-data` described by `content_type`.
    ///
    /// Resolves `Ok` exactly once per handler; a second call fails with
    /// [`UploadError::AlreadyRun`] without touching the body.
    ///
    /// Dropping the future mid-part (client gone, deadline hit) removes the
    /// partial file but leaves [`state`](Self::state) where it was, usually
    /// `Streaming`. Callers that keep the handler around should treat a
    /// non-terminal state after the future is gone as failed.
    pub async fn run<S, O, E>(
        &mut self,
        content_type: Option<&str>,
        body: S,
    ) -> Result<UploadReport, UploadError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        if self.state != UploadState::Idle {
            return Err(UploadError::AlreadyRun(self.state));
        }

        match self.drive(content_type, body).await {
            Ok(report) => {
                self.transition(UploadState::Finished);
                info!(
                    session_id = %self.session.session_id,
                    files = report.files.len(),
                    bytes = report.total_bytes(),
                    "upload finished"
                );
                Ok(report)
            }
            Err(err) => {
                self.transition(UploadState::Failed);
                warn!(
                    session_id = %self.session.session_id,
                    framed = self.ledger.framed,
                    sunk = self.ledger.results.len(),
                    "upload failed: {}",
                    err
                );
                Err(err)
            }
        }
    }

    async fn drive<S, O, E>(
        &mut self,
        content_type: Option<&str>,
        body: S,
    ) -> Result<UploadReport, UploadError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut parser = MultipartParser::new(content_type, body)?;
        self.transition(UploadState::Receiving);

        while let Some(event) = parser.next_part().await? {
            let part = match event {
                PartEvent::File(part) => part,
                PartEvent::Field { .. } => continue,
            };

            self.ledger.frame();
            self.transition(UploadState::Streaming);
            let original = part.original_filename.clone();

            match self.sink.write(part, &self.session.destination).await {
                Ok(result) => {
                    self.transition(UploadState::Sunk);
                    info!(
                        session_id = %self.session.session_id,
                        filename = %result.filename,
                        bytes = result.bytes_written,
                        checksum = %result.checksum,
                        "file part stored"
                    );
                    self.notify(&result);
                    self.ledger.settle(result);
                    self.transition(UploadState::Receiving);
                }
                Err(err) => {
                    self.ledger
                        .settle(SinkResult::failed(original, err.bytes_written()));
                    return Err(err.into());
                }
            }
        }

        self.transition(UploadState::Draining);
        // Holds trivially while parts are sunk one at a time; a concurrent
        // Sink would have to settle every framed part before this point.
        if !self.ledger.is_drained() {
            return Err(UploadError::Incomplete {
                framed: self.ledger.framed,
                sunk: self.ledger.results.len(),
            });
        }

        Ok(UploadReport {
            session_id: self.session.session_id.clone(),
            files: self.ledger.results.clone(),
        })
    }

    fn notify(&self, result: &SinkResult) {
        let event = ProgressEvent::file_processed(result);
        if let Err(err) = self.session.notifier.notify(&self.session.session_id, event) {
            debug!(session_id = %self.session.session_id, "progress not delivered: {}", err);
        }
    }

    fn transition(&mut self, next: UploadState) {
        trace!(
            session_id = %self.session.session_id,
            from = ?self.state,
            to = ?next,
            "upload state"
        );
        self.state = next;
    }
}

/// Request body as handed over by the HTTP layer.
pub type ByteStream = BoxStream<'static, Result<Bytes, io::Error>>;

/// Entry point the POST route calls; one call per request.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        session_id: String,
        content_type: Option<String>,
        body: ByteStream,
    ) -> Result<UploadReport, UploadError>;
}

/// Builds a fresh [`UploadHandler`] per request around shared collaborators.
#[derive(Clone)]
pub struct PipelineUploader {
    destination: PathBuf,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn Sink>,
}

impl PipelineUploader {
    pub fn new(
        destination: impl Into<PathBuf>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            destination: destination.into(),
            notifier,
            sink,
        }
    }
}

#[async_trait]
impl Uploader for PipelineUploader {
    async fn upload(
        &self,
        session_id: String,
        content_type: Option<String>,
        body: ByteStream,
    ) -> Result<UploadReport, UploadError> {
        let session = UploadSession::new(session_id, self.destination.clone(), self.notifier.clone());
        let mut handler = UploadHandler::new(session, self.sink.clone());
        debug!(session_id = %handler.session().session_id, "upload session opened");
        handler.run(content_type.as_deref(), body).await
    }
}
