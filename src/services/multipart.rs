//! Incremental multipart framing on top of `multer`.
//!
//! The parser never looks further into the body than the part currently being
//! consumed: a [`FilePart`]'s stream pulls bytes from the connection on demand,
//! and the next part is only framed once the previous one has been dropped.

use crate::models::upload::FilePart;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("request has no content type")]
    MissingContentType,
    #[error("content type carries no multipart boundary: {0}")]
    Boundary(#[source] multer::Error),
    #[error("malformed multipart body: {0}")]
    Malformed(#[from] multer::Error),
}

/// A part boundary recognised in the body.
#[derive(Debug)]
pub enum PartEvent {
    /// Plain form field; its value has already been skipped.
    Field { name: Option<String> },
    File(FilePart),
}

pub struct MultipartParser {
    inner: multer::Multipart<'static>,
    framed: usize,
}

impl MultipartParser {
    /// Prepare a parser for `body` using the boundary found in `content_type`.
    ///
    /// Nothing is read from `body` until [`next_part`](Self::next_part) is awaited.
    pub fn new<S, O, E>(content_type: Option<&str>, body: S) -> Result<Self, ParseError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let content_type = content_type.ok_or(ParseError::MissingContentType)?;
        let boundary = multer::parse_boundary(content_type).map_err(ParseError::Boundary)?;

        Ok(Self {
            inner: multer::Multipart::new(body, boundary),
            framed: 0,
        })
    }

    /// Frame the next part, or `None` once the closing boundary has been read.
    ///
    /// Any [`FilePart`] returned earlier must be dropped before calling this
    /// again; unread bytes of a dropped part are skipped.
    pub async fn next_part(&mut self) -> Result<Option<PartEvent>, ParseError> {
        let Some(field) = self.inner.next_field().await? else {
            return Ok(None);
        };
        self.framed += 1;

        let field_name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            // Browsers send `filename=""` for an empty file input.
            Some(original_filename) if !original_filename.is_empty() => {
                let mime_type = field.content_type().map(|m| m.to_string());
                debug!(
                    index = self.framed,
                    field = ?field_name,
                    filename = %original_filename,
                    "framed file part"
                );
                Ok(Some(PartEvent::File(FilePart {
                    field_name,
                    original_filename,
                    mime_type,
                    stream: field.map(|chunk| chunk.map_err(ParseError::from)).boxed(),
                })))
            }
            _ => {
                debug!(index = self.framed, field = ?field_name, "skipping form field");
                drop(field);
                Ok(Some(PartEvent::Field { name: field_name }))
            }
        }
    }

    /// Number of parts framed so far, files and plain fields alike.
    pub fn framed(&self) -> usize {
        self.framed
    }
}
