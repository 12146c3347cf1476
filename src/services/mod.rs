//! Upload pipeline and its collaborators.
//!
//! `upload_handler` is the orchestrator; `multipart`, `storage_sink` and
//! `notifier` are the three capabilities it wires together. `file_status`
//! serves the listing route.

pub mod file_status;
pub mod multipart;
pub mod notifier;
pub mod storage_sink;
pub mod upload_handler;
