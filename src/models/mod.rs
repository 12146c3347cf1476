//! Core data models for the file-sharing service.
//!
//! These types describe one upload's lifecycle (session, framed file parts,
//! per-part sink outcomes) and the JSON shapes sent to HTTP and socket clients.

pub mod file_status;
pub mod progress;
pub mod upload;
