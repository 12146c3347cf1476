//! Listing entry for a stored file.

use serde::{Deserialize, Serialize};

/// One row of the `GET /` listing.
///
/// `size` is already formatted for humans (`"78.9 kB"`) and `last_modified`
/// is an RFC 3339 timestamp with millisecond precision.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub file: String,
    pub size: String,
    pub last_modified: String,
    pub owner: String,
}
