//! Shared state carried by the router into every handler.

use crate::services::{
    file_status::{FsStatusLister, StatusLister},
    notifier::SocketHub,
    storage_sink::FileSink,
    upload_handler::{PipelineUploader, Uploader},
};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Upper bound on one `POST` until the router sets its configured value.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct AppState {
    /// Flat directory holding every uploaded file.
    pub storage_dir: PathBuf,
    pub lister: Arc<dyn StatusLister>,
    pub uploader: Arc<dyn Uploader>,
    pub hub: Arc<SocketHub>,
    /// Deadline for a whole upload; past it the request fails with a 500.
    pub upload_timeout: Duration,
}

impl AppState {
    /// Production wiring: filesystem lister, file sink and the socket hub as notifier.
    pub fn new(storage_dir: impl Into<PathBuf>, hub: Arc<SocketHub>) -> Self {
        let storage_dir = storage_dir.into();
        let uploader = PipelineUploader::new(storage_dir.clone(), hub.clone(), Arc::new(FileSink));
        Self {
            storage_dir,
            lister: Arc::new(FsStatusLister::new()),
            uploader: Arc::new(uploader),
            hub,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_lister(mut self, lister: Arc<dyn StatusLister>) -> Self {
        self.lister = lister;
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn with_upload_timeout(mut self, upload_timeout: Duration) -> Self {
        self.upload_timeout = upload_timeout;
        self
    }
}
