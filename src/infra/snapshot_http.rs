use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::common::constants::SNAPSHOT_SOURCE;
use crate::common::error::FetchError;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Serves a saved copy of the registry listing from disk.
///
/// Used for offline development and demos; the requested URL is ignored.
pub struct SnapshotHttp {
    path: PathBuf,
}

impl SnapshotHttp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HttpClientPort for SnapshotHttp {
    fn source_name(&self) -> &'static str {
        SNAPSHOT_SOURCE
    }

    async fn get(&self, url: &str) -> Result<HttpGetResult, FetchError> {
        debug!("serving {} from snapshot {}", url, self.path.display());
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(HttpGetResult::html(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::Status(404)),
            Err(e) => Err(FetchError::Body(e.to_string())),
        }
    }
}
