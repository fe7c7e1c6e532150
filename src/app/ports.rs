use async_trait::async_trait;

use crate::common::error::FetchError;

// Registry-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Label recorded in lookup snapshots (`ticr-live`, `ticr-snapshot`, ...).
    fn source_name(&self) -> &'static str;

    async fn get(&self, url: &str) -> Result<HttpGetResult, FetchError>;
}

/// Body of a successful GET; non-2xx answers are reported as `FetchError::Status`.
#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub bytes: Vec<u8>,
}

impl HttpGetResult {
    pub fn html(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
