pub mod http_client;
pub mod snapshot_http;

use std::sync::Arc;

use crate::app::ports::HttpClientPort;
use crate::common::error::{Result, RevizeError};
use crate::config::{RegistryConfig, RegistryMode};

/// Build the registry transport selected by configuration.
pub fn registry_http(config: &RegistryConfig) -> Result<Arc<dyn HttpClientPort>> {
    match config.mode {
        RegistryMode::Live => Ok(Arc::new(http_client::ReqwestHttp::from_config(config)?)),
        RegistryMode::Snapshot => {
            let path = config.snapshot_path.clone().ok_or_else(|| {
                RevizeError::Config("registry mode 'snapshot' requires a snapshot_path".into())
            })?;
            Ok(Arc::new(snapshot_http::SnapshotHttp::new(path)))
        }
    }
}
