use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::common::constants::{
    LIVE_SOURCE, REGISTRY_ACCEPT, REGISTRY_ACCEPT_LANGUAGE, REGISTRY_USER_AGENT,
};
use crate::common::error::{FetchError, Result};
use crate::config::RegistryConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;
use tracing::debug;

/// Live registry access over HTTPS.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(REGISTRY_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(REGISTRY_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(REGISTRY_ACCEPT_LANGUAGE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else if err.is_connect() || err.is_request() {
        FetchError::Connect(err.to_string())
    } else {
        FetchError::Body(err.to_string())
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    fn source_name(&self) -> &'static str {
        LIVE_SOURCE
    }

    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, FetchError> {
        let resp = self.client.get(url).send().await.map_err(classify)?;
        let status = resp.status();
        debug!("registry GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await.map_err(classify)?.to_vec();
        Ok(HttpGetResult { bytes })
    }
}
