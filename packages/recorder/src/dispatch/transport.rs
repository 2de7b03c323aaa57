// packages/recorder/src/dispatch/transport.rs
//! HTTP transport for ingestion POSTs
//!
//! Mirrors a `no-cors` browser fetch: the caller learns only whether the
//! request left the process, never the response status or body.

use crate::utils::errors::{Result, SdkError};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// Outbound POST used by the dispatcher
pub trait Transport: Send + Sync {
    /// POST a JSON body to `url`
    fn post(&self, url: String, body: Bytes) -> BoxFuture<'static, Result<()>>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SdkError::DispatchFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: String, body: Bytes) -> BoxFuture<'static, Result<()>> {
        let client = self.client.clone();

        async move {
            let response = client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| SdkError::DispatchFailed(format!("POST {} failed: {}", url, e)))?;

            // Status is not inspected
            debug!("Delivered payload to {} ({})", url, response.status());
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        assert!(HttpTransport::new(Duration::from_secs(10)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let transport = HttpTransport::new(Duration::from_millis(500)).unwrap();
        let result = transport
            .post("http://127.0.0.1:9/session_records".to_string(), Bytes::from_static(b"{}"))
            .await;
        assert!(matches!(result, Err(SdkError::DispatchFailed(_))));
    }
}
