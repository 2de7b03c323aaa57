// packages/recorder/src/dispatch/dispatcher.rs
//! Fire-and-forget payload dispatcher

use crate::dispatch::transport::Transport;
use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Ingestion path for recorder event batches
pub const SESSION_RECORDS_PATH: &str = "session_records";

/// Ingestion path for captured request/response pairs
pub const CLIENT_PAYLOADS_PATH: &str = "insert_client_recorded_payloads";

/// Serializes payloads and hands them to the transport without waiting
#[derive(Clone)]
pub struct PayloadDispatcher {
    endpoint: Arc<str>,
    transport: Arc<dyn Transport>,
}

impl PayloadDispatcher {
    pub fn new(endpoint: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: Arc::from(endpoint.trim_end_matches('/')),
            transport,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Send `payload` to `path` under the endpoint
    ///
    /// Returns immediately. Serialization and transport failures are logged
    /// and the payload is dropped.
    pub fn send<T: Serialize>(&self, path: &str, payload: &T) {
        let url = self.url_for(path);

        let body = match serde_json::to_vec(payload) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                warn!("Dropping payload for {}: serialization error: {}", url, e);
                counter!("recorder_payloads_dropped_total", "reason" => "serialization").increment(1);
                return;
            }
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!("Dropping payload for {}: no async runtime available", url);
            counter!("recorder_payloads_dropped_total", "reason" => "no_runtime").increment(1);
            return;
        };

        debug!("Dispatching {} bytes to {}", body.len(), url);
        let delivery = self.transport.post(url.clone(), body);
        counter!("recorder_payloads_dispatched_total", "path" => path.to_string()).increment(1);

        runtime.spawn(async move {
            if let Err(e) = delivery.await {
                warn!("Error sending payload to {}: {}", url, e);
                counter!("recorder_payloads_dropped_total", "reason" => "transport").increment(1);
            }
        });
    }
}
