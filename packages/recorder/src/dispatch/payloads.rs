// packages/recorder/src/dispatch/payloads.rs
//! Ingestion wire formats
//!
//! Field names are fixed by the ingestion service, including the historical
//! `aware_` prefixes.

use crate::interception::http_payload::HttpPayload;
use crate::recording::event::RecordedEvent;
use crate::utils::errors::Result;
use serde::Serialize;

/// One recorded event, JSON-encoded as a string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventList {
    pub events: Vec<EventEnvelope>,
}

impl EventList {
    pub fn encode(events: &[RecordedEvent]) -> Result<Self> {
        let events = events
            .iter()
            .map(|event| {
                Ok(EventEnvelope {
                    payload: serde_json::to_string(event)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Body of `POST {endpoint}/session_records`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecordBatch {
    pub tracking_id: String,
    pub parent_tracking_id: String,
    pub aware_project_id: String,
    pub aware_session_tracking_api_key: String,
    pub session_record_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<String>,
    pub environment: String,
    pub event_list: EventList,
}

/// One side of a captured exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedSide<'a> {
    pub span_id: &'a str,
    pub http_payload: &'a HttpPayload,
}

impl CapturedSide<'_> {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Body of `POST {endpoint}/insert_client_recorded_payloads`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRecordedPayloads {
    pub aware_project_id: String,
    pub aware_session_tracking_api_key: String,

    /// `{spanId, httpPayload}` of the request, JSON-encoded
    pub request_payload: String,

    /// `{spanId, httpPayload}` of the response, JSON-encoded
    pub response_payload: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<String>,

    /// Request URL without query string
    pub url: String,

    pub tracking_id: String,
    pub parent_tracking_id: String,
    pub environment: String,

    /// Milliseconds since epoch
    pub request_timestamp: i64,
    pub response_timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_encoded_as_strings() {
        let events = vec![
            RecordedEvent::new(json!({"type": 2, "data": {}})),
            RecordedEvent::new(json!({"type": 3, "data": {"source": 1}})),
        ];
        let list = EventList::encode(&events).unwrap();

        assert_eq!(list.len(), 2);
        let decoded: serde_json::Value = serde_json::from_str(&list.events[1].payload).unwrap();
        assert_eq!(decoded, json!({"type": 3, "data": {"source": 1}}));
    }

    #[test]
    fn test_batch_field_names() {
        let batch = SessionRecordBatch {
            tracking_id: "t".to_string(),
            parent_tracking_id: "p".to_string(),
            aware_project_id: "proj".to_string(),
            aware_session_tracking_api_key: "key".to_string(),
            session_record_source: "SDK".to_string(),
            current_user_id: None,
            environment: "QA".to_string(),
            event_list: EventList { events: vec![] },
        };
        let value = serde_json::to_value(&batch).unwrap();

        assert_eq!(value["aware_project_id"], "proj");
        assert_eq!(value["event_list"]["events"], json!([]));
        assert!(value.get("current_user_id").is_none());
    }

    #[test]
    fn test_captured_side_encoding() {
        let payload = HttpPayload::new("POST");
        let side = CapturedSide {
            span_id: "00f067aa0ba902b7",
            http_payload: &payload,
        };
        let decoded: serde_json::Value = serde_json::from_str(&side.encode().unwrap()).unwrap();
        assert_eq!(decoded["spanId"], "00f067aa0ba902b7");
        assert_eq!(decoded["httpPayload"]["httpMethod"], "POST");
    }
}
