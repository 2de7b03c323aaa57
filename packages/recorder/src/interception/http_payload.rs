// packages/recorder/src/interception/http_payload.rs
//! Structured HTTP payloads for captured requests and responses
//!
//! The body variant is picked by sniffing `content-type`. Bodies that cannot
//! be read are omitted; multipart and binary bodies above 10MB are dropped
//! with a warning instead of being truncated. Headers, query parameters and
//! method are always kept.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{debug, warn};

/// Largest multipart or binary body kept in a payload
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

static BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"boundary=([^;]+)").unwrap());
static PART_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"name="([^"]+)""#).unwrap());
static PART_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"filename="([^"]+)""#).unwrap());

/// Key/value body wrapper
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueMap<V> {
    pub key_value_map: BTreeMap<String, V>,
}

/// Multipart field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    File { filename: String, content: String },
}

/// Raw octet-stream body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryData {
    pub data: Vec<u8>,
}

/// The one body field a payload may carry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HttpBody {
    #[serde(rename = "jsonBody")]
    Json(String),
    #[serde(rename = "textBody")]
    Text(String),
    #[serde(rename = "htmlBody")]
    Html(String),
    #[serde(rename = "xmlBody")]
    Xml(String),
    #[serde(rename = "httpFormDataBody")]
    FormData(KeyValueMap<FormValue>),
    #[serde(rename = "httpFormUrlencodedBody")]
    FormUrlencoded(KeyValueMap<String>),
    #[serde(rename = "binaryDataBody")]
    Binary(BinaryData),
}

/// Request or response as sent to the ingestion service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpPayload {
    pub header_map: BTreeMap<String, String>,
    pub query_param_map: BTreeMap<String, String>,
    pub http_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(flatten)]
    pub body: Option<HttpBody>,
}

impl HttpPayload {
    pub fn new(method: &str) -> Self {
        Self {
            header_map: BTreeMap::new(),
            query_param_map: BTreeMap::new(),
            http_method: method.to_string(),
            response_code: None,
            body: None,
        }
    }

    pub fn json_body(&self) -> Option<&str> {
        match &self.body {
            Some(HttpBody::Json(json)) => Some(json),
            _ => None,
        }
    }

    /// Size of the JSON encoding, used to skip oversized captures
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map_or(usize::MAX, |v| v.len())
    }
}

/// Everything needed to build a payload, detached from the live message
pub struct PayloadSource<B> {
    pub method: Option<Method>,
    pub url: String,
    pub headers: HeaderMap,
    pub status: Option<StatusCode>,
    pub body: B,
}

impl PayloadSource<Full<Bytes>> {
    /// Snapshot of a request; the body is cloned, the request untouched
    pub fn from_request(request: &Request<Full<Bytes>>) -> Self {
        Self {
            method: Some(request.method().clone()),
            url: request.uri().to_string(),
            headers: request.headers().clone(),
            status: None,
            body: request.body().clone(),
        }
    }

    /// Snapshot of a response received for `url`
    pub fn from_response(url: &str, response: &Response<Full<Bytes>>) -> Self {
        Self {
            method: None,
            url: url.to_string(),
            headers: response.headers().clone(),
            status: Some(response.status()),
            body: response.body().clone(),
        }
    }
}

impl<B> PayloadSource<B>
where
    B: Body,
    B::Error: Display,
{
    /// Read the body and build the payload
    pub async fn materialize(self) -> HttpPayload {
        let method = self.method.as_ref().map(Method::as_str).unwrap_or_default();
        let mut payload = HttpPayload::new(method);

        for (name, value) in self.headers.iter() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            payload
                .header_map
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        payload.response_code = self.status.map(|s| s.as_u16());
        payload.query_param_map = query_params(&self.url);

        if self.method == Some(Method::GET) {
            return payload;
        }

        let content_type = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = match self.body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("Unable to read body of {}: {}", self.url, e);
                return payload;
            }
        };

        payload.body = parse_body(&content_type, &bytes);
        payload
    }
}

fn query_params(url: &str) -> BTreeMap<String, String> {
    let query = url
        .split_once('?')
        .map(|(_, q)| q.split('#').next().unwrap_or_default())
        .unwrap_or_default();

    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn parse_body(content_type: &str, bytes: &Bytes) -> Option<HttpBody> {
    let lowered = content_type.to_ascii_lowercase();

    if lowered.contains("application/json") {
        let json = serde_json::from_slice::<serde_json::Value>(bytes)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "{}".to_string());
        return Some(HttpBody::Json(json));
    }

    if lowered.contains("multipart/form-data") {
        if bytes.len() > MAX_BODY_BYTES {
            warn!("Form data exceeds 10MB. Dropping data.");
            return None;
        }
        return parse_multipart(content_type, bytes);
    }

    if lowered.contains("application/octet-stream") {
        if bytes.len() > MAX_BODY_BYTES {
            warn!("Binary data exceeds 10MB. Dropping data.");
            return None;
        }
        return Some(HttpBody::Binary(BinaryData {
            data: bytes.to_vec(),
        }));
    }

    if lowered.contains("application/x-www-form-urlencoded") {
        let key_value_map = url::form_urlencoded::parse(bytes).into_owned().collect();
        return Some(HttpBody::FormUrlencoded(KeyValueMap { key_value_map }));
    }

    let text = String::from_utf8_lossy(bytes).into_owned();
    let body = if lowered.contains("text/html") {
        HttpBody::Html(text)
    } else if lowered.contains("application/xml") || lowered.contains("text/xml") {
        HttpBody::Xml(text)
    } else {
        HttpBody::Text(text)
    };
    Some(body)
}

fn parse_multipart(content_type: &str, bytes: &Bytes) -> Option<HttpBody> {
    let Some(boundary) = BOUNDARY
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_matches('"').to_string())
    else {
        debug!("Multipart body without boundary, skipping");
        return None;
    };

    let text = String::from_utf8_lossy(bytes);
    let delimiter = format!("--{}", boundary);
    if !text.contains(&delimiter) {
        return None;
    }

    let mut key_value_map = BTreeMap::new();
    for part in text.split(delimiter.as_str()) {
        let part = part.trim();
        if part.is_empty() || part == "--" {
            continue;
        }

        let (headers, content) = part.split_once("\r\n\r\n").unwrap_or((part, ""));
        let Some(name) = PART_NAME.captures(headers).and_then(|c| c.get(1)) else {
            continue;
        };

        let value = match PART_FILENAME.captures(headers).and_then(|c| c.get(1)) {
            Some(filename) => FormValue::File {
                filename: filename.as_str().to_string(),
                content: content.to_string(),
            },
            None => FormValue::Text(content.trim().to_string()),
        };
        key_value_map.insert(name.as_str().to_string(), value);
    }

    Some(HttpBody::FormData(KeyValueMap { key_value_map }))
}
