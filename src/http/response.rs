//! Response encoding.
//!
//! # Responsibilities
//! - Render the fixed-schema JSON status payload
//! - Render the HTML help page
//! - Serialize the HTTP/1.1 status line, headers and body
//!
//! # Design Decisions
//! - Status is always `200 OK`; failures live in the JSON body
//! - JSON field order is part of the contract and follows struct declaration order
//! - `Content-Length` is the byte length of the rendered body
//! - Every response closes the connection

use std::net::SocketAddr;

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::inference::InferenceResult;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// The JSON body shared by `/predict`, `/status` and the peer notification.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload<'a> {
    pub success: bool,
    pub predicted_digit: i32,
    #[serde(serialize_with = "six_places")]
    pub confidence: f32,
    pub error_message: &'a str,
    pub heap_free: u64,
    pub model_initialized: bool,
}

impl<'a> StatusPayload<'a> {
    pub fn new(result: &'a InferenceResult, heap_free: u64, model_initialized: bool) -> Self {
        Self {
            success: result.success,
            predicted_digit: result.predicted_digit,
            confidence: result.confidence,
            error_message: &result.error_message,
            heap_free,
            model_initialized,
        }
    }
}

/// Write a float as a JSON number with exactly six fractional digits.
fn six_places<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    let value = if value.is_finite() { *value } else { 0.0 };
    let raw = RawValue::from_string(format!("{:.6}", value)).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

/// Render the status payload with two-space indentation.
pub fn encode_status(result: &InferenceResult, heap_free: u64, model_initialized: bool) -> String {
    let payload = StatusPayload::new(result, heap_free, model_initialized);
    match serde_json::to_string_pretty(&payload) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode status payload");
            format!(
                "{{\n  \"success\": false,\n  \"predicted_digit\": -1,\n  \"confidence\": 0.000000,\n  \"error_message\": \"encoding failed\",\n  \"heap_free\": {},\n  \"model_initialized\": {}\n}}",
                heap_free, model_initialized
            )
        }
    }
}

/// Static help document listing the endpoints.
pub fn help_page(local_addr: Option<SocketAddr>) -> String {
    let mut page = String::from("<!DOCTYPE html><html><body>");
    page.push_str("<h1>Digit Relay API</h1>");
    page.push_str("<h2>Endpoints:</h2>");
    page.push_str("<p><b>POST /predict</b> - Run inference</p>");
    page.push_str("<p>Body JSON: {\"pixels\": [784 values 0-255]}</p>");
    page.push_str("<p><b>GET /status</b> - Service status</p>");
    if let Some(addr) = local_addr {
        page.push_str(&format!("<p>Address: {}</p>", addr));
    }
    page.push_str("</body></html>");
    page
}

/// A complete response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn json(body: String) -> Self {
        Self {
            content_type: CONTENT_TYPE_JSON,
            body,
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            content_type: CONTENT_TYPE_HTML,
            body,
        }
    }

    /// Status line and headers, terminated by the blank line.
    pub fn head(&self) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Connection: close\r\n\
             Content-Length: {}\r\n\
             \r\n",
            self.content_type,
            self.body.len()
        )
    }

    /// Head followed by body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = self.head();
        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}
