//! Outbound response head and buffered response.
//!
//! # Responsibilities
//! - Hold status and well-known header fields as plain values
//! - Encode them to a wire `HeaderMap` only when the transport sends
//! - Provide constructors for common full responses
//!
//! # Design Decisions
//! - `content_length` is optional on a head; without it the transport
//!   streams the body chunked
//! - A full response always advertises the length of its body
//! - Header values that cannot be encoded are skipped with a warning at send
//!   time rather than failing the send

use std::ops::{Deref, DerefMut};

use bytes::Bytes;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::StatusCode;

use crate::message::media;

/// Status line and headers of an outbound response.
#[derive(Debug, Clone)]
pub struct ResponseWithoutBody {
    status: StatusCode,
    content_length: Option<u64>,
    content_type: Option<String>,
    connection: Option<String>,
    set_cookies: Vec<String>,
    custom_headers: HeaderMap,
}

impl ResponseWithoutBody {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_length: None,
            content_type: None,
            connection: None,
            set_cookies: Vec::new(),
            custom_headers: HeaderMap::new(),
        }
    }

    /// A head announcing a body of known length and type.
    pub fn with_length(status: StatusCode, content_length: u64, content_type: Option<&str>) -> Self {
        let mut head = Self::new(status);
        head.content_length = Some(content_length);
        head.content_type = content_type.map(str::to_string);
        head
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, content_length: u64) {
        self.content_length = Some(content_length);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn set_connection(&mut self, connection: impl Into<String>) {
        self.connection = Some(connection.into());
    }

    pub fn set_cookies(&self) -> &[String] {
        &self.set_cookies
    }

    /// Append a `Set-Cookie` header of the form `name=value`.
    pub fn add_cookie(&mut self, name: &str, value: &str) {
        self.set_cookies.push(format!("{}={}", name, value));
    }

    /// Append a pre-encoded `Set-Cookie` header value (attributes included).
    pub fn add_set_cookie(&mut self, encoded: impl Into<String>) {
        self.set_cookies.push(encoded.into());
    }

    pub fn custom_headers(&self) -> &HeaderMap {
        &self.custom_headers
    }

    pub fn add_custom_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.custom_headers.append(name, value);
    }

    /// Encode every field into wire headers.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(len) = self.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        if let Some(ct) = &self.content_type {
            insert_str(&mut headers, header::CONTENT_TYPE, ct);
        }
        if let Some(conn) = &self.connection {
            insert_str(&mut headers, header::CONNECTION, conn);
        }
        for cookie in &self.set_cookies {
            match HeaderValue::from_str(cookie) {
                Ok(v) => {
                    headers.append(header::SET_COOKIE, v);
                }
                Err(_) => tracing::warn!(cookie = %cookie, "Skipping unencodable Set-Cookie value"),
            }
        }
        for (name, value) in &self.custom_headers {
            headers.append(name.clone(), value.clone());
        }

        headers
    }
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = %name, value = %value, "Skipping unencodable header value"),
    }
}

/// A response head with its complete body.
#[derive(Debug, Clone)]
pub struct FullResponse {
    head: ResponseWithoutBody,
    body: Bytes,
}

impl FullResponse {
    /// An empty-bodied response.
    pub fn new(status: StatusCode) -> Self {
        Self {
            head: ResponseWithoutBody::new(status),
            body: Bytes::new(),
        }
    }

    pub fn with_body(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            head: ResponseWithoutBody::with_length(status, body.len() as u64, content_type),
            body,
        }
    }

    pub fn html(status: StatusCode, html: impl Into<String>) -> Self {
        Self::with_body(status, Some(media::TEXT_HTML_UTF8), html.into())
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::with_body(status, Some(media::TEXT_PLAIN_UTF8), text.into())
    }

    pub fn json(status: StatusCode, json: impl Into<String>) -> Self {
        Self::with_body(status, Some(media::APPLICATION_JSON), json.into())
    }

    pub fn octet_stream(status: StatusCode, data: impl Into<Bytes>) -> Self {
        Self::with_body(status, Some(media::APPLICATION_OCTET_STREAM), data)
    }

    pub fn head(&self) -> &ResponseWithoutBody {
        &self.head
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body and update the advertised length.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
        self.head.set_content_length(self.body.len() as u64);
    }

    /// Encode the head for the wire; the length always matches the body.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = self.head.to_header_map();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len() as u64));
        headers
    }

    pub fn into_parts(self) -> (ResponseWithoutBody, Bytes) {
        (self.head, self.body)
    }
}

impl Deref for FullResponse {
    type Target = ResponseWithoutBody;

    fn deref(&self) -> &Self::Target {
        &self.head
    }
}

impl DerefMut for FullResponse {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.head
    }
}
