//! Inbound request head and buffered request.
//!
//! # Responsibilities
//! - Hold method, raw URI and headers exactly as received
//! - Derive path, query, query parameters, host, connection, cookies,
//!   content type and content length once, at construction
//! - Pair a head with its aggregated body for buffered services

use std::collections::HashMap;
use std::ops::Deref;

use bytes::Bytes;
use hyper::header::{self, HeaderMap};
use hyper::http::request::Parts;
use hyper::Method;

/// A single `name=value` pair from the `Cookie` request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Request line and headers of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestWithoutBody {
    method: Method,
    uri: String,
    headers: HeaderMap,
    path: String,
    query: Option<String>,
    query_params: HashMap<String, Vec<String>>,
    host: Option<String>,
    connection: Option<String>,
    cookies: Vec<Cookie>,
    content_type: Option<String>,
    content_length: Option<u64>,
}

impl RequestWithoutBody {
    /// Build a request head, deriving every convenience field up front.
    pub fn new(method: Method, uri: impl Into<String>, headers: HeaderMap) -> Self {
        let uri = uri.into();
        let (path, query) = split_uri(&uri);
        let query_params = query
            .as_deref()
            .map(|q| parse_urlencoded(q.as_bytes()))
            .unwrap_or_default();

        let host = header_string(&headers, header::HOST);
        let connection = header_string(&headers, header::CONNECTION);
        let content_type = header_string(&headers, header::CONTENT_TYPE);
        let content_length = header_string(&headers, header::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok());
        let cookies = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect();

        Self {
            method,
            uri,
            headers,
            path,
            query,
            query_params,
            host,
            connection,
            cookies,
            content_type,
            content_length,
        }
    }

    /// Build a request head from hyper's request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.method.clone(), parts.uri.to_string(), parts.headers.clone())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw request target, path and query string verbatim.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URI before the first `?`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The URI after the first `?`, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query parameters; repeated keys keep every value in order.
    pub fn query_params(&self) -> &HashMap<String, Vec<String>> {
        &self.query_params
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Look up a cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// `None` when the header is absent or not a valid integer.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

/// A request head together with its fully aggregated body.
#[derive(Debug, Clone)]
pub struct FullRequest {
    head: RequestWithoutBody,
    body: Bytes,
}

impl FullRequest {
    pub fn new(head: RequestWithoutBody, body: impl Into<Bytes>) -> Self {
        Self {
            head,
            body: body.into(),
        }
    }

    pub fn head(&self) -> &RequestWithoutBody {
        &self.head
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (RequestWithoutBody, Bytes) {
        (self.head, self.body)
    }
}

impl Deref for FullRequest {
    type Target = RequestWithoutBody;

    fn deref(&self) -> &Self::Target {
        &self.head
    }
}

fn split_uri(uri: &str) -> (String, Option<String>) {
    match uri.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (uri.to_string(), None),
    }
}

/// Decode `application/x-www-form-urlencoded` bytes into a multimap.
pub fn parse_urlencoded(input: &[u8]) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    params
}

fn parse_cookie_header(value: &str) -> impl Iterator<Item = Cookie> + '_ {
    value.split(';').filter_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim().trim_matches('"');
        Some(Cookie {
            name: name.to_string(),
            value: value.to_string(),
        })
    })
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
