//! Streamed body pieces.

use bytes::Bytes;
use hyper::HeaderMap;

/// One non-terminal piece of a streamed body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBlock {
    content: Bytes,
}

impl ContentBlock {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// The terminal piece of a streamed body.
///
/// May carry a final payload and trailer headers. An empty last block is the
/// usual end-of-body marker.
#[derive(Debug, Clone, Default)]
pub struct LastContentBlock {
    content: Bytes,
    trailers: HeaderMap,
}

impl LastContentBlock {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            trailers: HeaderMap::new(),
        }
    }

    /// An end-of-body marker with no payload.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_trailers(content: impl Into<Bytes>, trailers: HeaderMap) -> Self {
        Self {
            content: content.into(),
            trailers,
        }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    pub fn into_parts(self) -> (Bytes, HeaderMap) {
        (self.content, self.trailers)
    }
}

impl From<LastContentBlock> for ContentBlock {
    fn from(last: LastContentBlock) -> Self {
        ContentBlock::new(last.content)
    }
}
