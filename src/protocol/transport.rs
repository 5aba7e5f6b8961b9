//! Outbound send primitives consumed from the transport.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::message::{BodyStream, ContentBlock, FullResponse, LastContentBlock, ResponseWithoutBody};

/// Why a send did not reach the peer.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,

    #[error("response head already written to the wire")]
    HeadAlreadyWritten,

    #[error("no response head in flight for body data")]
    NoResponseHead,

    #[error("body stream failed: {0}")]
    Body(#[from] io::Error),
}

/// Completion of one send operation.
///
/// The send itself has already been issued when the handle is returned;
/// awaiting it is optional and only reports the outcome.
pub struct SendHandle {
    inner: BoxFuture<'static, Result<(), SendError>>,
}

impl SendHandle {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<(), SendError>> + Send + 'static,
    {
        Self { inner: fut.boxed() }
    }

    /// A handle that is already resolved.
    pub fn ready(result: Result<(), SendError>) -> Self {
        Self::new(future::ready(result))
    }

    pub fn done() -> Self {
        Self::ready(Ok(()))
    }

    pub fn failed(err: SendError) -> Self {
        Self::ready(Err(err))
    }
}

impl Future for SendHandle {
    type Output = Result<(), SendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for SendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendHandle").finish_non_exhaustive()
    }
}

/// Non-blocking write side of one connection.
///
/// Implementations perform the write (or queue it) before returning. They do
/// not check ordering; [`Connection`](crate::protocol::Connection) does.
/// Once the peer is gone every method must return a failed handle rather than
/// panic.
pub trait Transport: Send {
    fn send_response_without_body(&mut self, head: ResponseWithoutBody) -> SendHandle;

    fn send_content_block(&mut self, block: ContentBlock) -> SendHandle;

    fn send_last_content_block(&mut self, block: LastContentBlock) -> SendHandle;

    /// Hand a body producer to the transport, which drains it to completion.
    fn send_body_stream(&mut self, body: BodyStream) -> SendHandle;

    fn send_full_response(&mut self, response: FullResponse) -> SendHandle;

    /// Close the connection, abandoning anything in flight.
    fn close(&mut self) -> SendHandle;
}
