//! `Transport` implementation over hyper's HTTP/1.1 server connection.
//!
//! # Responsibilities
//! - Hand the response head to hyper through the per-request exchange slot
//! - Queue body frames and body streams for the streamed response body
//! - Abort the response (and the connection) on `close`
//!
//! # Data Flow
//! ```text
//! hyper service_fn                         HyperTransport (dispatcher side)
//!   ExchangeSlot::begin(head_tx) ───────▶ slot holds head_tx
//!   head_rx.await  ◀────────────────────  send_response_without_body / send_full_response
//!   response body polls the queue ◀─────  send_content_block / send_last_content_block
//!     └─ then pulls the BodyStream ◀────  send_body_stream
//! ```
//!
//! # Design Decisions
//! - Sends never block: the head goes through a oneshot, frames and streams
//!   through a queue that only hyper reads
//! - A frame's handle resolves when hyper takes the frame; a body stream's
//!   handle resolves when hyper has pulled its last chunk
//! - A body stream is read only as fast as hyper polls the response body
//! - A send with nothing to receive it resolves as a failed handle

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderValue, CONNECTION};
use hyper::{HeaderMap, Response, StatusCode};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::message::{BodyStream, ContentBlock, FullResponse, LastContentBlock, ResponseWithoutBody};
use crate::protocol::{SendError, SendHandle, Transport};

/// Response body type handed to hyper.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

type BodyFrame = Result<Frame<Bytes>, io::Error>;

/// One entry of a streamed response, in send order.
enum Outbound {
    Frame {
        frame: BodyFrame,
        taken: Option<oneshot::Sender<()>>,
    },
    /// Ends the queue; hyper pulls the rest of the body from the stream.
    Stream {
        body: BodyStream,
        drained: oneshot::Sender<Result<(), SendError>>,
    },
}

type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Where the response body currently reads from.
enum BodySource {
    Queue(mpsc::UnboundedReceiver<Outbound>),
    Draining {
        body: BodyStream,
        drained: oneshot::Sender<Result<(), SendError>>,
    },
    Finished,
}

/// The exchange in flight on a connection.
#[derive(Debug, Default)]
struct Exchange {
    head: Option<oneshot::Sender<Response<ResponseBody>>>,
    body: Option<OutboundSender>,
}

/// Shared between hyper's service future, the request driver and the
/// transport. Holds where the current response must go.
#[derive(Debug, Clone, Default)]
pub struct ExchangeSlot {
    exchange: Arc<Mutex<Exchange>>,
    closed: CancellationToken,
}

impl ExchangeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Exchange> {
        // A poisoned slot still holds consistent Options.
        self.exchange.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new exchange; the response head will be delivered to `head`.
    pub fn begin(&self, head: oneshot::Sender<Response<ResponseBody>>) {
        let mut exchange = self.lock();
        exchange.head = Some(head);
        exchange.body = None;
    }

    /// End the exchange. A response the service never finished is aborted.
    pub fn finish(&self) {
        let mut exchange = self.lock();
        exchange.head = None;
        if let Some(body) = exchange.body.take() {
            abort(&body, io::ErrorKind::UnexpectedEof, "response body left unfinished");
        }
    }

    /// Answer the exchange directly, bypassing the dispatcher, and close the
    /// connection afterwards. Used for requests the transport refuses.
    pub fn reject(&self, status: StatusCode) -> bool {
        let head = self.lock().head.take();
        let Some(head) = head else {
            return false;
        };

        let mut response = Response::new(empty_body());
        *response.status_mut() = status;
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        head.send(response).is_ok()
    }

    /// Close the connection, aborting anything in flight.
    pub fn close(&self) {
        let mut exchange = self.lock();
        exchange.head = None;
        if let Some(body) = exchange.body.take() {
            abort(&body, io::ErrorKind::ConnectionAborted, "connection closed");
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

/// `Transport` writing into the exchange slot of one hyper connection.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    slot: ExchangeSlot,
}

impl HyperTransport {
    pub fn new(slot: ExchangeSlot) -> Self {
        Self { slot }
    }

    fn deliver_head(&self, headers: HeaderMap, status: StatusCode, body: ResponseBody) -> Result<(), SendError> {
        if self.slot.is_closed() {
            return Err(SendError::Closed);
        }

        let head = self.slot.lock().head.take();
        let Some(head) = head else {
            return Err(SendError::HeadAlreadyWritten);
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        head.send(response).map_err(|_| SendError::Closed)
    }

    fn push_frame(&self, frame: Frame<Bytes>) -> SendHandle {
        let exchange = self.slot.lock();
        match exchange.body.as_ref() {
            Some(body) => queue_frame(body, frame),
            None if self.slot.is_closed() => SendHandle::failed(SendError::Closed),
            None => SendHandle::failed(SendError::NoResponseHead),
        }
    }

    fn take_body(&self) -> Result<OutboundSender, SendError> {
        match self.slot.lock().body.take() {
            Some(body) => Ok(body),
            None if self.slot.is_closed() => Err(SendError::Closed),
            None => Err(SendError::NoResponseHead),
        }
    }
}

impl Transport for HyperTransport {
    fn send_response_without_body(&mut self, head: ResponseWithoutBody) -> SendHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let frames = stream::unfold(BodySource::Queue(rx), next_frame);
        let body = StreamBody::new(frames).boxed_unsync();

        match self.deliver_head(head.to_header_map(), head.status(), body) {
            Ok(()) => {
                self.slot.lock().body = Some(tx);
                SendHandle::done()
            }
            Err(e) => SendHandle::failed(e),
        }
    }

    fn send_content_block(&mut self, block: ContentBlock) -> SendHandle {
        self.push_frame(Frame::data(block.into_content()))
    }

    fn send_last_content_block(&mut self, block: LastContentBlock) -> SendHandle {
        let body = match self.take_body() {
            Ok(body) => body,
            Err(e) => return SendHandle::failed(e),
        };

        let (content, trailers) = block.into_parts();
        let mut last = SendHandle::done();
        if !content.is_empty() {
            last = queue_frame(&body, Frame::data(content));
        }
        if !trailers.is_empty() {
            last = queue_frame(&body, Frame::trailers(trailers));
        }
        // Dropping the sender ends the body once hyper has read the queue.
        last
    }

    fn send_body_stream(&mut self, body: BodyStream) -> SendHandle {
        let queue = match self.take_body() {
            Ok(queue) => queue,
            Err(e) => return SendHandle::failed(e),
        };

        let (drained, done) = oneshot::channel();
        if queue.send(Outbound::Stream { body, drained }).is_err() {
            return SendHandle::failed(SendError::Closed);
        }
        SendHandle::new(async move { done.await.unwrap_or(Err(SendError::Closed)) })
    }

    fn send_full_response(&mut self, response: FullResponse) -> SendHandle {
        let headers = response.to_header_map();
        let (head, content) = response.into_parts();
        let body = Full::new(content).map_err(|never| match never {}).boxed_unsync();
        SendHandle::ready(self.deliver_head(headers, head.status(), body))
    }

    fn close(&mut self) -> SendHandle {
        self.slot.close();
        SendHandle::done()
    }
}

/// Queue one frame; the handle resolves once hyper has taken it.
fn queue_frame(queue: &OutboundSender, frame: Frame<Bytes>) -> SendHandle {
    let (taken, ack) = oneshot::channel();
    let outbound = Outbound::Frame {
        frame: Ok(frame),
        taken: Some(taken),
    };
    if queue.send(outbound).is_err() {
        return SendHandle::failed(SendError::Closed);
    }
    SendHandle::new(async move { ack.await.map_err(|_| SendError::Closed) })
}

fn abort(queue: &OutboundSender, kind: io::ErrorKind, message: &'static str) {
    let _ = queue.send(Outbound::Frame {
        frame: Err(io::Error::new(kind, message)),
        taken: None,
    });
}

/// Produce the next response body frame, pulling from the queue and then
/// from a queued body stream.
async fn next_frame(mut source: BodySource) -> Option<(BodyFrame, BodySource)> {
    loop {
        match source {
            BodySource::Queue(mut queue) => match queue.recv().await? {
                Outbound::Frame { frame, taken } => {
                    if let Some(taken) = taken {
                        let _ = taken.send(());
                    }
                    return Some((frame, BodySource::Queue(queue)));
                }
                Outbound::Stream { body, drained } => source = BodySource::Draining { body, drained },
            },
            BodySource::Draining { mut body, drained } => {
                return match body.next_chunk().await {
                    Some(Ok(data)) => Some((Ok(Frame::data(data)), BodySource::Draining { body, drained })),
                    Some(Err(e)) => {
                        let frame = Err(io::Error::new(e.kind(), e.to_string()));
                        let _ = drained.send(Err(SendError::Body(e)));
                        Some((frame, BodySource::Finished))
                    }
                    None => {
                        let _ = drained.send(Ok(()));
                        None
                    }
                };
            }
            BodySource::Finished => return None,
        }
    }
}

fn empty_body() -> ResponseBody {
    Full::new(Bytes::new()).map_err(|never| match never {}).boxed_unsync()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::BodyExt;
    use std::time::Duration;

    fn exchange() -> (HyperTransport, ExchangeSlot, oneshot::Receiver<Response<ResponseBody>>) {
        let slot = ExchangeSlot::new();
        let (tx, rx) = oneshot::channel();
        slot.begin(tx);
        (HyperTransport::new(slot.clone()), slot, rx)
    }

    fn chunks(count: usize, size: usize) -> BodyStream {
        BodyStream::from_chunks(std::iter::repeat(Bytes::from(vec![b'z'; size])).take(count))
    }

    #[tokio::test]
    async fn full_response_reaches_hyper() {
        let (mut transport, _slot, rx) = exchange();
        transport
            .send_full_response(FullResponse::text(StatusCode::OK, "hi"))
            .await
            .unwrap();

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-length"], "2");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn streamed_response_collects_blocks() {
        let (mut transport, slot, rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let first = transport.send_content_block(ContentBlock::new("ab"));
        let last = transport.send_last_content_block(LastContentBlock::new("cd"));
        slot.finish();

        let body = rx.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"abcd"));
        first.await.unwrap();
        last.await.unwrap();
    }

    #[tokio::test]
    async fn block_handle_waits_until_hyper_takes_the_frame() {
        let (mut transport, _slot, rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let mut handle = transport.send_content_block(ContentBlock::new("ab"));
        let mut body = rx.await.unwrap().into_body();

        assert!(tokio::time::timeout(Duration::from_millis(50), &mut handle).await.is_err());

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"ab"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn body_stream_is_pulled_at_the_reader_pace() {
        let (mut transport, _slot, rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let mut handle = transport.send_body_stream(chunks(64, 1024));
        let response = rx.await.unwrap();

        // Nobody reads the body, so nothing is drained.
        assert!(tokio::time::timeout(Duration::from_millis(50), &mut handle).await.is_err());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), 64 * 1024);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn body_stream_follows_queued_blocks() {
        let (mut transport, _slot, rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let _ = transport.send_content_block(ContentBlock::new("head:"));
        let handle = transport.send_body_stream(BodyStream::from_chunks([
            Bytes::from_static(b"one,"),
            Bytes::from_static(b"two"),
        ]));

        let body = rx.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"head:one,two"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_body_fails_the_stream_handle() {
        let (mut transport, _slot, rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let handle = transport.send_body_stream(chunks(4, 16));
        drop(rx.await.unwrap());

        assert!(matches!(handle.await, Err(SendError::Closed)));
    }

    #[tokio::test]
    async fn failing_body_stream_reports_the_error() {
        let (mut transport, _slot, rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let failing = BodyStream::new(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::Other, "disk gone")),
        ]));
        let handle = transport.send_body_stream(failing);

        assert!(rx.await.unwrap().into_body().collect().await.is_err());
        assert!(matches!(handle.await, Err(SendError::Body(_))));
    }

    #[tokio::test]
    async fn second_head_is_rejected() {
        let (mut transport, _slot, _rx) = exchange();
        transport
            .send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))
            .await
            .unwrap();
        let result = transport
            .send_full_response(FullResponse::new(StatusCode::INTERNAL_SERVER_ERROR))
            .await;
        assert!(matches!(result, Err(SendError::HeadAlreadyWritten)));
    }

    #[tokio::test]
    async fn sends_after_close_fail() {
        let (mut transport, slot, rx) = exchange();
        transport.close().await.unwrap();
        assert!(slot.is_closed());
        assert!(rx.await.is_err());

        let result = transport.send_content_block(ContentBlock::new("x")).await;
        assert!(matches!(result, Err(SendError::Closed)));
        let result = transport.send_full_response(FullResponse::new(StatusCode::OK)).await;
        assert!(matches!(result, Err(SendError::Closed)));
    }

    #[tokio::test]
    async fn body_without_head_fails() {
        let (mut transport, _slot, _rx) = exchange();
        let result = transport.send_content_block(ContentBlock::new("x")).await;
        assert!(matches!(result, Err(SendError::NoResponseHead)));
    }

    #[tokio::test]
    async fn reject_sends_close_header() {
        let slot = ExchangeSlot::new();
        let (tx, rx) = oneshot::channel();
        slot.begin(tx);
        assert!(slot.reject(StatusCode::PAYLOAD_TOO_LARGE));

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[CONNECTION], "close");
    }
}
