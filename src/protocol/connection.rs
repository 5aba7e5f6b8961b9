//! Protocol-gated send operations for one connection.
//!
//! # Responsibilities
//! - Own the connection's response state and its transport
//! - Check every send against the state machine before it reaches the wire
//! - Offer an unchecked forced full response for error recovery

use std::fmt;
use std::net::SocketAddr;

use crate::message::{BodyStream, ContentBlock, FullResponse, LastContentBlock, ResponseWithoutBody};
use crate::net::connection::ConnectionId;
use crate::protocol::state::{ProtocolViolation, ResponseProtocol, ResponseState, SendOp};
use crate::protocol::transport::{SendHandle, Transport};

/// The send side of a connection as seen by services.
pub struct Connection {
    id: ConnectionId,
    remote_addr: Option<SocketAddr>,
    protocol: ResponseProtocol,
    transport: Box<dyn Transport>,
}

impl Connection {
    pub fn new(id: ConnectionId, remote_addr: Option<SocketAddr>, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            remote_addr,
            protocol: ResponseProtocol::new(),
            transport,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Response progress of the current request cycle.
    pub fn state(&self) -> ResponseState {
        self.protocol.state()
    }

    /// Send the status line and headers of a progressively built response.
    pub fn send_response_without_body(
        &mut self,
        head: ResponseWithoutBody,
    ) -> Result<SendHandle, ProtocolViolation> {
        self.protocol.advance(SendOp::ResponseWithoutBody)?;
        Ok(self.transport.send_response_without_body(head))
    }

    /// Send one body piece; may be called any number of times after the head.
    pub fn send_content_block(&mut self, block: ContentBlock) -> Result<SendHandle, ProtocolViolation> {
        self.protocol.advance(SendOp::ContentBlock)?;
        Ok(self.transport.send_content_block(block))
    }

    /// Send the terminal body piece, completing the response.
    pub fn send_last_content_block(
        &mut self,
        block: LastContentBlock,
    ) -> Result<SendHandle, ProtocolViolation> {
        self.protocol.advance(SendOp::LastContentBlock)?;
        Ok(self.transport.send_last_content_block(block))
    }

    /// Hand the rest of the body to the transport as a stream, completing
    /// the response. Cannot be mixed with further content blocks.
    pub fn send_body_stream(&mut self, body: BodyStream) -> Result<SendHandle, ProtocolViolation> {
        self.protocol.advance(SendOp::BodyStream)?;
        Ok(self.transport.send_body_stream(body))
    }

    /// Send a complete response in one shot. Only legal before anything else
    /// has been sent in this cycle.
    pub fn send_full_response(&mut self, response: FullResponse) -> Result<SendHandle, ProtocolViolation> {
        self.protocol.advance(SendOp::FullResponse)?;
        Ok(self.transport.send_full_response(response))
    }

    /// Send a full response whatever the state, for error recovery.
    pub fn force_send_full_response(&mut self, response: FullResponse) -> SendHandle {
        self.protocol.force_complete();
        self.transport.send_full_response(response)
    }

    /// Close the underlying connection.
    pub fn close(&mut self) -> SendHandle {
        self.transport.close()
    }

    pub(crate) fn reset(&mut self) {
        self.protocol.reset();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("state", &self.protocol.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote_addr {
            Some(addr) => write!(f, "{} ({})", self.id, addr),
            None => write!(f, "{}", self.id),
        }
    }
}
