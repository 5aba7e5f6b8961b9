//! Response ordering state machine.
//!
//! | Operation             | Legal from  | New state  |
//! |-----------------------|-------------|------------|
//! | `ResponseWithoutBody` | Initial     | HeaderSent |
//! | `ContentBlock`        | HeaderSent  | HeaderSent |
//! | `LastContentBlock`    | HeaderSent  | Completed  |
//! | `BodyStream`          | HeaderSent  | Completed  |
//! | `FullResponse`        | Initial     | Completed  |
//!
//! Forced full responses are not an operation of this table; see
//! [`ResponseProtocol::force_complete`].

use std::fmt;

/// Progress of the response for the current request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseState {
    /// Nothing sent yet.
    #[default]
    Initial,
    /// Status line and headers sent; body pieces may follow.
    HeaderSent,
    /// The response is complete; nothing more may be sent.
    Completed,
}

impl fmt::Display for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseState::Initial => write!(f, "initial"),
            ResponseState::HeaderSent => write!(f, "header-sent"),
            ResponseState::Completed => write!(f, "completed"),
        }
    }
}

/// A send operation gated by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOp {
    ResponseWithoutBody,
    ContentBlock,
    LastContentBlock,
    BodyStream,
    FullResponse,
}

impl SendOp {
    pub const ALL: [SendOp; 5] = [
        SendOp::ResponseWithoutBody,
        SendOp::ContentBlock,
        SendOp::LastContentBlock,
        SendOp::BodyStream,
        SendOp::FullResponse,
    ];
}

/// A send attempted in an order the protocol forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("a response without body was already sent")]
    HeaderAlreadySent,

    #[error("a response without body must be sent before the body")]
    HeaderNotSent,

    #[error("the response is already complete; nothing more can be sent")]
    ResponseCompleted,

    #[error("a full response cannot follow a partial response")]
    PartialResponseInFlight,

    #[error("the service finished without completing its response (state: {state})")]
    IncompleteResponse { state: ResponseState },
}

/// Per-connection response state machine.
#[derive(Debug, Clone, Default)]
pub struct ResponseProtocol {
    state: ResponseState,
}

impl ResponseProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == ResponseState::Completed
    }

    /// Check `op` against the current state and advance on success.
    ///
    /// On failure the state is left unchanged.
    pub fn advance(&mut self, op: SendOp) -> Result<ResponseState, ProtocolViolation> {
        let next = Self::transition(self.state, op)?;
        self.state = next;
        Ok(next)
    }

    /// The state `op` would move to from `state`, or why it is illegal.
    pub fn transition(state: ResponseState, op: SendOp) -> Result<ResponseState, ProtocolViolation> {
        use ResponseState::*;

        match (op, state) {
            (SendOp::ResponseWithoutBody, Initial) => Ok(HeaderSent),
            (SendOp::ResponseWithoutBody, _) => Err(ProtocolViolation::HeaderAlreadySent),

            (SendOp::ContentBlock, HeaderSent) => Ok(HeaderSent),
            (SendOp::LastContentBlock | SendOp::BodyStream, HeaderSent) => Ok(Completed),
            (SendOp::ContentBlock | SendOp::LastContentBlock | SendOp::BodyStream, Initial) => {
                Err(ProtocolViolation::HeaderNotSent)
            }
            (SendOp::ContentBlock | SendOp::LastContentBlock | SendOp::BodyStream, Completed) => {
                Err(ProtocolViolation::ResponseCompleted)
            }

            (SendOp::FullResponse, Initial) => Ok(Completed),
            (SendOp::FullResponse, HeaderSent) => Err(ProtocolViolation::PartialResponseInFlight),
            (SendOp::FullResponse, Completed) => Err(ProtocolViolation::ResponseCompleted),
        }
    }

    /// Jump to `Completed` regardless of the current state.
    pub fn force_complete(&mut self) {
        self.state = ResponseState::Completed;
    }

    /// Start a new request cycle.
    pub fn reset(&mut self) {
        self.state = ResponseState::Initial;
    }
}
