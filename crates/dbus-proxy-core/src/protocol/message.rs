//! Inbound signal messages, outbound method calls, and bus errors.

use thiserror::Error;

use crate::domain::signature::Signature;
use crate::protocol::value::{body_signature, Value};

/// A decoded signal message as delivered by the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    /// Unique name of the connection that emitted the signal (e.g. `:1.42`).
    pub sender: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    /// Signature string from the message header.
    pub signature: String,
    pub body: Vec<Value>,
}

impl SignalMessage {
    /// Creates a message whose header signature is computed from `body`.
    pub fn new(
        sender: impl Into<String>,
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        body: Vec<Value>,
    ) -> Self {
        Self {
            sender: sender.into(),
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            signature: body_signature(&body),
            body,
        }
    }

    /// Overrides the header signature, e.g. to model a peer that declares a
    /// different signature than its body values suggest.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }
}

/// A method invocation forwarded to the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub destination: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub in_signature: Signature,
    pub out_signature: Signature,
    pub args: Vec<Value>,
}

/// Failures reported by the bus connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The connection is closed or closing.
    #[error("connection closed")]
    ConnectionClosed,

    /// The daemon refused an `AddMatch` / `RemoveMatch` request.
    #[error("match rule {rule:?} rejected: {reason}")]
    MatchRuleRejected { rule: String, reason: String },

    /// The remote peer answered a method call with an error reply.
    #[error("{name}: {message}")]
    Remote { name: String, message: String },

    /// Any other I/O or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}
