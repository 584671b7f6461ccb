//! Ordered, fire-and-forget envelope transport between the host and the sandbox.
//!
//! Each direction is a single unbounded queue, so envelopes posted in program order arrive in
//! that order. Nothing is acknowledged. Envelopes travel as raw JSON values and are decoded on
//! the receiving side, which lets a receiver skip envelope types it does not recognize.

use std::marker::PhantomData;

use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
    FutureExt, StreamExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{HostCommand, SandboxEvent};

/// Transport failures when posting an envelope.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The opposite endpoint was dropped.
    #[error("peer endpoint disconnected")]
    Disconnected,
    /// The message could not be encoded as an envelope.
    #[error("envelope encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of a non-blocking receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Received<T> {
    /// A decoded envelope.
    Message(T),
    /// An envelope whose type or payload this side does not understand.
    Unrecognized(Value),
    /// Nothing queued right now.
    Empty,
    /// The peer endpoint was dropped and the queue is drained.
    Closed,
}

/// One side of the channel: posts `Out` envelopes and receives `In` envelopes.
pub struct Endpoint<Out, In> {
    tx: UnboundedSender<Value>,
    rx: UnboundedReceiver<Value>,
    _marker: PhantomData<fn(Out) -> In>,
}

/// Host side of the channel.
pub type HostEndpoint = Endpoint<HostCommand, SandboxEvent>;
/// Sandbox side of the channel.
pub type SandboxEndpoint = Endpoint<SandboxEvent, HostCommand>;

/// Creates a connected host/sandbox endpoint pair.
pub fn channel() -> (HostEndpoint, SandboxEndpoint) {
    let (host_tx, sandbox_rx) = unbounded();
    let (sandbox_tx, host_rx) = unbounded();
    (
        Endpoint {
            tx: host_tx,
            rx: host_rx,
            _marker: PhantomData,
        },
        Endpoint {
            tx: sandbox_tx,
            rx: sandbox_rx,
            _marker: PhantomData,
        },
    )
}

impl<Out, In> Endpoint<Out, In>
where
    Out: Serialize,
    In: DeserializeOwned,
{
    /// Encodes and posts one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Disconnected`] when the peer is gone, or
    /// [`ChannelError::Encode`] when `message` cannot be serialized.
    pub fn post(&self, message: &Out) -> Result<(), ChannelError> {
        let raw = serde_json::to_value(message)?;
        self.post_raw(raw)
    }

    /// Posts an already-encoded envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Disconnected`] when the peer is gone.
    pub fn post_raw(&self, raw: Value) -> Result<(), ChannelError> {
        self.tx
            .unbounded_send(raw)
            .map_err(|_| ChannelError::Disconnected)
    }

    /// Takes the next queued envelope without waiting.
    pub fn try_recv(&mut self) -> Received<In> {
        match self.rx.next().now_or_never() {
            None => Received::Empty,
            Some(None) => Received::Closed,
            Some(Some(raw)) => decode(raw),
        }
    }

    /// Waits for the next envelope. Returns `None` once the peer is gone and drained.
    pub async fn recv(&mut self) -> Option<Received<In>> {
        let raw = self.rx.next().await?;
        Some(decode(raw))
    }
}

fn decode<In: DeserializeOwned>(raw: Value) -> Received<In> {
    match serde_json::from_value::<In>(raw.clone()) {
        Ok(message) => Received::Message(message),
        Err(_) => Received::Unrecognized(raw),
    }
}
