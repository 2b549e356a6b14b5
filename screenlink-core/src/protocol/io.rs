//! Stream plumbing: the outbound queue, its writer task, and the inbound
//! command stream.
//!
//! Every producer of outbound traffic (frame loop, dispatcher, auto-accept)
//! holds an [`Outbox`] clone. A single writer task owns the sink, so lines
//! from different tasks never interleave.

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use super::codec::AgentCodec;
use super::message::Outbound;
use crate::error::AgentError;

/// Default depth of the outbound queue.
pub const OUTBOX_CAPACITY: usize = 64;

// ── Outbox ───────────────────────────────────────────────────────

/// Cloneable handle for queueing outbound messages.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Outbound>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, message: Outbound) -> Result<(), AgentError> {
        self.tx.send(message).await?;
        Ok(())
    }

    /// Queue an encoded frame. Waits while the writer is behind.
    pub async fn screen(&self, jpeg: impl Into<Bytes>) -> Result<(), AgentError> {
        self.send(Outbound::screen(jpeg)).await
    }

    /// Queue a log line for the controller. Best effort.
    pub async fn log(&self, message: impl Into<String>) {
        if self.tx.send(Outbound::log(message)).await.is_err() {
            debug!("outbox closed; log line dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Writer ───────────────────────────────────────────────────────

/// Drain `rx` into `writer`, one flushed line per message.
///
/// Returns when every [`Outbox`] has been dropped, or on the first write
/// error.
pub async fn write_outbound<W>(writer: W, mut rx: mpsc::Receiver<Outbound>) -> Result<(), AgentError>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, AgentCodec::new());
    while let Some(message) = rx.recv().await {
        sink.send(message).await?;
    }
    Ok(())
}

pub fn spawn_writer<W>(writer: W, rx: mpsc::Receiver<Outbound>) -> JoinHandle<Result<(), AgentError>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(write_outbound(writer, rx))
}

// ── Reader ───────────────────────────────────────────────────────

/// Frame an inbound byte stream into decoded commands.
pub fn command_stream<R: AsyncRead>(reader: R) -> FramedRead<R, AgentCodec> {
    FramedRead::new(reader, AgentCodec::new())
}

// ── Tests ────────────────────────────────────────────────────────
