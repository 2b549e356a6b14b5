//! Newline-delimited JSON framing for both directions of the pipe.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{Command, Outbound, parse_command};
use crate::error::ProtocolError;

/// Longest inbound line accepted; longer lines are discarded whole.
pub const MAX_LINE_LENGTH: usize = 1 << 20;

/// Splits inbound bytes into commands and frames outbound messages.
///
/// Decoding never fails on content: a bad line yields `Some(Err(..))` and
/// the stream continues with the next line. Only the underlying I/O can
/// end the stream with an error.
#[derive(Debug)]
pub struct AgentCodec {
    /// Where to resume the newline search in the buffer.
    next_index: usize,
    /// Skipping the tail of an oversized line.
    discarding: bool,
    max_length: usize,
}

impl AgentCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            discarding: false,
            max_length,
        }
    }

    fn parse_line(line: &[u8]) -> Option<Result<Command, ProtocolError>> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(_) => return Some(Err(ProtocolError::InvalidUtf8)),
        };
        if text.is_empty() {
            return None;
        }
        Some(parse_command(text))
    }
}

impl Default for AgentCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ── Decoder ──────────────────────────────────────────────────────

impl Decoder for AgentCodec {
    type Item = Result<Command, ProtocolError>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let read_to = src.len().min(self.max_length.saturating_add(1));
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(end + 1);
                    if let Some(item) = Self::parse_line(&line[..end]) {
                        return Ok(Some(item));
                    }
                }
                (false, None) if src.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Err(ProtocolError::LineTooLong {
                        max: self.max_length,
                    })));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        // A final line without a trailing newline still counts.
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            buf.clear();
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        Ok(Self::parse_line(&line))
    }
}

// ── Encoder ──────────────────────────────────────────────────────

impl Encoder<Outbound> for AgentCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(std::io::Error::other)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
