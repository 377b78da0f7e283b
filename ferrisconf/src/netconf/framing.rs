//! NETCONF message framing (RFC 6242).
//!
//! Two framings exist:
//! - end-of-message: each message is terminated by `]]>]]>` (base:1.0)
//! - chunked: `\n#<len>\n<data>` chunks closed by `\n##\n` (base:1.1)
//!
//! [`FrameDecoder`] accepts arbitrary fragments from the transport and
//! hands back whole messages, so reads never need to line up with frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use memchr::memmem;

use crate::error::{NetconfError, Result};

/// End-of-message delimiter used by base:1.0.
pub const EOM_DELIMITER: &[u8] = b"]]>]]>";

/// Largest chunk size allowed by RFC 6242.
const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// Default cap on a single decoded message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Message framing in effect for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `]]>]]>` terminated messages.
    #[default]
    EndOfMessage,
    /// Chunked framing.
    Chunked,
}

/// Encode a message for the wire.
pub fn encode(framing: Framing, message: &str) -> Bytes {
    let body = message.as_bytes();
    match framing {
        Framing::EndOfMessage => {
            let mut out = BytesMut::with_capacity(body.len() + EOM_DELIMITER.len());
            out.put_slice(body);
            out.put_slice(EOM_DELIMITER);
            out.freeze()
        }
        Framing::Chunked => {
            let header = format!("\n#{}\n", body.len());
            let mut out = BytesMut::with_capacity(header.len() + body.len() + 4);
            out.put_slice(header.as_bytes());
            out.put_slice(body);
            out.put_slice(b"\n##\n");
            out.freeze()
        }
    }
}

/// Incremental decoder turning a byte stream into messages.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    framing: Framing,
    /// Chunk payloads gathered for the message in progress.
    partial: BytesMut,
    max_message_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(Framing::default())
    }
}

impl FrameDecoder {
    /// Create a decoder for the given framing.
    pub fn new(framing: Framing) -> Self {
        Self {
            buffer: BytesMut::new(),
            framing,
            partial: BytesMut::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Fail with a framing error once a message grows past `limit` bytes.
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    /// Switch framing, e.g. after the hello exchange.
    ///
    /// Bytes already buffered are kept and decoded with the new framing.
    pub fn set_framing(&mut self, framing: Framing) {
        self.framing = framing;
    }

    /// Current framing.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of bytes buffered and not yet part of a returned message.
    pub fn buffered(&self) -> usize {
        self.buffer.len() + self.partial.len()
    }

    /// Pop the next complete message, if one is buffered.
    pub fn next_message(&mut self) -> Result<Option<String>> {
        match self.framing {
            Framing::EndOfMessage => self.next_eom(),
            Framing::Chunked => self.next_chunked(),
        }
    }

    fn next_eom(&mut self) -> Result<Option<String>> {
        let Some(end) = memmem::find(&self.buffer, EOM_DELIMITER) else {
            // Part of a delimiter may still be in flight.
            if self.buffer.len() > self.max_message_size + EOM_DELIMITER.len() {
                return Err(self.too_large());
            }
            return Ok(None);
        };
        if end > self.max_message_size {
            return Err(self.too_large());
        }
        let message = self.buffer.split_to(end);
        self.buffer.advance(EOM_DELIMITER.len());
        Ok(Some(String::from_utf8_lossy(&message).trim().to_string()))
    }

    fn too_large(&self) -> crate::error::Error {
        framing_error(format!("message exceeds {} bytes", self.max_message_size))
    }

    fn next_chunked(&mut self) -> Result<Option<String>> {
        loop {
            // Every chunk header and the end marker start with "\n#".
            // Leading whitespace between messages is tolerated.
            let skip = self
                .buffer
                .iter()
                .take_while(|b| **b == b'\r' || **b == b' ')
                .count();
            self.buffer.advance(skip);

            if self.buffer.len() < 3 {
                return Ok(None);
            }
            if &self.buffer[..2] != b"\n#" {
                return Err(framing_error("chunk header must start with \"\\n#\""));
            }

            if self.buffer[2] == b'#' {
                if self.buffer.len() < 4 {
                    return Ok(None);
                }
                if self.buffer[3] != b'\n' {
                    return Err(framing_error("malformed end-of-chunks marker"));
                }
                self.buffer.advance(4);
                let message = std::mem::take(&mut self.partial);
                return Ok(Some(String::from_utf8_lossy(&message).trim().to_string()));
            }

            let Some(newline) = memchr::memchr(b'\n', &self.buffer[2..]) else {
                // Size is at most 10 digits; anything longer cannot be valid.
                if self.buffer.len() > 13 {
                    return Err(framing_error("chunk size is too long"));
                }
                return Ok(None);
            };
            let digits = &self.buffer[2..2 + newline];
            let size = parse_chunk_size(digits)?;
            let header_len = 2 + newline + 1;
            if self.partial.len().saturating_add(size) > self.max_message_size {
                return Err(self.too_large());
            }

            if self.buffer.len() < header_len + size {
                return Ok(None);
            }

            self.buffer.advance(header_len);
            let chunk = self.buffer.split_to(size);
            self.partial.extend_from_slice(&chunk);
        }
    }
}

fn parse_chunk_size(digits: &[u8]) -> Result<usize> {
    if digits.is_empty() || digits[0] == b'0' || !digits.iter().all(u8::is_ascii_digit) {
        return Err(framing_error(format!(
            "invalid chunk size '{}'",
            String::from_utf8_lossy(digits)
        )));
    }
    let size: u64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| framing_error("chunk size overflow"))?;
    if size > MAX_CHUNK_SIZE {
        return Err(framing_error(format!("chunk size {size} exceeds maximum")));
    }
    usize::try_from(size).map_err(|_| framing_error("chunk size overflow"))
}

fn framing_error(message: impl Into<String>) -> crate::error::Error {
    NetconfError::Framing {
        message: message.into(),
    }
    .into()
}
