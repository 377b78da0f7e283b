//! NETCONF protocol layer.
//!
//! Framing, message construction and reply decoding, and a session type
//! that runs one RPC at a time over any async byte stream. The device
//! layer runs it over the SSH `netconf` subsystem; tests run it over
//! in-memory pipes.

pub mod framing;
pub mod message;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use framing::{FrameDecoder, Framing};
pub use message::{RpcError, RpcReply, ServerHello, Severity};
pub use session::{Datastore, DefaultOperation, EditOptions, ErrorOption, NetconfSession};
