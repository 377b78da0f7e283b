//! In-memory NETCONF server for tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use super::framing::{FrameDecoder, Framing, encode};
use super::message::{CAP_BASE_1_0, CAP_BASE_1_1, NETCONF_NS};
use crate::xml::Element;

/// Body of a successful reply without data.
pub(crate) fn ok_reply() -> String {
    "<ok/>".to_string()
}

/// Answers each rpc with the body returned by a handler.
pub(crate) struct FakeServer {
    chunked: bool,
}

impl FakeServer {
    pub(crate) fn new(chunked: bool) -> Self {
        Self { chunked }
    }

    fn hello(&self) -> String {
        let mut caps = format!("<capability>{CAP_BASE_1_0}</capability>");
        if self.chunked {
            caps.push_str(&format!("<capability>{CAP_BASE_1_1}</capability>"));
        }
        format!(
            r#"<hello xmlns="{NETCONF_NS}"><capabilities>{caps}</capabilities><session-id>7</session-id></hello>"#
        )
    }

    /// Serve until the client closes the session or the stream ends.
    ///
    /// The task resolves to the names of the operations it received.
    pub(crate) fn spawn<F>(self, mut stream: DuplexStream, mut handler: F) -> JoinHandle<Vec<String>>
    where
        F: FnMut(&Element) -> String + Send + 'static,
    {
        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new(Framing::EndOfMessage);
            let mut framing = Framing::EndOfMessage;
            let mut seen = Vec::new();
            let mut buf = vec![0u8; 8192];
            let mut greeted = false;

            loop {
                let msg = match decoder.next_message() {
                    Ok(Some(msg)) => msg,
                    Ok(None) => {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return seen,
                            Ok(n) => decoder.extend(&buf[..n]),
                        }
                        continue;
                    }
                    Err(_) => return seen,
                };

                if !greeted {
                    greeted = true;
                    let hello = self.hello();
                    if stream.write_all(&encode(framing, &hello)).await.is_err() {
                        return seen;
                    }
                    if self.chunked {
                        framing = Framing::Chunked;
                        decoder.set_framing(framing);
                    }
                    continue;
                }

                let Ok(rpc) = Element::parse(&msg) else {
                    return seen;
                };
                let id = rpc.attr("message-id").unwrap_or_default().to_string();
                let Some(op) = rpc.children.first() else {
                    return seen;
                };
                seen.push(op.name.clone());

                let body = if op.name == "close-session" {
                    ok_reply()
                } else {
                    handler(op)
                };
                let reply = format!(
                    r#"<rpc-reply xmlns="{NETCONF_NS}" message-id="{id}">{body}</rpc-reply>"#
                );
                if stream.write_all(&encode(framing, &reply)).await.is_err() {
                    return seen;
                }
                if op.name == "close-session" {
                    return seen;
                }
            }
        })
    }
}
