//! NETCONF session over an established byte stream.

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::framing::{FrameDecoder, Framing, encode};
use super::message::{self, CAP_BASE_1_1, NETCONF_NS, RpcReply, ServerHello};
use crate::error::{NetconfError, Result, TransportError};
use crate::xml::Element;

const READ_CHUNK: usize = 16 * 1024;

/// Configuration datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datastore {
    Running,
    Candidate,
    Startup,
}

impl Datastore {
    fn element(self) -> Element {
        Element::new(match self {
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Startup => "startup",
        })
    }
}

/// `<default-operation>` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOperation {
    Merge,
    Replace,
    None,
}

/// `<error-option>` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOption {
    StopOnError,
    ContinueOnError,
    RollbackOnError,
}

/// Options for `<edit-config>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditOptions {
    pub default_operation: Option<DefaultOperation>,
    pub error_option: Option<ErrorOption>,
}

/// A NETCONF session.
///
/// Owns the stream; every call sends one request and waits for its reply,
/// so replies always match the request in flight.
pub struct NetconfSession<S> {
    stream: S,
    decoder: FrameDecoder,
    hello: ServerHello,
    next_message_id: u64,
    timeout: Duration,
}

impl<S> NetconfSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Exchange hello messages and return a ready session.
    ///
    /// Chunked framing is used when the server also advertises base:1.1.
    pub async fn establish(stream: S, timeout: Duration) -> Result<Self> {
        let mut session = Self {
            stream,
            decoder: FrameDecoder::new(Framing::EndOfMessage),
            hello: ServerHello::default(),
            next_message_id: 1,
            timeout,
        };

        session.send(&message::client_hello()).await?;
        let reply = session.recv().await?;
        session.hello = ServerHello::parse(&reply)?;

        if session.hello.has_capability(CAP_BASE_1_1) {
            session.decoder.set_framing(Framing::Chunked);
        }

        debug!(
            "netconf session {:?} established ({:?} framing, {} capabilities)",
            session.hello.session_id,
            session.decoder.framing(),
            session.hello.capabilities.len()
        );

        Ok(session)
    }

    /// Session id assigned by the server.
    pub fn session_id(&self) -> Option<u32> {
        self.hello.session_id
    }

    /// Capabilities advertised by the server.
    pub fn capabilities(&self) -> &[String] {
        &self.hello.capabilities
    }

    /// Whether the server advertised a capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.hello.has_capability(capability)
    }

    /// Framing in use.
    pub fn framing(&self) -> Framing {
        self.decoder.framing()
    }

    /// Set the per-RPC timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn send(&mut self, msg: &str) -> Result<()> {
        trace!(">>> {}", msg);
        let wire = encode(self.decoder.framing(), msg);
        self.stream
            .write_all(&wire)
            .await
            .map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.read_message())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    async fn read_message(&mut self) -> Result<String> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(msg) = self.decoder.next_message()? {
                trace!("<<< {}", msg);
                return Ok(msg);
            }
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Err(TransportError::Disconnected.into());
            }
            self.decoder.extend(&chunk[..n]);
        }
    }

    /// Send an operation and wait for its reply.
    ///
    /// Replies carrying an rpc-error of severity `error` are returned as
    /// [`NetconfError::Rpc`]; warnings are logged and the reply returned.
    pub async fn rpc(&mut self, operation: Element) -> Result<RpcReply> {
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        debug!("rpc {} <{}>", message_id, operation.name);
        self.send(&message::rpc(message_id, operation)).await?;

        let reply = RpcReply::parse(&self.recv().await?)?;
        if let Some(got) = reply.message_id.as_deref() {
            if got != message_id.to_string() {
                return Err(NetconfError::MessageIdMismatch {
                    expected: message_id,
                    got: got.to_string(),
                }
                .into());
            }
        }

        for warning in reply.warnings() {
            warn!("rpc {} warning: {}", message_id, warning);
        }

        reply.into_result()
    }

    /// `<get>` with an optional subtree filter; returns the `<data>` element.
    pub async fn get(&mut self, filter: Option<Element>) -> Result<Element> {
        let mut op = Element::new("get");
        if let Some(filter) = filter {
            op.push(subtree_filter(filter));
        }
        let reply = self.rpc(op).await?;
        data_of(reply)
    }

    /// `<get-config>` from a datastore; returns the `<data>` element.
    pub async fn get_config(
        &mut self,
        source: Datastore,
        filter: Option<Element>,
    ) -> Result<Element> {
        let mut op =
            Element::new("get-config").with_child(Element::new("source").with_child(source.element()));
        if let Some(filter) = filter {
            op.push(subtree_filter(filter));
        }
        let reply = self.rpc(op).await?;
        data_of(reply)
    }

    /// `<edit-config>` with `config` as the body of `<config>`.
    pub async fn edit_config(
        &mut self,
        target: Datastore,
        config: Element,
        options: EditOptions,
    ) -> Result<RpcReply> {
        self.rpc(edit_config_op(target, config, options)).await
    }

    /// Run display commands through the Comware `CLI` RPC and return the
    /// raw output.
    pub async fn cli_execution(&mut self, commands: &str) -> Result<String> {
        self.cli("Execution", commands).await
    }

    /// Run configuration commands through the Comware `CLI` RPC and return
    /// the raw output.
    pub async fn cli_configuration(&mut self, commands: &str) -> Result<String> {
        self.cli("Configuration", commands).await
    }

    async fn cli(&mut self, mode: &str, commands: &str) -> Result<String> {
        let op = Element::new("CLI").with_child(Element::leaf(mode, commands));
        let reply = self.rpc(op).await?;
        Ok(reply
            .root
            .find(&format!("CLI/{mode}"))
            .and_then(|el| el.text.clone())
            .unwrap_or_default())
    }

    /// Run a Comware `<action>`; `top` is the namespaced body.
    pub async fn action(&mut self, top: Element) -> Result<RpcReply> {
        self.rpc(Element::new("action").with_child(top)).await
    }

    /// Save the running configuration, to `file` or the default startup file.
    pub async fn save(&mut self, file: Option<&str>) -> Result<RpcReply> {
        let mut op = Element::new("save").with_attr("OverWrite", "true");
        if let Some(file) = file {
            op.push(Element::leaf("file", file));
        }
        self.rpc(op).await
    }

    /// Roll the running configuration back to a saved file.
    pub async fn rollback(&mut self, file: &str) -> Result<RpcReply> {
        self.rpc(Element::new("rollback").with_child(Element::leaf("file", file)))
            .await
    }

    /// `<lock>` a datastore.
    pub async fn lock(&mut self, target: Datastore) -> Result<RpcReply> {
        self.rpc(Element::new("lock").with_child(Element::new("target").with_child(target.element())))
            .await
    }

    /// `<unlock>` a datastore.
    pub async fn unlock(&mut self, target: Datastore) -> Result<RpcReply> {
        self.rpc(
            Element::new("unlock").with_child(Element::new("target").with_child(target.element())),
        )
        .await
    }

    /// `<close-session>` and shut the write side of the stream.
    pub async fn close_session(&mut self) -> Result<()> {
        self.rpc(Element::new("close-session")).await?;
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

fn subtree_filter(filter: Element) -> Element {
    Element::new("filter")
        .with_attr("type", "subtree")
        .with_child(filter)
}

fn data_of(reply: RpcReply) -> Result<Element> {
    reply
        .root
        .children
        .into_iter()
        .find(|c| c.name == "data")
        .ok_or_else(|| {
            NetconfError::UnexpectedReply {
                message: "reply has no <data> element".into(),
            }
            .into()
        })
}

/// Build an `<edit-config>` operation.
pub(crate) fn edit_config_op(target: Datastore, config: Element, options: EditOptions) -> Element {
    let mut op =
        Element::new("edit-config").with_child(Element::new("target").with_child(target.element()));
    if let Some(default_operation) = options.default_operation {
        op.push(Element::leaf(
            "default-operation",
            match default_operation {
                DefaultOperation::Merge => "merge",
                DefaultOperation::Replace => "replace",
                DefaultOperation::None => "none",
            },
        ));
    }
    if let Some(error_option) = options.error_option {
        op.push(Element::leaf(
            "error-option",
            match error_option {
                ErrorOption::StopOnError => "stop-on-error",
                ErrorOption::ContinueOnError => "continue-on-error",
                ErrorOption::RollbackOnError => "rollback-on-error",
            },
        ));
    }
    op.with_child(
        Element::new("config")
            .with_attr("xmlns:xc", NETCONF_NS)
            .with_child(config),
    )
}
