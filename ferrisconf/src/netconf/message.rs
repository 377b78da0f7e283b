//! NETCONF message construction and reply decoding.

use std::fmt;

use crate::error::{NetconfError, Result};
use crate::xml::Element;

/// NETCONF base namespace (RFC 6241).
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// base:1.0 capability URI.
pub const CAP_BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// base:1.1 capability URI.
pub const CAP_BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Capabilities advertised by the client.
const CLIENT_CAPABILITIES: &[&str] = &[CAP_BASE_1_0, CAP_BASE_1_1];

/// Build the client `<hello>` document.
pub fn client_hello() -> String {
    let capabilities = Element::new("capabilities").with_children(
        CLIENT_CAPABILITIES
            .iter()
            .map(|cap| Element::leaf("capability", cap)),
    );
    let hello = Element::new("hello")
        .with_attr("xmlns", NETCONF_NS)
        .with_child(capabilities);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>{}"#,
        hello.to_xml()
    )
}

/// Server `<hello>` contents.
#[derive(Debug, Clone, Default)]
pub struct ServerHello {
    /// Session id assigned by the server.
    pub session_id: Option<u32>,
    /// Advertised capability URIs.
    pub capabilities: Vec<String>,
}

impl ServerHello {
    /// Parse a server hello message.
    pub fn parse(message: &str) -> Result<Self> {
        let root = Element::parse(message)?;
        if root.name != "hello" {
            return Err(NetconfError::Hello {
                message: format!("expected <hello>, got <{}>", root.name),
            }
            .into());
        }

        let capabilities: Vec<String> = root
            .find_all("capabilities/capability")
            .into_iter()
            .filter_map(Element::text)
            .map(str::to_string)
            .collect();

        if capabilities.is_empty() {
            return Err(NetconfError::Hello {
                message: "server advertised no capabilities".into(),
            }
            .into());
        }

        let session_id = root.text_at("session-id").and_then(|s| s.parse().ok());

        Ok(Self {
            session_id,
            capabilities,
        })
    }

    /// Whether a capability (matched by prefix, ignoring query parameters)
    /// is advertised.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c.starts_with(capability))
    }
}

/// Wrap an operation in an `<rpc>` envelope.
pub fn rpc(message_id: u64, operation: Element) -> String {
    let envelope = Element::new("rpc")
        .with_attr("xmlns", NETCONF_NS)
        .with_attr("message-id", message_id.to_string())
        .with_child(operation);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>{}"#,
        envelope.to_xml()
    )
}

/// Severity of an rpc-error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// A single `<rpc-error>` from a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcError {
    /// transport, rpc, protocol or application.
    pub error_type: String,
    /// Error tag such as `invalid-value` or `operation-failed`.
    pub tag: String,
    pub severity: Severity,
    /// Human readable message.
    pub message: Option<String>,
    /// Path to the offending element.
    pub path: Option<String>,
    /// Flattened `<error-info>` contents.
    pub info: Option<String>,
}

impl RpcError {
    fn from_element(el: &Element) -> Self {
        let severity = match el.text_at("error-severity") {
            Some("warning") => Severity::Warning,
            _ => Severity::Error,
        };
        let info = el.find("error-info").map(|info| {
            info.children
                .iter()
                .map(|c| format!("{}={}", c.name, c.text().unwrap_or_default()))
                .collect::<Vec<_>>()
                .join(", ")
        });
        Self {
            error_type: el.text_at("error-type").unwrap_or_default().to_string(),
            tag: el.text_at("error-tag").unwrap_or_default().to_string(),
            severity,
            message: el.text_at("error-message").map(str::to_string),
            path: el.text_at("error-path").map(str::to_string),
            info: info.filter(|i| !i.is_empty()),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}", message)?,
            None => write!(f, "{} ({})", self.tag, self.error_type)?,
        }
        if let Some(path) = &self.path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

/// Decoded `<rpc-reply>`.
#[derive(Debug, Clone)]
pub struct RpcReply {
    /// Message id echoed by the server.
    pub message_id: Option<String>,
    /// Whether the reply carried `<ok/>`.
    pub ok: bool,
    /// The whole reply element.
    pub root: Element,
    /// All rpc-errors, including warnings.
    pub errors: Vec<RpcError>,
}

impl RpcReply {
    /// Parse an rpc-reply message.
    pub fn parse(message: &str) -> Result<Self> {
        let root = Element::parse(message)?;
        if root.name != "rpc-reply" {
            return Err(NetconfError::UnexpectedReply {
                message: format!("expected <rpc-reply>, got <{}>", root.name),
            }
            .into());
        }
        let errors = root
            .children_named("rpc-error")
            .map(RpcError::from_element)
            .collect();
        Ok(Self {
            message_id: root.attr("message-id").map(str::to_string),
            ok: root.child("ok").is_some(),
            root,
            errors,
        })
    }

    /// The `<data>` element of a get/get-config reply.
    pub fn data(&self) -> Option<&Element> {
        self.root.child("data")
    }

    /// Errors with severity `error`.
    pub fn fatal_errors(&self) -> impl Iterator<Item = &RpcError> {
        self.errors.iter().filter(|e| e.severity == Severity::Error)
    }

    /// Warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &RpcError> {
        self.errors.iter().filter(|e| e.severity == Severity::Warning)
    }

    /// Turn a reply with fatal errors into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.fatal_errors().next().is_some() {
            let errors = self.errors;
            return Err(NetconfError::Rpc { errors }.into());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
    <capability>urn:ietf:params:netconf:base:1.1</capability>
    <capability>urn:ietf:params:netconf:capability:rollback-on-error:1.0</capability>
    <capability>urn:ietf:params:netconf:capability:candidate:1.0?modules=x</capability>
  </capabilities>
  <session-id>1</session-id>
</hello>"#;

    #[test]
    fn test_client_hello_advertises_both_bases() {
        let hello = client_hello();
        assert!(hello.starts_with("<?xml"));
        assert!(hello.contains(CAP_BASE_1_0));
        assert!(hello.contains(CAP_BASE_1_1));
    }

    #[test]
    fn test_parse_server_hello() {
        let hello = ServerHello::parse(SERVER_HELLO).unwrap();
        assert_eq!(hello.session_id, Some(1));
        assert_eq!(hello.capabilities.len(), 4);
        assert!(hello.has_capability(CAP_BASE_1_1));
        assert!(hello.has_capability("urn:ietf:params:netconf:capability:candidate:1.0"));
    }

    #[test]
    fn test_server_hello_without_capabilities() {
        let xml = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><session-id>3</session-id></hello>"#;
        assert!(ServerHello::parse(xml).is_err());
    }

    #[test]
    fn test_rpc_envelope() {
        let msg = rpc(42, Element::new("get"));
        assert!(msg.contains(r#"message-id="42""#));
        assert!(msg.ends_with("<get/></rpc>"));
    }

    #[test]
    fn test_reply_ok() {
        let reply = RpcReply::parse(
            r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="5"><ok/></rpc-reply>"#,
        )
        .unwrap();
        assert!(reply.ok);
        assert_eq!(reply.message_id.as_deref(), Some("5"));
        assert!(reply.into_result().is_ok());
    }

    #[test]
    fn test_reply_errors_and_warnings() {
        let xml = r#"<rpc-reply message-id="9">
  <rpc-error>
    <error-type>application</error-type>
    <error-tag>invalid-value</error-tag>
    <error-severity>error</error-severity>
    <error-path>/top/VLAN/VLANs/VLANID/ID</error-path>
    <error-message xml:lang="en">The VLAN ID is out of range.</error-message>
    <error-info><Bad-Element>ID</Bad-Element></error-info>
  </rpc-error>
  <rpc-error>
    <error-type>application</error-type>
    <error-tag>operation-failed</error-tag>
    <error-severity>warning</error-severity>
  </rpc-error>
</rpc-reply>"#;
        let reply = RpcReply::parse(xml).unwrap();
        assert_eq!(reply.errors.len(), 2);
        assert_eq!(reply.fatal_errors().count(), 1);
        assert_eq!(reply.warnings().count(), 1);
        let first = &reply.errors[0];
        assert_eq!(first.tag, "invalid-value");
        assert_eq!(first.info.as_deref(), Some("Bad-Element=ID"));
        assert_eq!(
            first.to_string(),
            "The VLAN ID is out of range. at /top/VLAN/VLANs/VLANID/ID"
        );
        assert!(reply.into_result().is_err());
    }

    #[test]
    fn test_warning_only_reply_is_success() {
        let xml = r#"<rpc-reply message-id="1"><rpc-error><error-type>application</error-type><error-tag>x</error-tag><error-severity>warning</error-severity></rpc-error><ok/></rpc-reply>"#;
        let reply = RpcReply::parse(xml).unwrap().into_result().unwrap();
        assert!(reply.ok);
    }

    #[test]
    fn test_reply_data() {
        let xml = r#"<rpc-reply message-id="2"><data><top><Device/></top></data></rpc-reply>"#;
        let reply = RpcReply::parse(xml).unwrap();
        assert!(reply.data().unwrap().find("top/Device").is_some());
    }
}
