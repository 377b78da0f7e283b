//! Error types for ferrisconf.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::netconf::RpcError;

/// Main error type for ferrisconf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// NETCONF protocol errors
    #[error("NETCONF error: {0}")]
    Netconf(#[from] NetconfError),

    /// Device-level errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Feature parameter validation errors
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts (strict verification)
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The server refused the netconf subsystem
    #[error("Subsystem '{0}' request failed")]
    SubsystemRequestFailed(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// NETCONF protocol errors (framing, XML, rpc-error replies).
#[derive(Error, Debug)]
pub enum NetconfError {
    /// The byte stream violated the framing rules
    #[error("Framing error: {message}")]
    Framing { message: String },

    /// A message was not well-formed XML
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// The server hello was missing or unusable
    #[error("Hello exchange failed: {message}")]
    Hello { message: String },

    /// The reply did not carry the message-id of the request
    #[error("Reply message-id mismatch: expected {expected}, got '{got}'")]
    MessageIdMismatch { expected: u64, got: String },

    /// The reply was well-formed but not what the operation expected
    #[error("Unexpected reply: {message}")]
    UnexpectedReply { message: String },

    /// The device answered with one or more rpc-errors
    #[error("RPC failed: {}", RpcErrors(.errors))]
    Rpc { errors: Vec<RpcError> },
}

/// Device layer errors (connection state, staged execution, lookups).
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Device not connected
    #[error("Device not connected - call open() first")]
    NotConnected,

    /// Device already connected
    #[error("Device already connected")]
    AlreadyConnected,

    /// Invalid configuration in the device builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A CLI command produced output matching a failure pattern
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// A staged operation failed; later operations were discarded
    #[error("Staged operation {index} ({kind}) failed: {source}")]
    StagedFailed {
        index: usize,
        kind: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Interface name could not be resolved to an IfIndex
    #[error("Interface '{name}' does not exist on the device")]
    InterfaceNotFound { name: String },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },

    /// Platform name is not registered
    #[error("Unknown platform '{name}'")]
    UnknownPlatform { name: String },

    /// Platform name is already registered
    #[error("Platform '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

/// Feature parameter validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// A numeric parameter is outside its allowed range
    #[error("'{param}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        param: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// A required parameter is missing
    #[error("'{param}' is required")]
    Required { param: &'static str },

    /// Parameters that must be supplied together
    #[error("{} must be supplied together", .params.join(", "))]
    RequiredTogether { params: Vec<&'static str> },

    /// Parameters that cannot be combined
    #[error("'{first}' cannot be used with '{second}'")]
    MutuallyExclusive {
        first: &'static str,
        second: &'static str,
    },

    /// A parameter has a value of the wrong shape
    #[error("invalid '{param}': {message}")]
    Invalid {
        param: &'static str,
        message: String,
    },
}

impl ParamError {
    pub(crate) fn invalid(param: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            param,
            message: message.into(),
        }
    }
}

struct RpcErrors<'a>(&'a [RpcError]);

impl fmt::Display for RpcErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Result type alias using ferrisconf's Error.
pub type Result<T> = std::result::Result<T, Error>;
