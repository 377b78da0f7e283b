//! High-level device handle.
//!
//! A [`Device`] owns one NETCONF session to a switch. Reads go straight to
//! the device; writes are described as [`StagedOp`]s that are either run at
//! once with [`Device::execute`] or queued with [`Device::stage`] and run
//! as a batch with [`Device::execute_staged`].

mod builder;
mod response;
mod stage;

pub use builder::DeviceBuilder;
pub use response::CliResponse;
pub use stage::{OpOutcome, Stage, StagedOp};

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{DeviceError, Error, Result};
use crate::netconf::{Datastore, EditOptions, ErrorOption, NetconfSession};
use crate::platform::{DefaultBehavior, PlatformDefinition, VendorBehavior};
use crate::transport::{SshConfig, SshTransport};
use crate::xml::Element;

/// Byte stream a session can run over.
pub trait NetconfStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> NetconfStream for T {}

/// Session stream type used by [`Device`].
pub type BoxedStream = Box<dyn NetconfStream>;

/// A Comware switch reachable over NETCONF.
pub struct Device {
    /// SSH configuration.
    ssh_config: SshConfig,

    /// Platform definition.
    platform: PlatformDefinition,

    /// Vendor behavior implementation.
    behavior: Arc<dyn VendorBehavior>,

    /// SSH transport (None when disconnected or attached to a raw stream).
    transport: Option<SshTransport>,

    /// NETCONF session (None when disconnected).
    session: Option<NetconfSession<BoxedStream>>,

    /// Ops waiting for `execute_staged()`.
    stage: Stage,
}

impl Device {
    /// Create a new device. Call `open()` to connect.
    pub fn new(ssh_config: SshConfig, platform: PlatformDefinition) -> Self {
        let behavior = platform
            .behavior
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultBehavior));

        Self {
            ssh_config,
            platform,
            behavior,
            transport: None,
            session: None,
            stage: Stage::default(),
        }
    }

    /// Connect over SSH and establish the NETCONF session.
    pub async fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(DeviceError::AlreadyConnected.into());
        }

        let transport = SshTransport::connect(&self.ssh_config).await?;
        let stream = transport.open_netconf().await?;
        let session =
            NetconfSession::establish(Box::new(stream) as BoxedStream, self.ssh_config.timeout)
                .await?;

        debug!(
            "opened {} ({}) session {:?}",
            self.ssh_config.socket_addr(),
            self.platform.name,
            session.session_id()
        );

        self.transport = Some(transport);
        self.session = Some(session);
        Ok(())
    }

    /// Establish the NETCONF session over an already connected stream.
    pub async fn attach<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if self.session.is_some() {
            return Err(DeviceError::AlreadyConnected.into());
        }
        let session =
            NetconfSession::establish(Box::new(stream) as BoxedStream, self.ssh_config.timeout)
                .await?;
        self.session = Some(session);
        Ok(())
    }

    /// Close the session and the connection.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close_session().await {
                warn!("close-session failed: {}", e);
            }
        }
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }

    /// Check if a session is established.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Check if the session is established and the SSH connection is up.
    pub fn is_alive(&self) -> bool {
        self.session.is_some() && self.transport.as_ref().is_none_or(SshTransport::is_alive)
    }

    /// Get a reference to the platform definition.
    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    /// Get the SSH configuration.
    pub fn ssh_config(&self) -> &SshConfig {
        &self.ssh_config
    }

    /// Set the per-RPC timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.ssh_config.timeout = timeout;
        if let Some(session) = self.session.as_mut() {
            session.set_timeout(timeout);
        }
    }

    /// Direct access to the NETCONF session.
    pub fn session_mut(&mut self) -> Result<&mut NetconfSession<BoxedStream>> {
        self.session
            .as_mut()
            .ok_or_else(|| DeviceError::NotConnected.into())
    }

    /// `<get>` the state under one `<top>` child; returns the reply's `<top>`.
    ///
    /// A reply with no matching data yields an empty `<top>`.
    pub async fn get(&mut self, filter: Element) -> Result<Element> {
        self.get_many(vec![filter]).await
    }

    /// `<get>` with several `<top>` children in one filter.
    pub async fn get_many(&mut self, filters: Vec<Element>) -> Result<Element> {
        let top = self.platform.data_top(filters);
        let data = self.session_mut()?.get(Some(top)).await?;
        Ok(take_top(data))
    }

    /// `<get-config>` from running under one `<top>` child.
    pub async fn get_config(&mut self, filter: Element) -> Result<Element> {
        let top = self.platform.data_top([filter]);
        let data = self
            .session_mut()?
            .get_config(Datastore::Running, Some(top))
            .await?;
        Ok(take_top(data))
    }

    /// Run display commands. Output matching a failure pattern is flagged on
    /// the response rather than returned as an error.
    pub async fn cli_display(&mut self, commands: &[String]) -> Result<CliResponse> {
        self.run_cli(commands, false).await
    }

    /// Run configuration commands in system view.
    ///
    /// Output matching a failure pattern is an error.
    pub async fn cli_config(&mut self, commands: &[String]) -> Result<CliResponse> {
        let response = self.run_cli(commands, true).await?;
        if let Some(message) = response.failure_message.clone() {
            return Err(DeviceError::CommandFailed {
                command: response.command,
                message,
            }
            .into());
        }
        Ok(response)
    }

    async fn run_cli(&mut self, commands: &[String], configure: bool) -> Result<CliResponse> {
        let joined = commands.join("\n");
        let start = Instant::now();

        let session = self.session_mut()?;
        let raw = if configure {
            session.cli_configuration(&joined).await?
        } else {
            session.cli_execution(&joined).await?
        };

        let result = self.behavior.normalize_output(&raw);
        let failure = self.behavior.detect_failure(&raw).or_else(|| {
            self.platform
                .failed_when_contains
                .iter()
                .find(|p| raw.contains(p.as_str()))
                .cloned()
        });

        let response = CliResponse::new(joined, result, raw, start.elapsed());
        Ok(match failure {
            Some(message) => response.with_failure(message),
            None => response,
        })
    }

    /// Queue an op for `execute_staged()`.
    pub fn stage(&mut self, op: StagedOp) {
        debug!("staging {}", op.kind());
        self.stage.push(op);
    }

    /// Queued ops, oldest first.
    pub fn staged(&self) -> &[StagedOp] {
        self.stage.ops()
    }

    /// Drop every queued op.
    pub fn clear_staged(&mut self) {
        self.stage.clear();
    }

    /// Run one op now.
    pub async fn execute(&mut self, op: StagedOp) -> Result<OpOutcome> {
        match op {
            StagedOp::EditConfig(elements) => {
                let top = self.platform.config_top(elements);
                let options = EditOptions {
                    default_operation: None,
                    error_option: Some(ErrorOption::StopOnError),
                };
                self.session_mut()?
                    .edit_config(Datastore::Running, top, options)
                    .await?;
                Ok(OpOutcome::Ok)
            }
            StagedOp::CliConfig(commands) => self.cli_config(&commands).await.map(OpOutcome::Cli),
            StagedOp::CliDisplay(commands) => {
                self.cli_display(&commands).await.map(OpOutcome::Cli)
            }
            StagedOp::Action(elements) => {
                let top = self.platform.action_top(elements);
                self.session_mut()?.action(top).await?;
                Ok(OpOutcome::Ok)
            }
            StagedOp::Save(file) => {
                let file = file.or_else(|| self.platform.default_save_file.clone());
                self.session_mut()?.save(file.as_deref()).await?;
                Ok(OpOutcome::Ok)
            }
            StagedOp::Rollback(file) => {
                self.session_mut()?.rollback(&file).await?;
                Ok(OpOutcome::Ok)
            }
        }
    }

    /// Run every queued op in order.
    ///
    /// Stops at the first failure. The queue is emptied either way; ops
    /// after the failing one are discarded.
    pub async fn execute_staged(&mut self) -> Result<Vec<OpOutcome>> {
        let ops = self.stage.take();
        let mut outcomes = Vec::with_capacity(ops.len());

        for (index, op) in ops.into_iter().enumerate() {
            let kind = op.kind();
            debug!("executing staged op {} ({})", index, kind);
            match self.execute(op).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    return Err(DeviceError::StagedFailed {
                        index,
                        kind,
                        source: Box::new(e),
                    }
                    .into());
                }
            }
        }

        Ok(outcomes)
    }

    /// Save the running configuration.
    pub async fn save(&mut self, file: Option<&str>) -> Result<()> {
        self.execute(StagedOp::Save(file.map(str::to_string)))
            .await
            .map(|_| ())
    }

    /// Roll the running configuration back to a saved file.
    pub async fn rollback(&mut self, file: &str) -> Result<()> {
        self.execute(StagedOp::Rollback(file.to_string()))
            .await
            .map(|_| ())
    }

    /// Resolve an interface name to its IfIndex.
    pub async fn interface_index(&mut self, name: &str) -> Result<u32> {
        let filter = Element::new("Ifmgr").with_child(
            Element::new("Interfaces").with_child(
                Element::new("Interface")
                    .with_child(Element::new("IfIndex"))
                    .with_child(Element::leaf("Name", name)),
            ),
        );
        let top = self.get(filter).await?;
        top.find_all("Ifmgr/Interfaces/Interface")
            .into_iter()
            .filter(|i| {
                i.text_at("Name")
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .find_map(|i| i.text_at("IfIndex").and_then(|s| s.parse().ok()))
            .ok_or_else(|| {
                Error::from(DeviceError::InterfaceNotFound {
                    name: name.to_string(),
                })
            })
    }
}

fn take_top(data: Element) -> Element {
    data.children
        .into_iter()
        .find(|c| c.name == "top")
        .unwrap_or_else(|| Element::new("top"))
}

impl Drop for Device {
    fn drop(&mut self) {
        if !self.stage.is_empty() {
            warn!(
                "Device dropped with {} staged operations that were never executed",
                self.stage.len()
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::netconf::testing::{FakeServer, ok_reply};
    use crate::platform::vendors::comware;

    /// Device attached to a fake server driven by `handler`.
    pub(crate) async fn fake_device<F>(
        handler: F,
    ) -> (Device, tokio::task::JoinHandle<Vec<String>>)
    where
        F: FnMut(&Element) -> String + Send + 'static,
    {
        let (client, server) = tokio::io::duplex(256 * 1024);
        let handle = FakeServer::new(true).spawn(server, handler);
        let mut device = Device::new(SshConfig::new("switch", "admin"), comware::hp());
        device.attach(client).await.unwrap();
        (device, handle)
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut device = Device::new(SshConfig::new("switch", "admin"), comware::hp());
        let err = device.get(Element::new("VLAN")).await.unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::NotConnected)));
    }

    #[tokio::test]
    async fn test_get_wraps_filter_in_namespaced_top() {
        let (mut device, _server) = fake_device(|op| {
            let top = op.find("filter/top").unwrap();
            assert_eq!(top.attr("xmlns"), Some("http://www.hp.com/netconf/data:1.0"));
            "<data><top><VLAN><VLANs/></VLAN></top></data>".to_string()
        })
        .await;
        let top = device.get(Element::new("VLAN")).await.unwrap();
        assert!(top.find("VLAN/VLANs").is_some());
    }

    #[tokio::test]
    async fn test_get_with_empty_data() {
        let (mut device, _server) = fake_device(|_| "<data/>".to_string()).await;
        let top = device.get(Element::new("VLAN")).await.unwrap();
        assert_eq!(top.name, "top");
        assert!(top.children.is_empty());
    }

    #[tokio::test]
    async fn test_execute_staged_runs_in_order() {
        let (mut device, server) = fake_device(|op| match op.name.as_str() {
            "CLI" => "<CLI><Configuration>[HPE]vlan 10\n[HPE-vlan10]</Configuration></CLI>"
                .to_string(),
            _ => ok_reply(),
        })
        .await;

        device.stage(StagedOp::EditConfig(vec![Element::new("VLAN")]));
        device.stage(StagedOp::CliConfig(vec!["vlan 10".into()]));
        device.stage(StagedOp::Save(None));
        assert_eq!(device.staged().len(), 3);

        let outcomes = device.execute_staged().await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(device.staged().is_empty());
        assert!(matches!(&outcomes[1], OpOutcome::Cli(r) if r.is_success()));

        device.close().await.unwrap();
        let seen = server.await.unwrap();
        assert_eq!(seen, vec!["edit-config", "CLI", "save", "close-session"]);
    }

    #[tokio::test]
    async fn test_execute_staged_stops_on_first_error() {
        let (mut device, server) = fake_device(|op| match op.name.as_str() {
            "CLI" => "<CLI><Configuration>[HPE]vlan 5000\n % Wrong parameter found at '^' position.</Configuration></CLI>"
                .to_string(),
            _ => ok_reply(),
        })
        .await;

        device.stage(StagedOp::EditConfig(vec![Element::new("VLAN")]));
        device.stage(StagedOp::CliConfig(vec!["vlan 5000".into()]));
        device.stage(StagedOp::Save(None));

        let err = device.execute_staged().await.unwrap_err();
        match err {
            Error::Device(DeviceError::StagedFailed { index, kind, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(kind, "cli_config");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(device.staged().is_empty());

        device.close().await.unwrap();
        let seen = server.await.unwrap();
        assert_eq!(seen, vec!["edit-config", "CLI", "close-session"]);
    }

    #[tokio::test]
    async fn test_save_uses_platform_default() {
        let (mut device, _server) = fake_device(|op| {
            assert_eq!(op.text_at("file"), Some("flash:/startup.cfg"));
            ok_reply()
        })
        .await;
        device.save(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_cli_display_flags_failure() {
        let (mut device, _server) = fake_device(|_| {
            "<CLI><Execution>&lt;HPE&gt;display bogus\n % Unrecognized command found at '^' position.</Execution></CLI>"
                .to_string()
        })
        .await;
        let response = device
            .cli_display(&["display bogus".to_string()])
            .await
            .unwrap();
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_interface_index() {
        let (mut device, _server) = fake_device(|op| {
            let name = op
                .text_at("filter/top/Ifmgr/Interfaces/Interface/Name")
                .unwrap_or_default()
                .to_string();
            if name == "GigabitEthernet1/0/1" {
                format!(
                    "<data><top><Ifmgr><Interfaces><Interface><IfIndex>3</IfIndex><Name>{name}</Name></Interface></Interfaces></Ifmgr></top></data>"
                )
            } else {
                "<data/>".to_string()
            }
        })
        .await;

        assert_eq!(
            device.interface_index("GigabitEthernet1/0/1").await.unwrap(),
            3
        );
        let err = device.interface_index("GigabitEthernet9/0/9").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::InterfaceNotFound { .. })
        ));
    }
}
