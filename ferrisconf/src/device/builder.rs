//! Builder for creating devices.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::Device;
use crate::error::{DeviceError, Result};
use crate::platform::{PlatformDefinition, PlatformRegistry};
use crate::transport::config::{
    AuthMethod, DEFAULT_NETCONF_PORT, HostKeyVerification, SshConfig,
};

/// Builder for constructing devices.
///
/// # Example
///
/// ```rust,no_run
/// use ferrisconf::DeviceBuilder;
///
/// # async fn example() -> Result<(), ferrisconf::Error> {
/// let mut device = DeviceBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .platform("hp_comware")
///     .build()?;
/// device.open().await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    platform_name: Option<String>,
    custom_platform: Option<PlatformDefinition>,
    timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
}

impl DeviceBuilder {
    /// Create a new device builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_NETCONF_PORT,
            username: None,
            auth: AuthMethod::None,
            platform_name: None,
            custom_platform: None,
            timeout: Duration::from_secs(30),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the NETCONF port (default: 830).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the platform name (e.g., "hp_comware", "h3c_comware").
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_name = Some(platform.into());
        self
    }

    /// Set a custom platform definition.
    pub fn custom_platform(mut self, platform: PlatformDefinition) -> Self {
        self.custom_platform = Some(platform);
        self
    }

    /// Set the connection and per-RPC timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Accept any host key. For lab use only.
    pub fn danger_disable_host_key_verification(self) -> Self {
        self.host_key_verification(HostKeyVerification::Disabled)
    }

    /// Build the device.
    ///
    /// This creates the device but does not connect. Call `open()` on the
    /// returned device to establish the session. The platform defaults to
    /// `hp_comware`.
    pub fn build(self) -> Result<Device> {
        let username = self.username.ok_or_else(|| DeviceError::InvalidConfig {
            message: "Username is required".to_string(),
        })?;

        if self.host.trim().is_empty() {
            return Err(DeviceError::InvalidConfig {
                message: "Host is required".to_string(),
            }
            .into());
        }

        let platform = match (self.custom_platform, self.platform_name) {
            (Some(custom), _) => custom,
            (None, Some(name)) => PlatformRegistry::lookup(&name)?,
            (None, None) => PlatformRegistry::lookup(crate::platform::vendors::comware::HP_PLATFORM_NAME)?,
        };

        let ssh_config = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        Ok(Device::new(ssh_config, platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_required() {
        let err = DeviceBuilder::new("10.0.0.1").build().err().unwrap();
        assert!(err.to_string().contains("Username is required"));
    }

    #[test]
    fn test_unknown_platform() {
        let err = DeviceBuilder::new("10.0.0.1")
            .username("admin")
            .platform("juniper")
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown platform"));
    }

    #[test]
    fn test_defaults() {
        let device = DeviceBuilder::new("10.0.0.1")
            .username("admin")
            .password("secret")
            .build()
            .unwrap();
        assert_eq!(device.platform().name, "hp_comware");
        assert_eq!(device.ssh_config().port, 830);
        assert!(!device.is_open());
    }
}
