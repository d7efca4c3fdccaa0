use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::allocator::{AllocatorConfig, Consolidation};
use crate::model::{PackSizes, parse_pack_sizes};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub shipping: ShippingConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            shipping: ShippingConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
    shutdown_timeout: Duration,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

    const HOST_VAR: &'static str = "PACKSHIP_API_HOST";
    const PORT_VAR: &'static str = "PACKSHIP_API_PORT";
    const SHUTDOWN_TIMEOUT_VAR: &'static str = "PACKSHIP_SHUTDOWN_TIMEOUT_SECS";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::HOST_VAR),
            env_string(Self::PORT_VAR),
            env_string(Self::SHUTDOWN_TIMEOUT_VAR),
        )
    }

    fn from_values(host: Option<String>, port: Option<String>, shutdown: Option<String>) -> Self {
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    error = %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        var = Self::PORT_VAR,
                        "port must not be 0, using {}",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        var = Self::PORT_VAR,
                        value = %raw,
                        error = %err,
                        "could not parse port, using {}",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        let shutdown_secs = match shutdown {
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(
                        var = Self::SHUTDOWN_TIMEOUT_VAR,
                        value = %raw,
                        error = %err,
                        "could not parse shutdown timeout, using {}s",
                        Self::DEFAULT_SHUTDOWN_TIMEOUT_SECS
                    );
                    Self::DEFAULT_SHUTDOWN_TIMEOUT_SECS
                }
            },
            None => Self::DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        };

        Self {
            bind_ip,
            display_host,
            port,
            shutdown_timeout: Duration::from_secs(shutdown_secs),
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// How long in-flight requests may run after a shutdown signal.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for shipment computation.
#[derive(Clone, Debug, Default)]
pub struct ShippingConfig {
    default_pack_sizes: Option<PackSizes>,
    allocator: AllocatorConfig,
}

impl ShippingConfig {
    const DEFAULT_PACK_SIZES_VAR: &'static str = "PACKSHIP_DEFAULT_PACK_SIZES";
    const CONSOLIDATION_VAR: &'static str = "PACKSHIP_CONSOLIDATION";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::DEFAULT_PACK_SIZES_VAR),
            env_string(Self::CONSOLIDATION_VAR),
        )
    }

    fn from_values(pack_sizes: Option<String>, consolidation: Option<String>) -> Self {
        let default_pack_sizes = pack_sizes.and_then(|raw| match parse_pack_sizes(&raw) {
            Ok(sizes) => Some(sizes),
            Err(err) => {
                tracing::warn!(
                    var = Self::DEFAULT_PACK_SIZES_VAR,
                    value = %raw,
                    error = %err,
                    "ignoring default pack sizes"
                );
                None
            }
        });

        let mode = consolidation
            .and_then(|raw| match raw.parse::<Consolidation>() {
                Ok(mode) => Some(mode),
                Err(err) => {
                    tracing::warn!(
                        var = Self::CONSOLIDATION_VAR,
                        error = %err,
                        "using {}",
                        AllocatorConfig::DEFAULT_CONSOLIDATION
                    );
                    None
                }
            })
            .unwrap_or(AllocatorConfig::DEFAULT_CONSOLIDATION);

        Self {
            default_pack_sizes,
            allocator: AllocatorConfig::builder().consolidation(mode).build(),
        }
    }

    /// Creates a shipping configuration from already validated values.
    pub fn new(default_pack_sizes: Option<PackSizes>, allocator: AllocatorConfig) -> Self {
        Self {
            default_pack_sizes,
            allocator,
        }
    }

    /// Pack sizes used when a request does not name any.
    pub fn default_pack_sizes(&self) -> Option<&PackSizes> {
        self.default_pack_sizes.as_ref()
    }

    /// Returns the configured allocator settings.
    pub fn allocator_config(&self) -> AllocatorConfig {
        self.allocator
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(var = name, error = %err, "environment access failed, using default value");
            None
        }
    }
}
