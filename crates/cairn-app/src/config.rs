//! Flags and environment variables accepted by the `cairn` binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use cairn_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha};
use cairn_tracker::DEFAULT_MERKLE_TREE_HASH;
use clap::Parser;

use crate::error::{AppError, AppResult};

/// Default API listener port.
pub const DEFAULT_PORT: u16 = 50051;
/// Default Kubo RPC address.
pub const DEFAULT_GATEWAY: &str = "localhost:5001";

/// Runtime configuration resolved from flags, then environment, then defaults.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cairn",
    about = "Poll-based coordinator for content-store uploads, fetches and merkle root hashes"
)]
pub struct AppConfig {
    /// Port the HTTP API listens on.
    #[arg(short = 'p', long, env = "CAIRN_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Kubo RPC address (`host:port` or URL).
    #[arg(short = 'g', long, env = "CAIRN_GATEWAY", default_value = DEFAULT_GATEWAY)]
    pub gateway: String,
    /// Address the HTTP API binds to.
    #[arg(long, env = "CAIRN_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Path of the merkle tree hash executable.
    #[arg(long, env = "CAIRN_MERKLE_TREE_HASH", default_value = DEFAULT_MERKLE_TREE_HASH)]
    pub merkle_tree_hash: PathBuf,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "CAIRN_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
    /// Log output format (`json` or `pretty`); inferred from the build when omitted.
    #[arg(long, env = "CAIRN_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl AppConfig {
    /// Validated listener address.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidConfig`] when the port is zero or the gateway is blank.
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        if self.port == 0 {
            return Err(AppError::InvalidConfig {
                field: "port",
                reason: "zero",
                value: Some(self.port.to_string()),
            });
        }
        if self.gateway.trim().is_empty() {
            return Err(AppError::InvalidConfig {
                field: "gateway",
                reason: "empty",
                value: None,
            });
        }
        Ok(SocketAddr::new(self.bind, self.port))
    }

    /// Logging settings derived from the configuration.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            level: &self.log_level,
            format: self.log_format.unwrap_or_else(LogFormat::infer),
            build_sha: option_env!("CAIRN_BUILD_SHA").unwrap_or_else(build_sha),
        }
    }
}
