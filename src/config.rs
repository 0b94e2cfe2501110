//! CLI arguments and gateway configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;
use std::path::PathBuf;
use std::time::Duration;

use crate::build;
use crate::ftp::FtpSettings;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_FTP_USER: &str = "anonymous";
pub const DEFAULT_FTP_PASS: &str = "anonymous";
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the gateway.
#[derive(Parser, Debug)]
#[command(name = "ftp-gate", version = VERSION_INFO, about = "HTTP gateway for an FTP file tree")]
pub struct Args {
    #[arg(
        long,
        env = "FTPGATE_FTP_HOST",
        default_value = "127.0.0.1",
        help = "FTP server host"
    )]
    pub ftp_host: String,
    #[arg(
        long,
        env = "FTPGATE_FTP_PORT",
        default_value_t = DEFAULT_FTP_PORT,
        help = "FTP server port"
    )]
    pub ftp_port: u16,
    #[arg(
        long,
        env = "FTPGATE_FTP_USER",
        default_value = DEFAULT_FTP_USER,
        help = "FTP login user"
    )]
    pub ftp_user: String,
    #[arg(
        long,
        env = "FTPGATE_FTP_PASS",
        default_value = DEFAULT_FTP_PASS,
        help = "FTP login password"
    )]
    pub ftp_pass: String,
    #[arg(
        long,
        env = "FTPGATE_DIAL_TIMEOUT_SECS",
        default_value_t = DEFAULT_DIAL_TIMEOUT_SECS,
        help = "Timeout for establishing the FTP control connection"
    )]
    pub dial_timeout_secs: u64,
    #[arg(
        short = 'b',
        long,
        env = "FTPGATE_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "FTPGATE_HTTP_PORT",
        default_value_t = DEFAULT_HTTP_PORT,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'd',
        long,
        env = "FTPGATE_DOWNLOAD_DIR",
        default_value = DEFAULT_DOWNLOAD_DIR,
        help = "Local directory receiving /download/ files"
    )]
    pub download_dir: String,
    #[arg(
        long,
        env = "FTPGATE_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload request size in bytes"
    )]
    pub upload_max_size: u64,
}

impl Args {
    /// Freezes the parsed arguments into the shared gateway configuration.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            ftp: FtpSettings {
                address: format!("{}:{}", self.ftp_host, self.ftp_port),
                user: self.ftp_user.clone(),
                password: self.ftp_pass.clone(),
                dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            },
            download_dir: PathBuf::from(&self.download_dir),
            upload_max_size: self.upload_max_size,
        }
    }
}

/// Process-wide settings, built once at startup.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub ftp: FtpSettings,
    pub download_dir: PathBuf,
    pub upload_max_size: u64,
}
