//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_AUTH_USER: &str = "admin";
pub const DEFAULT_AUTH_PASS: &str = "admin";
pub const AUTH_REALM: &str = "AxoReel";
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 20 * 1024 * 1024 * 1024;
pub const DEFAULT_UPLOAD_TEMP_TTL_SECS: u64 = 24 * 60 * 60;
pub const UPLOAD_CLEAN_INTERVAL_SECS: u64 = 900;
/// Read buffer size for media streaming; bounds per-response memory.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;
/// Fallback basename when sanitization leaves nothing usable.
pub const FALLBACK_NAME: &str = "video";

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "axo-reel", version = VERSION_INFO, about = "AxoReel media server")]
pub struct Args {
    #[arg(
        short = 'd',
        long,
        env = "VIDEO_DIR",
        default_value = "videos",
        help = "Directory where media files are stored"
    )]
    pub video_dir: String,
    #[arg(
        long,
        env = "AUTH_USER",
        default_value = DEFAULT_AUTH_USER,
        help = "Basic auth username"
    )]
    pub auth_user: String,
    #[arg(
        long,
        env = "AUTH_PASS",
        default_value = DEFAULT_AUTH_PASS,
        help = "Basic auth password"
    )]
    pub auth_pass: String,
    #[arg(
        short = 'b',
        long,
        env = "BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = 3000,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(long, env = "CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(
        long,
        env = "UPLOAD_TEMP_TTL_SECS",
        default_value_t = DEFAULT_UPLOAD_TEMP_TTL_SECS,
        help = "Age after which abandoned upload temp files are removed (0 to disable)"
    )]
    pub upload_temp_ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "axo-reel",
            "--port",
            "8080",
            "--video-dir",
            "/srv/media",
            "--auth-user",
            "alice",
        ])
        .expect("parse flags");
        assert_eq!(args.port, 8080);
        assert_eq!(args.video_dir, "/srv/media");
        assert_eq!(args.auth_user, "alice");
    }
}
