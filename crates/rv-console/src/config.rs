use crate::command_link::{LinkConfig, ReconnectPolicy};
use crate::error::ConfigError;
use crate::poller::{DEFAULT_HTTP_TIMEOUT, DEFAULT_POLL_INTERVAL};
use clap::Parser;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_LINK_URL: &str = "ws://127.0.0.1:8000/api/v1/ws/command-link";
pub const DEFAULT_OPERATOR: &str = "Field-Unit-01";
pub const DEFAULT_LOG_DIR: &str = ".rv/logs";

#[derive(Parser, Debug)]
#[command(name = "rv-console")]
pub struct Args {
    /// Base url of the monitoring api.
    #[arg(long, default_value = "")]
    pub api_url: String,
    /// Command link websocket endpoint.
    #[arg(long, default_value = "")]
    pub link_url: String,
    /// Name attached to submitted messages.
    #[arg(long, default_value = "")]
    pub operator: String,
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,
    /// Per-request timeout for monitoring reads, in seconds.
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT.as_secs())]
    pub http_timeout: u64,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = false)]
    pub no_reconnect: bool,
    /// Give up after this many consecutive failed connection attempts.
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub api_url: Url,
    pub operator: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub log_dir: String,
    pub link: LinkConfig,
}

pub fn load_config(args: Args) -> Result<ConsoleConfig, ConfigError> {
    let api_url = parse_url(
        "api",
        &resolve_setting(&args.api_url, "RV_API_URL", DEFAULT_API_URL),
    )?;
    let link_url = parse_url(
        "command link",
        &resolve_setting(&args.link_url, "RV_LINK_URL", DEFAULT_LINK_URL),
    )?;

    let mut reconnect = if args.no_reconnect || env_true("RV_NO_RECONNECT") {
        ReconnectPolicy::disabled()
    } else {
        ReconnectPolicy::default()
    };
    reconnect.max_attempts = args.max_reconnect_attempts;

    let mut link = LinkConfig::new(link_url);
    link.reconnect = reconnect;

    Ok(ConsoleConfig {
        api_url,
        operator: resolve_setting(&args.operator, "RV_OPERATOR", DEFAULT_OPERATOR),
        poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
        http_timeout: Duration::from_secs(args.http_timeout.max(1)),
        log_dir: resolve_setting(&args.log_dir, "RV_LOG_DIR", DEFAULT_LOG_DIR),
        link,
    })
}

fn parse_url(setting: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidUrl {
        setting,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

fn resolve_setting(flag: &str, env_key: &str, default: &str) -> String {
    let env_value = std::env::var(env_key).ok();
    first_non_empty(flag, env_value.as_deref()).unwrap_or_else(|| default.to_string())
}

fn first_non_empty(flag: &str, env_value: Option<&str>) -> Option<String> {
    if !flag.trim().is_empty() {
        return Some(flag.to_string());
    }
    env_value
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.to_string())
}

pub fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}
