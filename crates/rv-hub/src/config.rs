use crate::store::DEFAULT_HISTORY_CAPACITY;
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_HUB_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_LOG_DIR: &str = ".rv/logs";

#[derive(Clone, Debug)]
pub struct HubConfig {
    pub addr: String,
    pub debug: bool,
    pub history_capacity: usize,
    pub announce_presence: bool,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    pub log_dir: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_HUB_ADDR.to_string(),
            debug: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            announce_presence: false,
            ping_interval: Duration::from_secs(10),
            write_timeout: Duration::from_secs(2),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rv-hub")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub addr: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    pub history: usize,
    #[arg(long, default_value_t = false)]
    pub announce_presence: bool,
    #[arg(long, default_value_t = 10)]
    pub ping_interval: u64,
    #[arg(long, default_value_t = 2)]
    pub write_timeout: u64,
    #[arg(long, default_value = "")]
    pub log_dir: String,
}

pub fn load_config(args: Args) -> HubConfig {
    HubConfig {
        addr: resolve_setting(&args.addr, "RV_HUB_ADDR", DEFAULT_HUB_ADDR),
        debug: args.debug || env_true("RV_HUB_DEBUG"),
        history_capacity: args.history.max(1),
        announce_presence: args.announce_presence || env_true("RV_HUB_ANNOUNCE_PRESENCE"),
        ping_interval: Duration::from_secs(args.ping_interval),
        write_timeout: Duration::from_secs(args.write_timeout.max(1)),
        log_dir: resolve_setting(&args.log_dir, "RV_LOG_DIR", DEFAULT_LOG_DIR),
    }
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

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}
