use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub mod alerts;
pub mod channel;
pub mod logfile;

pub use alerts::{RecentAlerts, RECENT_ALERTS_CAPACITY};
pub use channel::{ClientFrame, FrameError, ServerFrame, Submission};

/// Sender name reserved for notices the store emits on its own behalf.
pub const SYSTEM_USER: &str = "SYSTEM";

/// One command-link entry as accepted by the session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub user: String,
    pub message: String,
    pub timestamp: String,
}

impl Message {
    pub fn is_system(&self) -> bool {
        self.user == SYSTEM_USER
    }
}

/// Critical road event raised by the detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub lga: String,
    pub issue: String,
    pub recommended_action: String,
    /// Seconds since epoch, set by the pipeline that raised the alert.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwarmStatus {
    pub active_uavs: u32,
    pub total_uavs: u32,
    pub total_mapping_completion: f64,
    #[serde(default)]
    pub lga_progress: BTreeMap<String, f64>,
}

impl SwarmStatus {
    pub fn mapping_percent(&self) -> f64 {
        self.total_mapping_completion * 100.0
    }
}

/// Stores have emitted ids both as strings and as bare numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val: serde_json::Value = serde_json::Value::deserialize(deserializer)?;
    match val {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected string or number for id")),
    }
}
