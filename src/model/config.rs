use serde::{Deserialize, Serialize};

/// Configuration from boardflow.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub drag: DragConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST base, e.g. `http://localhost:8000/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// WebSocket base; the board path is appended
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            board_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Liveness `ping` cadence
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// How long one socket read may block before the worker checks its
    /// stop flag and ping timer
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        PushConfig {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragConfig {
    /// Pointer travel, in pixels, before a press becomes a drag
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        DragConfig {
            activation_distance: default_activation_distance(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_read_timeout_ms() -> u64 {
    250
}

fn default_activation_distance() -> f64 {
    5.0
}
