use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Deployment mode, fixed at startup, selecting which local client variant
/// serves each ComSat connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Public,
    #[default]
    Private,
}

impl Mode {
    /// Parse the raw mode string. Only the exact value `public` selects the
    /// public variant; everything else, including unrecognized strings,
    /// resolves to private. Long-standing deployments rely on that fallback,
    /// so unknown values are logged rather than rejected.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "public" => Mode::Public,
            "private" => Mode::Private,
            other => {
                warn!("Unrecognized mode {:?}, falling back to private", other);
                Mode::Private
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Public => "public",
            Mode::Private => "private",
        }
    }
}

impl From<String> for Mode {
    fn from(raw: String) -> Self {
        Mode::parse(&raw)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Deployment mode: public or private
    #[serde(default)]
    pub mode: Mode,

    /// Address the ComSat transport intake listens on
    pub comsat_listen_addr: String,

    /// Local container endpoint used by the public client
    pub container_addr: String,

    /// Frame capacity of the ComSat-to-local direction
    #[serde(default = "default_read_buffer_frames")]
    pub read_buffer_frames: usize,

    /// Frame capacity of the local-to-ComSat direction
    #[serde(default = "default_write_buffer_frames")]
    pub write_buffer_frames: usize,

    /// Frames larger than this are dropped by the private client
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log directory for file-based logging
    pub log_dir: Option<String>,

    /// Log file name for file-based logging
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_read_buffer_frames() -> usize {
    64
}

fn default_write_buffer_frames() -> usize {
    64
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "agent.log".to_string()
}

impl AgentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
