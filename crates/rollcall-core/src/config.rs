use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime configuration.
///
/// Built from defaults, then an optional TOML file (`ROLLCALL_CONFIG`, or
/// `$XDG_CONFIG_HOME/rollcall/config.toml`), then `ROLLCALL_*` environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for the identity store and attendance log.
    pub data_dir: PathBuf,
    /// Identity store root (default: `<data_dir>/faces`).
    pub identity_root: Option<PathBuf>,
    /// Attendance CSV (default: `<data_dir>/attendance.csv`).
    pub attendance_log: Option<PathBuf>,
    /// V4L2 device path.
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Match tolerance; the analyzer's default when unset.
    pub match_tolerance: Option<f32>,
    /// Downscale factor applied before detection during recognition.
    pub downscale: f32,
    /// Samples saved per enrollment.
    pub enroll_target: usize,
    /// Camera read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Consecutive failed reads before capture is abandoned.
    pub max_read_failures: usize,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub model: String,
    pub base_url: String,
    /// Read from `GEMINI_API_KEY` when not set in the file.
    pub api_key: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = xdg_dir("XDG_DATA_HOME", ".local/share").join("rollcall");
        Self {
            model_dir: data_dir.join("models"),
            data_dir,
            identity_root: None,
            attendance_log: None,
            camera_device: "/dev/video0".to_string(),
            match_tolerance: None,
            downscale: 0.25,
            enroll_target: 10,
            read_timeout_secs: 5,
            max_read_failures: 5,
            chat: ChatSettings::default(),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| xdg_dir("XDG_CONFIG_HOME", ".config").join("rollcall/config.toml"));

        let mut config = if path.is_file() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `ROLLCALL_*` (and `GEMINI_API_KEY`) overrides from `lookup`.
    /// Unparsable numeric values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_IDENTITY_ROOT") {
            self.identity_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("ROLLCALL_ATTENDANCE_LOG") {
            self.attendance_log = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = parsed(&lookup, "ROLLCALL_MATCH_TOLERANCE") {
            self.match_tolerance = Some(v);
        }
        if let Some(v) = parsed(&lookup, "ROLLCALL_DOWNSCALE") {
            self.downscale = v;
        }
        if let Some(v) = parsed(&lookup, "ROLLCALL_ENROLL_TARGET") {
            self.enroll_target = v;
        }
        if let Some(v) = parsed(&lookup, "ROLLCALL_READ_TIMEOUT_SECS") {
            self.read_timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "ROLLCALL_MAX_READ_FAILURES") {
            self.max_read_failures = v;
        }
        if let Some(v) = lookup("ROLLCALL_CHAT_MODEL") {
            self.chat.model = v;
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.chat.api_key = Some(v);
        }
    }

    pub fn identity_root(&self) -> PathBuf {
        self.identity_root
            .clone()
            .unwrap_or_else(|| self.data_dir.join("faces"))
    }

    pub fn attendance_log(&self) -> PathBuf {
        self.attendance_log
            .clone()
            .unwrap_or_else(|| self.data_dir.join("attendance.csv"))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(fallback)
    })
}
