use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub interval_secs: u64,
    pub cpu_sample_window_ms: u64,
    pub tool_timeout_ms: u64,
    pub tools: ToolsConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub dmidecode: String,
    pub lspci: String,
    /// Prefix for tools that read firmware tables; empty runs them directly.
    pub elevate: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub hostname: PathBuf,
    pub uptime: PathBuf,
    pub stat: PathBuf,
    pub meminfo: PathBuf,
    pub route: PathBuf,
    pub resolv_conf: PathBuf,
    pub net_class: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cpu_sample_window_ms: default_cpu_sample_window_ms(),
            tool_timeout_ms: default_tool_timeout_ms(),
            tools: ToolsConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dmidecode: "dmidecode".to_string(),
            lspci: "lspci".to_string(),
            elevate: vec!["sudo".to_string(), "-n".to_string()],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            hostname: PathBuf::from("/proc/sys/kernel/hostname"),
            uptime: PathBuf::from("/proc/uptime"),
            stat: PathBuf::from("/proc/stat"),
            meminfo: PathBuf::from("/proc/meminfo"),
            route: PathBuf::from("/proc/net/route"),
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
            net_class: PathBuf::from("/sys/class/net"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.cpu_sample_window_ms < 1 {
            return Err(ConfigError::Validation(
                "cpu_sample_window_ms must be >= 1".to_string(),
            ));
        }
        if self.tool_timeout_ms < 1 {
            return Err(ConfigError::Validation(
                "tool_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.tools.dmidecode.trim().is_empty() || self.tools.lspci.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tools.dmidecode and tools.lspci must not be empty".to_string(),
            ));
        }
        if self.tools.elevate.iter().any(|arg| arg.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "tools.elevate must not contain empty arguments".to_string(),
            ));
        }

        validate_paths(&self.paths)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_paths(paths: &PathsConfig) -> Result<(), ConfigError> {
    let named = [
        ("hostname", &paths.hostname),
        ("uptime", &paths.uptime),
        ("stat", &paths.stat),
        ("meminfo", &paths.meminfo),
        ("route", &paths.route),
        ("resolv_conf", &paths.resolv_conf),
        ("net_class", &paths.net_class),
    ];
    for (name, path) in named {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "paths.{name} must not be empty"
            )));
        }
    }
    Ok(())
}

const fn default_interval_secs() -> u64 {
    5
}

const fn default_cpu_sample_window_ms() -> u64 {
    500
}

const fn default_tool_timeout_ms() -> u64 {
    5000
}
