use crate::collectors::temperature::{SensorReading, TemperatureSource};
use crate::collectors::{read_file, CollectError, FileSystem};
use crate::model::{Uptime, UNKNOWN};
use std::path::Path;
use std::sync::Mutex;
use sysinfo::{ComponentExt, System, SystemExt};
use tracing::debug;

/// First line of the kernel hostname file.
pub fn collect_hostname(fs: &dyn FileSystem, path: &Path) -> String {
    let hostname = match read_file(fs, path) {
        Ok(content) => content.lines().next().unwrap_or_default().trim().to_string(),
        Err(err) => {
            debug!(error = %err, "hostname unavailable");
            String::new()
        }
    };
    if hostname.is_empty() {
        UNKNOWN.to_string()
    } else {
        hostname
    }
}

/// Seconds since boot from `/proc/uptime` (first column).
pub fn parse_uptime_seconds(content: &str) -> Result<u64, CollectError> {
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
        .ok_or_else(|| CollectError::Malformed {
            what: format!("uptime: {}", content.trim()),
        })
}

pub fn collect_uptime(fs: &dyn FileSystem, path: &Path) -> Result<Uptime, CollectError> {
    let content = read_file(fs, path)?;
    parse_uptime_seconds(&content).map(Uptime::from_seconds)
}

/// RAM totals in MiB; used counts everything that is not free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total_mb: u64,
    pub used_mb: u64,
}

pub fn parse_meminfo(content: &str) -> Result<MemoryUsage, CollectError> {
    let mut total_kb = None;
    let mut free_kb = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };
        match key {
            "MemTotal:" => total_kb = Some(value),
            "MemFree:" => free_kb = Some(value),
            _ => {}
        }
    }

    match (total_kb, free_kb) {
        (Some(total), Some(free)) => Ok(MemoryUsage {
            total_mb: total / 1024,
            used_mb: total.saturating_sub(free) / 1024,
        }),
        _ => Err(CollectError::Malformed {
            what: "meminfo: MemTotal/MemFree missing".to_string(),
        }),
    }
}

pub fn collect_memory(fs: &dyn FileSystem, path: &Path) -> Result<MemoryUsage, CollectError> {
    parse_meminfo(&read_file(fs, path)?)
}

/// hwmon readings through `sysinfo`. Component labels have the form
/// `"<chip> <feature>"`, e.g. `"k10temp Tctl"`.
pub struct SysinfoSensors {
    system: Mutex<System>,
}

impl SysinfoSensors {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSource for SysinfoSensors {
    fn readings(&self) -> Vec<SensorReading> {
        let Ok(mut system) = self.system.lock() else {
            return Vec::new();
        };
        system.refresh_components_list();
        system
            .components()
            .iter()
            .map(|c| {
                let label = c.label();
                let (chip, feature) = label.split_once(' ').unwrap_or((label, ""));
                SensorReading {
                    chip: chip.to_string(),
                    feature: feature.to_string(),
                    celsius: c.temperature() as f64,
                }
            })
            .collect()
    }
}
