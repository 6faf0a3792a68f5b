use crate::collectors::{read_file, CollectError, FileSystem};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Cumulative tick counters from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuTicks {
    /// idle + iowait
    pub idle: u64,
    /// idle + user + nice + system + irq + softirq + steal
    pub total: u64,
}

/// Parses the first `cpu ` line of `/proc/stat`.
pub fn parse_cpu_ticks(content: &str) -> Result<CpuTicks, CollectError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CollectError::Malformed {
            what: "stat: no aggregate cpu line".to_string(),
        })?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| CollectError::Malformed {
            what: format!("stat cpu line: {line}"),
        })?;
    if fields.len() < 4 {
        return Err(CollectError::Malformed {
            what: format!("stat cpu line has {} fields", fields.len()),
        });
    }

    let field = |idx: usize| fields.get(idx).copied().unwrap_or(0);
    let (user, nice, system, idle, iowait) = (field(0), field(1), field(2), field(3), field(4));
    let (irq, softirq, steal) = (field(5), field(6), field(7));

    let idle = idle + iowait;
    Ok(CpuTicks {
        idle,
        total: idle + user + nice + system + irq + softirq + steal,
    })
}

/// Utilization from two samples, `None` when no tick elapsed between them.
pub fn utilization_percent(prev: CpuTicks, next: CpuTicks) -> Option<f64> {
    let total = next.total.saturating_sub(prev.total);
    if total == 0 {
        return None;
    }
    let idle = next.idle.saturating_sub(prev.idle).min(total);
    Some(100.0 * (total - idle) as f64 / total as f64)
}

/// Delta sampler whose baseline carries over from one refresh to the next.
#[derive(Debug, Clone, Default)]
pub struct CpuSampler {
    baseline: Option<CpuTicks>,
    usage_percent: Option<f64>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one sample. The first sample ever only sets the baseline; a
    /// sample with no elapsed ticks keeps the previous utilization.
    pub fn observe(&mut self, ticks: CpuTicks) -> Option<f64> {
        if let Some(prev) = self.baseline {
            if let Some(pct) = utilization_percent(prev, ticks) {
                self.usage_percent = Some(pct);
            }
        }
        self.baseline = Some(ticks);
        self.usage_percent
    }

    pub fn baseline(&self) -> Option<CpuTicks> {
        self.baseline
    }

    /// Reads the counters, waits `window`, reads them again.
    pub async fn sample(&mut self, fs: &dyn FileSystem, stat: &Path, window: Duration) -> Option<f64> {
        self.read_once(fs, stat);
        tokio::time::sleep(window).await;
        self.read_once(fs, stat);
        self.usage_percent
    }

    fn read_once(&mut self, fs: &dyn FileSystem, stat: &Path) {
        match read_file(fs, stat).and_then(|content| parse_cpu_ticks(&content)) {
            Ok(ticks) => {
                self.observe(ticks);
            }
            Err(err) => debug!(error = %err, "cpu counters unavailable"),
        }
    }
}
