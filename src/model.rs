use serde::Serialize;

/// Placeholder for any string field the host did not report.
pub const UNKNOWN: &str = "-";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Identity shared by every hardware entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub name: String,
}

impl Default for Device {
    fn default() -> Self {
        Self { name: unknown() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cpu {
    #[serde(flatten)]
    pub device: Device,
    pub cores: u32,
    pub threads: u32,
    pub max_speed: String,
    pub socket: String,
    pub l1_cache: String,
    pub l2_cache: String,
    pub l3_cache: String,
    /// Whole degrees Celsius, 0 while no sensor reading has been assigned.
    pub temperature: i32,
}

impl Default for Cpu {
    fn default() -> Self {
        Self {
            device: Device::default(),
            cores: 0,
            threads: 0,
            max_speed: unknown(),
            socket: unknown(),
            l1_cache: unknown(),
            l2_cache: unknown(),
            l3_cache: unknown(),
            temperature: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ram {
    #[serde(flatten)]
    pub device: Device,
    pub size: String,
    pub form_factor: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub manufacturer: String,
    pub speed: String,
    pub channel: String,
    /// 0 marks an unpopulated slot.
    pub rank: u32,
}

impl Default for Ram {
    fn default() -> Self {
        Self {
            device: Device::default(),
            size: unknown(),
            form_factor: unknown(),
            kind: unknown(),
            manufacturer: unknown(),
            speed: unknown(),
            channel: unknown(),
            rank: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterface {
    #[serde(flatten)]
    pub device: Device,
    pub ipv4: String,
    pub ipv6: String,
    pub ipv4_netmask: String,
    pub ipv6_netmask: String,
    pub mac: String,
    pub gateway: String,
}

impl NetworkInterface {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            device: Device { name: name.into() },
            ipv4: unknown(),
            ipv6: unknown(),
            ipv4_netmask: unknown(),
            ipv6_netmask: unknown(),
            mac: unknown(),
            gateway: unknown(),
        }
    }

    pub fn name(&self) -> &str {
        &self.device.name
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
}

impl Uptime {
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            days: seconds / 86_400,
            hours: (seconds % 86_400) / 3_600,
            minutes: (seconds % 3_600) / 60,
        }
    }
}
