use crate::model::Cpu;

/// Chip families whose readings describe processor packages or dies.
const CPU_SENSOR_CHIPS: [&str; 3] = ["coretemp", "k10temp", "zenpower"];

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub chip: String,
    pub feature: String,
    pub celsius: f64,
}

/// Ordered temperature readings from the sensor backend.
pub trait TemperatureSource: Send + Sync {
    fn readings(&self) -> Vec<SensorReading>;
}

/// Per-package features, most preferred first: Intel `Package id N`, then
/// AMD `Tctl` (the first hwmon input of k10temp/zenpower) and `Tdie`.
const PACKAGE_FEATURES: [&str; 3] = ["Package id", "Tctl", "Tdie"];

pub fn is_cpu_chip(chip: &str) -> bool {
    CPU_SENSOR_CHIPS.iter().any(|family| chip.contains(family))
}

/// One reading per processor package, in package order. Backend order is
/// not trusted (sysinfo sorts by label, putting `Core 0` before
/// `Package id 0`); per-core and per-CCD readings are dropped whenever a
/// package-level feature exists.
pub fn package_readings(readings: &[SensorReading]) -> Vec<&SensorReading> {
    let cpu: Vec<&SensorReading> = readings
        .iter()
        .filter(|r| is_cpu_chip(&r.chip) && r.celsius.is_finite())
        .collect();

    for feature in PACKAGE_FEATURES {
        let mut packages: Vec<&SensorReading> = cpu
            .iter()
            .copied()
            .filter(|r| r.feature.starts_with(feature))
            .collect();
        if !packages.is_empty() {
            packages.sort_by_key(|r| package_index(&r.feature));
            return packages;
        }
    }
    cpu
}

fn package_index(feature: &str) -> u32 {
    feature
        .rsplit(' ')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Assigns package readings to processors by position, in discovery order.
/// Processors left without a reading keep their last temperature.
pub fn assign_temperatures(processors: &mut [Cpu], readings: &[SensorReading]) {
    for (cpu, reading) in processors.iter_mut().zip(package_readings(readings)) {
        cpu.temperature = reading.celsius as i32;
    }
}
