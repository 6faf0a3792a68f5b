use crate::collectors::tools::{ToolCommand, ToolRunner};
use crate::config::ToolsConfig;
use crate::model::{Cpu, Device, Ram, UNKNOWN};
use crate::parser::{field_value, labeled, leading_count, non_empty, scan_records, Record};
use serde::Serialize;
use tracing::{debug, info};

const PROCESSOR_HEADER: &str = "Processor Information";
const MEMORY_HEADER: &str = "Memory Device";
const DEFAULT_CHANNEL: &str = "Single";
const EMPTY_SLOT_SIZE: &str = "No Module Installed";

const GPU_CLASSES: [&str; 3] = [
    "VGA compatible controller:",
    "3D controller:",
    "Display controller:",
];
const NIC_CLASSES: [&str; 2] = ["Ethernet controller:", "Network controller:"];

/// Hardware discovered once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaticInventory {
    pub processors: Vec<Cpu>,
    pub memory_modules: Vec<Ram>,
    pub gpus: Vec<String>,
    pub nic_controllers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PciDevices {
    pub gpus: Vec<String>,
    pub nic_controllers: Vec<String>,
}

pub async fn collect_static(runner: &ToolRunner, tools: &ToolsConfig) -> StaticInventory {
    let dmidecode =
        |table: &str| ToolCommand::elevated(&tools.elevate, &tools.dmidecode).arg("-t").arg(table);

    let (processor_table, memory_table, cache_table, pci_listing) = tokio::join!(
        run_tool(runner, dmidecode("processor")),
        run_tool(runner, dmidecode("memory")),
        run_tool(runner, dmidecode("cache")),
        run_tool(runner, ToolCommand::new(&tools.lspci)),
    );

    let cache_table = cache_table.unwrap_or_default();
    let processors = processor_table
        .map(|text| parse_processors(&text, &cache_table))
        .unwrap_or_default();
    let memory_modules = memory_table
        .map(|text| parse_memory_devices(&text))
        .unwrap_or_default();
    let pci = pci_listing
        .map(|text| parse_pci_devices(&text))
        .unwrap_or_default();

    info!(
        processors = processors.len(),
        memory_modules = memory_modules.len(),
        gpus = pci.gpus.len(),
        nic_controllers = pci.nic_controllers.len(),
        "static inventory collected"
    );

    StaticInventory {
        processors,
        memory_modules,
        gpus: pci.gpus,
        nic_controllers: pci.nic_controllers,
    }
}

async fn run_tool(runner: &ToolRunner, cmd: ToolCommand) -> Option<String> {
    match runner.run(&cmd).await {
        Ok(text) => Some(text),
        Err(err) => {
            debug!(error = %err, "inventory tool unavailable");
            None
        }
    }
}

#[derive(Debug, Default)]
struct ProcessorRecord {
    socket: Option<String>,
    max_speed: Option<String>,
    version: Option<String>,
    cores: u32,
    threads: u32,
    cache_handles: [Option<String>; 3],
}

impl Record for ProcessorRecord {
    fn apply(&mut self, line: &str) -> bool {
        if let Some(v) = labeled(line, "Socket Designation:") {
            self.socket = non_empty(v);
        } else if let Some(v) = labeled(line, "Max Speed:") {
            self.max_speed = non_empty(v);
        } else if let Some(v) = labeled(line, "Version:") {
            self.version = non_empty(v);
        } else if let Some(v) = labeled(line, "Core Count:") {
            self.cores = leading_count(v);
        } else if let Some(v) = labeled(line, "Thread Count:") {
            self.threads = leading_count(v);
        } else if let Some(v) = labeled(line, "L1 Cache Handle:") {
            self.cache_handles[0] = non_empty(v);
        } else if let Some(v) = labeled(line, "L2 Cache Handle:") {
            self.cache_handles[1] = non_empty(v);
        } else if let Some(v) = labeled(line, "L3 Cache Handle:") {
            self.cache_handles[2] = non_empty(v);
        } else {
            return false;
        }
        true
    }

    fn is_populated(&self) -> bool {
        self.cores != 0
    }
}

impl ProcessorRecord {
    fn into_cpu(self, cache_table: &str) -> Cpu {
        let [l1, l2, l3] = self
            .cache_handles
            .map(|handle| resolve(handle.and_then(|h| lookup_cache_size(cache_table, &h))));
        Cpu {
            device: Device {
                name: resolve(self.version),
            },
            cores: self.cores,
            threads: self.threads,
            max_speed: resolve(self.max_speed),
            socket: resolve(self.socket),
            l1_cache: l1,
            l2_cache: l2,
            l3_cache: l3,
            temperature: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryRecord {
    size: Option<String>,
    form_factor: Option<String>,
    kind: Option<String>,
    manufacturer: Option<String>,
    part_number: Option<String>,
    speed: Option<String>,
    bank: Option<String>,
    rank: u32,
}

impl Record for MemoryRecord {
    fn apply(&mut self, line: &str) -> bool {
        if let Some(v) = labeled(line, "Size:") {
            self.size = non_empty(v);
        } else if let Some(v) = labeled(line, "Form Factor:") {
            self.form_factor = non_empty(v);
        } else if let Some(v) = labeled(line, "Bank Locator:") {
            self.bank = non_empty(v);
        } else if let Some(v) = labeled(line, "Type:") {
            self.kind = non_empty(v);
        } else if let Some(v) = labeled(line, "Manufacturer:") {
            self.manufacturer = non_empty(v);
        } else if let Some(v) = labeled(line, "Part Number:") {
            self.part_number = non_empty(v);
        } else if let Some(v) = labeled(line, "Configured Memory Speed:")
            .or_else(|| labeled(line, "Configured Clock Speed:"))
        {
            self.speed = non_empty(v);
        } else if let Some(v) = labeled(line, "Rank:") {
            self.rank = leading_count(v);
        } else {
            return false;
        }
        true
    }

    fn is_populated(&self) -> bool {
        self.rank != 0
    }

    fn is_vacant(&self) -> bool {
        self.size
            .as_deref()
            .map_or(true, |size| size.starts_with(EMPTY_SLOT_SIZE))
    }
}

impl From<MemoryRecord> for Ram {
    fn from(r: MemoryRecord) -> Self {
        Ram {
            device: Device {
                name: resolve(r.part_number),
            },
            size: resolve(r.size),
            form_factor: resolve(r.form_factor),
            kind: resolve(r.kind),
            manufacturer: resolve(r.manufacturer),
            speed: resolve(r.speed),
            channel: r.bank.unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            rank: r.rank,
        }
    }
}

fn resolve(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

/// Parses `dmidecode -t processor` output. Cache handles are resolved against
/// the `dmidecode -t cache` table.
pub fn parse_processors(text: &str, cache_table: &str) -> Vec<Cpu> {
    scan_records::<ProcessorRecord>(text, PROCESSOR_HEADER)
        .into_iter()
        .map(|record| record.into_cpu(cache_table))
        .collect()
}

/// Parses `dmidecode -t memory` output into one entry per memory device.
pub fn parse_memory_devices(text: &str) -> Vec<Ram> {
    scan_records::<MemoryRecord>(text, MEMORY_HEADER)
        .into_iter()
        .map(Ram::from)
        .collect()
}

/// Installed size of the cache record referenced by `handle`: the first
/// `Installed Size` line after the first line naming the handle.
pub fn lookup_cache_size(cache_table: &str, handle: &str) -> Option<String> {
    if !handle.starts_with("0x") {
        return None;
    }

    let mut found = false;
    for line in cache_table.lines() {
        if !found {
            found = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .any(|token| token == handle);
        } else if let Some(v) = labeled(line, "Installed Size:") {
            return non_empty(v);
        }
    }
    None
}

/// Classifies `lspci` rows into display and network controllers, keeping the
/// vendor description that follows the class name.
pub fn parse_pci_devices(text: &str) -> PciDevices {
    let mut out = PciDevices::default();
    for line in text.lines() {
        if let Some(desc) = class_description(line, &GPU_CLASSES) {
            out.gpus.push(desc.to_string());
        } else if let Some(desc) = class_description(line, &NIC_CLASSES) {
            out.nic_controllers.push(desc.to_string());
        }
    }
    out
}

fn class_description<'a>(line: &'a str, classes: &[&str]) -> Option<&'a str> {
    classes
        .iter()
        .find_map(|class| line.find(class))
        .and_then(|start| field_value(&line[start..]))
}
