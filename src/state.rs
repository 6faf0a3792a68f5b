use crate::collectors::cpu::CpuSampler;
#[cfg(test)]
use crate::collectors::cpu::CpuTicks;
use crate::collectors::inventory::{collect_static, StaticInventory};
use crate::collectors::network::{collect_network, AddressSource, IfAddrs, NetworkPaths};
use crate::collectors::system::{
    collect_hostname, collect_memory, collect_uptime, SysinfoSensors,
};
use crate::collectors::temperature::{assign_temperatures, TemperatureSource};
use crate::collectors::tools::ToolRunner;
use crate::collectors::{FileSystem, RealFs};
use crate::config::{Config, PathsConfig};
use crate::model::{Cpu, NetworkInterface, Ram, Uptime};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Everything known about the host at one point in time. Published snapshots
/// are never modified; each refresh publishes a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub collected_at_unix: i64,
    pub hostname: String,
    pub uptime: Uptime,
    pub processors: Vec<Cpu>,
    /// `None` until counters have advanced between two samples.
    pub cpu_usage_percent: Option<f64>,
    pub memory_modules: Vec<Ram>,
    pub memory_total_mb: u64,
    pub memory_used_mb: u64,
    pub interfaces: Vec<NetworkInterface>,
    pub dns: Vec<String>,
    pub gpus: Vec<String>,
    pub nic_controllers: Vec<String>,
}

/// Backends the dynamic collectors read from.
pub struct Sources {
    pub fs: Arc<dyn FileSystem>,
    pub addresses: Arc<dyn AddressSource>,
    pub temperatures: Arc<dyn TemperatureSource>,
}

impl Sources {
    /// The running host.
    pub fn host() -> Self {
        Self {
            fs: Arc::new(RealFs),
            addresses: Arc::new(IfAddrs),
            temperatures: Arc::new(SysinfoSensors::new()),
        }
    }
}

struct DynamicCollector {
    sources: Sources,
    paths: PathsConfig,
    sample_window: Duration,
    sampler: CpuSampler,
}

impl DynamicCollector {
    async fn collect(&mut self, previous: &Snapshot) -> Snapshot {
        let fs = self.sources.fs.as_ref();
        let mut next = previous.clone();
        next.collected_at_unix = now_unix();

        match collect_uptime(fs, &self.paths.uptime) {
            Ok(uptime) => next.uptime = uptime,
            Err(err) => debug!(error = %err, "uptime unavailable, keeping previous value"),
        }

        next.cpu_usage_percent = self
            .sampler
            .sample(fs, &self.paths.stat, self.sample_window)
            .await;
        if let Some(baseline) = self.sampler.baseline() {
            debug!(
                idle = baseline.idle,
                total = baseline.total,
                usage = ?next.cpu_usage_percent,
                "cpu sampled"
            );
        }
        assign_temperatures(&mut next.processors, &self.sources.temperatures.readings());

        match collect_memory(fs, &self.paths.meminfo) {
            Ok(usage) => {
                next.memory_total_mb = usage.total_mb;
                next.memory_used_mb = usage.used_mb;
            }
            Err(err) => debug!(error = %err, "memory usage unavailable, keeping previous value"),
        }

        let paths = NetworkPaths {
            net_class: &self.paths.net_class,
            route: &self.paths.route,
            resolv_conf: &self.paths.resolv_conf,
        };
        let (interfaces, dns) = collect_network(self.sources.addresses.as_ref(), fs, &paths);
        next.interfaces = interfaces;
        next.dns = dns;

        next
    }
}

/// Owner of the host snapshot.
///
/// Static inventory is collected once while the store is built and a first
/// refresh runs before it is handed out, so every reader sees a complete
/// snapshot. `refresh` calls are serialized; readers get the last published
/// snapshot and never observe a half-written one.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    collector: Mutex<DynamicCollector>,
}

impl SnapshotStore {
    pub async fn initialize(cfg: &Config, sources: Sources) -> Self {
        let runner = ToolRunner::new(cfg.tool_timeout());
        let inventory = collect_static(&runner, &cfg.tools).await;
        Self::with_inventory(cfg, sources, inventory).await
    }

    pub async fn with_inventory(cfg: &Config, sources: Sources, inventory: StaticInventory) -> Self {
        let hostname = collect_hostname(sources.fs.as_ref(), &cfg.paths.hostname);
        let base = Snapshot {
            hostname,
            processors: inventory.processors,
            memory_modules: inventory.memory_modules,
            gpus: inventory.gpus,
            nic_controllers: inventory.nic_controllers,
            ..Snapshot::default()
        };

        let store = Self {
            current: RwLock::new(Arc::new(base)),
            collector: Mutex::new(DynamicCollector {
                sources,
                paths: cfg.paths.clone(),
                sample_window: cfg.cpu_sample_window(),
                sampler: CpuSampler::new(),
            }),
        };
        store.refresh().await;
        store
    }

    /// Re-collects uptime, CPU utilization and temperatures, memory usage,
    /// interfaces and resolvers, then publishes the result.
    pub async fn refresh(&self) {
        let mut collector = self.collector.lock().await;
        let previous = self.snapshot().await;
        let next = collector.collect(&previous).await;
        *self.current.write().await = Arc::new(next);
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Counters the next utilization sample will be measured against.
    #[cfg(test)]
    pub async fn cpu_baseline(&self) -> Option<CpuTicks> {
        self.collector.lock().await.sampler.baseline()
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::mock::MockFs;
    use crate::collectors::network::tests::{v4, v6};
    use crate::collectors::network::AddressEntry;
    use crate::collectors::temperature::tests::{reading, FixedReadings};
    use crate::collectors::CollectError;
    use crate::model::UNKNOWN;

    struct SwappableAddresses(std::sync::Mutex<Vec<AddressEntry>>);

    impl AddressSource for SwappableAddresses {
        fn addresses(&self) -> Result<Vec<AddressEntry>, CollectError> {
            Ok(self.0.lock().expect("addresses lock").clone())
        }
    }

    fn host_fs() -> MockFs {
        MockFs::new()
            .with_file("/proc/sys/kernel/hostname", "rack-12\n")
            .with_file("/proc/uptime", "90061.00 1000.00\n")
            .with_file("/proc/stat", "cpu  900 0 0 100 0 0 0 0 0 0\n")
            .with_file(
                "/proc/meminfo",
                "MemTotal:       8388608 kB\nMemFree:        2097152 kB\n",
            )
            .with_file(
                "/proc/net/route",
                "Iface\tDestination\tGateway\neth0\t00000000\t0101A8C0\n",
            )
            .with_file("/etc/resolv.conf", "nameserver 192.168.1.1\n")
            .with_file("/sys/class/net/eth0/address", "aa:bb:cc:dd:ee:ff\n")
    }

    fn inventory() -> StaticInventory {
        StaticInventory {
            processors: vec![Cpu::default(), Cpu::default()],
            memory_modules: vec![Ram::default()],
            gpus: vec!["Intel Corporation UHD Graphics 620".to_string()],
            nic_controllers: Vec::new(),
        }
    }

    fn test_config() -> Config {
        Config {
            cpu_sample_window_ms: 1,
            ..Config::default()
        }
    }

    async fn build_store(
        fs: Arc<MockFs>,
        addresses: Arc<SwappableAddresses>,
    ) -> SnapshotStore {
        let sources = Sources {
            fs,
            addresses,
            temperatures: Arc::new(FixedReadings(vec![
                reading("coretemp", "Package id 0", 55.5),
                reading("coretemp", "Package id 1", 61.0),
            ])),
        };
        SnapshotStore::with_inventory(&test_config(), sources, inventory()).await
    }

    fn eth0_addresses() -> Arc<SwappableAddresses> {
        Arc::new(SwappableAddresses(std::sync::Mutex::new(vec![
            v4("eth0", [192, 168, 1, 20], [255, 255, 255, 0]),
            v6("eth0", "fe80::a8bb:ccff:fedd:eeff", "ffff:ffff:ffff:ffff::"),
            v4("wlan0", [10, 0, 0, 7], [255, 0, 0, 0]),
        ])))
    }

    #[tokio::test]
    async fn first_snapshot_is_complete() {
        let store = build_store(Arc::new(host_fs()), eth0_addresses()).await;
        let snap = store.snapshot().await;

        assert_eq!(snap.hostname, "rack-12");
        assert_eq!(
            snap.uptime,
            Uptime {
                days: 1,
                hours: 1,
                minutes: 1
            }
        );
        assert_eq!(snap.memory_total_mb, 8192);
        assert_eq!(snap.memory_used_mb, 6144);
        assert_eq!(snap.processors.len(), 2);
        assert_eq!(snap.processors[0].temperature, 55);
        assert_eq!(snap.processors[1].temperature, 61);
        assert_eq!(snap.memory_modules.len(), 1);
        assert_eq!(snap.gpus.len(), 1);
        assert_eq!(snap.cpu_usage_percent, None);

        assert_eq!(snap.interfaces.len(), 2);
        let eth0 = &snap.interfaces[0];
        assert_eq!(eth0.name(), "eth0");
        assert_eq!(eth0.ipv4, "192.168.1.20");
        assert_eq!(eth0.ipv6, "fe80::a8bb:ccff:fedd:eeff");
        assert_eq!(eth0.mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(eth0.gateway, "192.168.1.1");
        assert_eq!(snap.interfaces[1].gateway, UNKNOWN);
        assert_eq!(snap.dns, vec!["192.168.1.1"]);
    }

    #[tokio::test]
    async fn repeated_refresh_is_idempotent() {
        let store = build_store(Arc::new(host_fs()), eth0_addresses()).await;
        let first = store.snapshot().await;
        let first_baseline = store.cpu_baseline().await.expect("baseline after init");

        store.refresh().await;
        let second = store.snapshot().await;
        let second_baseline = store.cpu_baseline().await.expect("baseline after refresh");

        let mut second = (*second).clone();
        second.collected_at_unix = first.collected_at_unix;
        assert_eq!(*first, second);
        assert!(second_baseline.total >= first_baseline.total);
        assert!(second_baseline.idle >= first_baseline.idle);
    }

    #[tokio::test]
    async fn utilization_uses_previous_refresh_as_baseline() {
        let fs = Arc::new(host_fs());
        let store = build_store(fs.clone(), eth0_addresses()).await;

        fs.set_file("/proc/stat", "cpu  950 0 0 150 0 0 0 0 0 0\n");
        store.refresh().await;
        assert_eq!(store.snapshot().await.cpu_usage_percent, Some(50.0));

        store.refresh().await;
        assert_eq!(store.snapshot().await.cpu_usage_percent, Some(50.0));
    }

    #[tokio::test]
    async fn vanished_interface_is_dropped() {
        let addresses = eth0_addresses();
        let store = build_store(Arc::new(host_fs()), addresses.clone()).await;
        assert_eq!(store.snapshot().await.interfaces.len(), 2);

        addresses
            .0
            .lock()
            .expect("addresses lock")
            .retain(|e| e.interface != "wlan0");
        store.refresh().await;

        let snap = store.snapshot().await;
        assert_eq!(snap.interfaces.len(), 1);
        assert_eq!(snap.interfaces[0].name(), "eth0");
        assert_eq!(snap.processors.len(), 2);
    }

    #[tokio::test]
    async fn unreadable_files_keep_last_values() {
        let fs = Arc::new(host_fs());
        let store = build_store(fs.clone(), eth0_addresses()).await;
        let before = store.snapshot().await;

        fs.set_file("/proc/uptime", "garbage");
        fs.set_file("/proc/meminfo", "");
        store.refresh().await;

        let after = store.snapshot().await;
        assert_eq!(after.uptime, before.uptime);
        assert_eq!(after.memory_total_mb, before.memory_total_mb);
    }

    #[tokio::test]
    async fn concurrent_refreshes_are_serialized() {
        let store = Arc::new(build_store(Arc::new(host_fs()), eth0_addresses()).await);
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        a.await.expect("refresh task");
        b.await.expect("refresh task");

        let snap = store.snapshot().await;
        assert_eq!(snap.interfaces.len(), 2);
        assert_eq!(snap.processors.len(), 2);
    }
}
