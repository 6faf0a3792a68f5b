use crate::collectors::{read_file, CollectError, FileSystem};
use crate::model::{NetworkInterface, UNKNOWN};
use crate::parser::columns;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tracing::{debug, warn};

const DEFAULT_ROUTE: &str = "00000000";

/// One local address as reported by the kernel, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub interface: String,
    pub family: AddressFamily,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressFamily {
    V4 {
        address: Ipv4Addr,
        netmask: Option<Ipv4Addr>,
    },
    V6 {
        address: Ipv6Addr,
        netmask: Option<Ipv6Addr>,
    },
    /// Link-layer or other entries that carry no IP address.
    Other,
}

/// Enumerates every local address of the host.
pub trait AddressSource: Send + Sync {
    fn addresses(&self) -> Result<Vec<AddressEntry>, CollectError>;
}

/// `getifaddrs(3)`-backed enumeration.
#[derive(Debug, Default, Clone, Copy)]
pub struct IfAddrs;

impl AddressSource for IfAddrs {
    fn addresses(&self) -> Result<Vec<AddressEntry>, CollectError> {
        let mut out = Vec::new();
        for ifa in nix::ifaddrs::getifaddrs()? {
            let Some(address) = ifa.address else {
                continue;
            };
            let family = if let Some(v4) = address.as_sockaddr_in() {
                AddressFamily::V4 {
                    address: v4.ip(),
                    netmask: ifa
                        .netmask
                        .as_ref()
                        .and_then(|m| m.as_sockaddr_in())
                        .map(|m| m.ip()),
                }
            } else if let Some(v6) = address.as_sockaddr_in6() {
                AddressFamily::V6 {
                    address: v6.ip(),
                    netmask: ifa
                        .netmask
                        .as_ref()
                        .and_then(|m| m.as_sockaddr_in6())
                        .map(|m| m.ip()),
                }
            } else {
                AddressFamily::Other
            };
            out.push(AddressEntry {
                interface: ifa.interface_name,
                family,
            });
        }
        Ok(out)
    }
}

fn render<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Folds address entries into one record per interface name, in first-seen
/// order. Each entry only touches the fields of its own address family.
pub fn reconcile(entries: &[AddressEntry]) -> Vec<NetworkInterface> {
    let mut out: Vec<NetworkInterface> = Vec::new();
    for entry in entries {
        let idx = match out.iter().position(|ni| ni.name() == entry.interface) {
            Some(idx) => idx,
            None => {
                out.push(NetworkInterface::named(&entry.interface));
                out.len() - 1
            }
        };
        let ni = &mut out[idx];
        match &entry.family {
            AddressFamily::V4 { address, netmask } => {
                ni.ipv4 = address.to_string();
                ni.ipv4_netmask = render(*netmask);
            }
            AddressFamily::V6 { address, netmask } => {
                ni.ipv6 = address.to_string();
                ni.ipv6_netmask = render(*netmask);
            }
            AddressFamily::Other => {}
        }
    }
    out
}

/// Hardware address from `<net_class>/<name>/address`.
pub fn read_mac(fs: &dyn FileSystem, net_class: &Path, name: &str) -> String {
    let path = net_class.join(name).join("address");
    match read_file(fs, &path) {
        Ok(content) => {
            let mac = content.lines().next().unwrap_or_default().trim();
            if mac.is_empty() {
                UNKNOWN.to_string()
            } else {
                mac.to_string()
            }
        }
        Err(err) => {
            debug!(iface = %name, error = %err, "mac address unavailable");
            UNKNOWN.to_string()
        }
    }
}

/// Decodes a `/proc/net/route` address column: hex of the address in network
/// byte order read as a little-endian integer.
pub fn decode_route_address(hex: &str) -> Option<Ipv4Addr> {
    let raw = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(raw.to_le_bytes()))
}

/// Gateway of the default route through `iface`, if the table has one.
pub fn default_gateway(route_table: &str, iface: &str) -> Option<Ipv4Addr> {
    route_table
        .lines()
        .map(columns)
        .filter(|cols| cols.len() >= 3 && cols[0] == iface && cols[1] == DEFAULT_ROUTE)
        .filter_map(|cols| decode_route_address(cols[2]))
        .last()
}

/// `nameserver` entries of a resolver configuration, zone index removed.
pub fn parse_nameservers(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#') && !l.starts_with(';'))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            if parts.next()? != "nameserver" {
                return None;
            }
            let server = parts.next()?;
            let server = server.split('%').next().unwrap_or(server);
            (!server.is_empty()).then(|| server.to_string())
        })
        .collect()
}

/// Where network state is read from on each refresh.
#[derive(Debug, Clone)]
pub struct NetworkPaths<'a> {
    pub net_class: &'a Path,
    pub route: &'a Path,
    pub resolv_conf: &'a Path,
}

/// Rebuilds the interface list and DNS resolvers from scratch.
pub fn collect_network(
    source: &dyn AddressSource,
    fs: &dyn FileSystem,
    paths: &NetworkPaths<'_>,
) -> (Vec<NetworkInterface>, Vec<String>) {
    let mut interfaces = match source.addresses() {
        Ok(entries) => reconcile(&entries),
        Err(err) => {
            warn!(error = %err, "cannot enumerate network addresses");
            Vec::new()
        }
    };

    let route_table = read_file(fs, paths.route).unwrap_or_else(|err| {
        debug!(error = %err, "routing table unavailable");
        String::new()
    });
    for ni in &mut interfaces {
        ni.mac = read_mac(fs, paths.net_class, ni.name());
        ni.gateway = render(default_gateway(&route_table, ni.name()));
    }

    let dns = match read_file(fs, paths.resolv_conf) {
        Ok(content) => parse_nameservers(&content),
        Err(err) => {
            debug!(error = %err, "resolver configuration unavailable");
            Vec::new()
        }
    };

    (interfaces, dns)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collectors::mock::MockFs;

    pub(crate) struct StaticAddresses(pub Vec<AddressEntry>);

    impl AddressSource for StaticAddresses {
        fn addresses(&self) -> Result<Vec<AddressEntry>, CollectError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) fn v4(iface: &str, address: [u8; 4], netmask: [u8; 4]) -> AddressEntry {
        AddressEntry {
            interface: iface.to_string(),
            family: AddressFamily::V4 {
                address: Ipv4Addr::from(address),
                netmask: Some(Ipv4Addr::from(netmask)),
            },
        }
    }

    pub(crate) fn v6(iface: &str, address: &str, netmask: &str) -> AddressEntry {
        AddressEntry {
            interface: iface.to_string(),
            family: AddressFamily::V6 {
                address: address.parse().expect("ipv6 fixture"),
                netmask: netmask.parse().ok(),
            },
        }
    }

    fn other(iface: &str) -> AddressEntry {
        AddressEntry {
            interface: iface.to_string(),
            family: AddressFamily::Other,
        }
    }

    const ROUTE_TABLE: &str = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0280A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0080A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
eth0.100\t00000000\t0164A8C0\t0003\t0\t0\t200\t00000000\t0\t0\t0
";

    #[test]
    fn both_families_merge_into_one_record() {
        let entries = vec![
            v4("eth0", [192, 168, 128, 10], [255, 255, 255, 0]),
            v6("eth0", "fe80::1", "ffff:ffff:ffff:ffff::"),
        ];
        let nis = reconcile(&entries);
        assert_eq!(nis.len(), 1);
        assert_eq!(nis[0].name(), "eth0");
        assert_eq!(nis[0].ipv4, "192.168.128.10");
        assert_eq!(nis[0].ipv4_netmask, "255.255.255.0");
        assert_eq!(nis[0].ipv6, "fe80::1");
        assert_eq!(nis[0].ipv6_netmask, "ffff:ffff:ffff:ffff::");
    }

    #[test]
    fn link_layer_entry_never_duplicates_a_name() {
        let entries = vec![
            other("lo"),
            other("wlan0"),
            v4("lo", [127, 0, 0, 1], [255, 0, 0, 0]),
            v6("wlan0", "2001:db8::5", "ffff:ffff:ffff:ffff::"),
            other("wlan0"),
            other("docker0"),
        ];
        let nis = reconcile(&entries);
        let names: Vec<_> = nis.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["lo", "wlan0", "docker0"]);

        assert_eq!(nis[0].ipv4, "127.0.0.1");
        assert_eq!(nis[0].ipv6, UNKNOWN);
        assert_eq!(nis[1].ipv4, UNKNOWN);
        assert_eq!(nis[1].ipv6, "2001:db8::5");
        assert_eq!(nis[2].ipv4, UNKNOWN);
        assert_eq!(nis[2].ipv6_netmask, UNKNOWN);
    }

    #[test]
    fn gateway_is_decoded_from_reversed_hex() {
        assert_eq!(
            decode_route_address("0280A8C0"),
            Some(Ipv4Addr::new(192, 168, 128, 2))
        );
        assert_eq!(decode_route_address("zz"), None);

        assert_eq!(
            default_gateway(ROUTE_TABLE, "eth0"),
            Some(Ipv4Addr::new(192, 168, 128, 2))
        );
        assert_eq!(
            default_gateway(ROUTE_TABLE, "eth0.100"),
            Some(Ipv4Addr::new(192, 168, 100, 1))
        );
        assert_eq!(default_gateway(ROUTE_TABLE, "wlan0"), None);
    }

    #[test]
    fn nameservers_drop_zone_index() {
        let resolv = "# Generated by NetworkManager
search lan
nameserver 192.168.1.1
nameserver 2001:db8::1%eth0
;nameserver 10.0.0.1
nameserver 192.168.1.1
options edns0
";
        assert_eq!(
            parse_nameservers(resolv),
            vec!["192.168.1.1", "2001:db8::1", "192.168.1.1"]
        );
    }

    #[test]
    fn collect_fills_mac_gateway_and_dns() {
        let fs = MockFs::new()
            .with_file("/sys/class/net/eth0/address", "52:54:00:12:34:56\n")
            .with_file("/proc/net/route", ROUTE_TABLE)
            .with_file("/etc/resolv.conf", "nameserver 1.1.1.1\n");
        let source = StaticAddresses(vec![
            v4("eth0", [192, 168, 128, 10], [255, 255, 255, 0]),
            other("tun0"),
        ]);
        let paths = NetworkPaths {
            net_class: Path::new("/sys/class/net"),
            route: Path::new("/proc/net/route"),
            resolv_conf: Path::new("/etc/resolv.conf"),
        };

        let (nis, dns) = collect_network(&source, &fs, &paths);
        assert_eq!(nis.len(), 2);
        assert_eq!(nis[0].mac, "52:54:00:12:34:56");
        assert_eq!(nis[0].gateway, "192.168.128.2");
        assert_eq!(nis[1].mac, UNKNOWN);
        assert_eq!(nis[1].gateway, UNKNOWN);
        assert_eq!(dns, vec!["1.1.1.1"]);
    }

    #[test]
    fn enumeration_failure_yields_empty_list() {
        struct Failing;
        impl AddressSource for Failing {
            fn addresses(&self) -> Result<Vec<AddressEntry>, CollectError> {
                Err(CollectError::AddressEnumeration(nix::Error::EACCES))
            }
        }
        let paths = NetworkPaths {
            net_class: Path::new("/sys/class/net"),
            route: Path::new("/proc/net/route"),
            resolv_conf: Path::new("/etc/resolv.conf"),
        };
        let (nis, dns) = collect_network(&Failing, &MockFs::new(), &paths);
        assert!(nis.is_empty());
        assert!(dns.is_empty());
    }
}
