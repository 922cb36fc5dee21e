//! In-memory model of an nmap XML document.
//!
//! Every field is filled at parse time; absent attributes already carry their
//! defaults here, so rendering never has to guess. Numeric attributes that were
//! missing or unparsable are `None`.

use serde::Serialize;
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub meta: ScanMeta,
    pub hosts: Vec<HostRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMeta {
    /// `version` on the root element, `N/A` when absent.
    pub version: String,
    /// `args` on the root element, `N/A` when absent.
    pub args: String,
    /// Where the document came from (usually its path), if the caller knows.
    pub source: Option<String>,
    pub start_time: Option<String>,
    pub run_summary: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub parsed_at: OffsetDateTime,
}

impl ScanResult {
    pub fn hosts_up(&self) -> usize {
        self.hosts.iter().filter(|h| h.state == HostState::Up).count()
    }

    /// Sum of the per-host counters.
    pub fn port_totals(&self) -> PortStats {
        self.hosts.iter().fold(PortStats::default(), |acc, h| PortStats {
            open: acc.open + h.port_stats.open,
            closed: acc.closed + h.port_stats.closed,
            filtered: acc.filtered + h.port_stats.filtered,
            other: acc.other + h.port_stats.other,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
    Unknown,
}

impl HostState {
    pub fn from_attr(s: &str) -> Self {
        match s {
            "up" => HostState::Up,
            "down" => HostState::Down,
            _ => HostState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Up => "up",
            HostState::Down => "down",
            HostState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    #[default]
    Ipv4,
    Ipv6,
    Mac,
}

impl AddressKind {
    pub fn from_attr(s: &str) -> Self {
        match s {
            "ipv6" => AddressKind::Ipv6,
            "mac" => AddressKind::Mac,
            _ => AddressKind::Ipv4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::Ipv4 => "ipv4",
            AddressKind::Ipv6 => "ipv6",
            AddressKind::Mac => "mac",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hostname {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostRecord {
    pub state: HostState,
    pub reason: String,
    pub address: String,
    pub address_kind: AddressKind,
    pub hostnames: Vec<Hostname>,
    /// Document order, not sorted.
    pub ports: Vec<PortRecord>,
    /// Always equal to `PortStats::tally(&ports)`.
    pub port_stats: PortStats,
    pub extra_ports: Option<ExtraPorts>,
    pub os_matches: Vec<OsMatch>,
    pub trace_hops: Vec<TraceHop>,
}

impl HostRecord {
    pub fn ports_in<'a: 's, 's>(&'a self, state: &'s PortState) -> impl Iterator<Item = &'a PortRecord> + 's {
        self.ports.iter().filter(move |p| p.state == *state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PortStats {
    pub open: usize,
    pub closed: usize,
    pub filtered: usize,
    pub other: usize,
}

impl PortStats {
    pub fn tally(ports: &[PortRecord]) -> Self {
        let mut stats = PortStats::default();
        for p in ports {
            match p.state {
                PortState::Open => stats.open += 1,
                PortState::Closed => stats.closed += 1,
                PortState::Filtered => stats.filtered += 1,
                PortState::Other(_) => stats.other += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.open + self.closed + self.filtered + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
    /// Anything else nmap reports (`open|filtered`, `unfiltered`, ...), kept verbatim.
    Other(String),
}

impl PortState {
    pub fn from_attr(s: &str) -> Self {
        match s {
            "open" => PortState::Open,
            "closed" => PortState::Closed,
            "filtered" => PortState::Filtered,
            other => PortState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
            PortState::Other(s) => s,
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad, not write_str, so width/precision specifiers apply
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortRecord {
    pub protocol: String,
    /// `None` when `portid` was missing or not a valid port number.
    pub port_number: Option<u16>,
    pub state: PortState,
    pub state_reason: String,
    pub service_name: String,
    pub product: String,
    pub version: String,
    pub extra_info: String,
    pub detection_method: String,
    pub confidence: u8,
    pub scripts: Vec<ScriptOutput>,
}

impl PortRecord {
    /// Ordering key for report listings; invalid numbers go last.
    pub fn sort_key(&self) -> u32 {
        self.port_number.map_or(u32::MAX, u32::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptOutput {
    pub id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraPorts {
    pub state: String,
    pub count: Option<u32>,
    pub reasons: Vec<ExtraReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraReason {
    pub reason: String,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsMatch {
    pub name: String,
    pub accuracy: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceHop {
    pub ttl: Option<u32>,
    pub host: String,
    pub ip: String,
    pub rtt_ms: Option<f64>,
}
