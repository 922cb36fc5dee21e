//! Plain-text report rendering. Output depends only on the model.

use crate::model::*;
use cardionet_core::report_timestamp;

const WIDTH: usize = 80;
/// Filtered ports listed before the remainder is summarised.
pub const FILTERED_LISTED: usize = 10;
/// Closed ports are listed one by one only up to this many.
pub const CLOSED_DETAIL_MAX: usize = 10;
pub const OS_MATCHES_SHOWN: usize = 3;

pub fn render(scan: &ScanResult) -> String {
    let rule = "=".repeat(WIDTH);
    let mut lines = vec![
        rule.clone(),
        "NMAP SCAN REPORT".to_string(),
        rule.clone(),
        format!("Generated: {}", report_timestamp(scan.meta.parsed_at)),
    ];
    if let Some(src) = &scan.meta.source {
        lines.push(format!("XML File: {}", src));
    }
    lines.push(String::new());

    lines.push("SCAN INFORMATION".to_string());
    lines.push("-".repeat(WIDTH));
    lines.push(format!("Nmap Version: {}", scan.meta.version));
    lines.push(format!("Command: {}", scan.meta.args));
    if let Some(start) = &scan.meta.start_time {
        lines.push(format!("Started: {}", start));
    }
    lines.push(format!("Total Hosts: {}", scan.hosts.len()));
    lines.push(String::new());

    for (i, host) in scan.hosts.iter().enumerate() {
        render_host(&mut lines, host, i + 1);
    }
    render_summary(&mut lines, scan);
    lines.push(rule);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_host(lines: &mut Vec<String>, host: &HostRecord, number: usize) {
    lines.push(String::new());
    lines.push(format!("HOST {}", number));
    lines.push("-".repeat(WIDTH));
    lines.push(format!("Address: {} ({})", host.address, host.address_kind.as_str()));
    lines.push(format!("Status: {} ({})", host.state.as_str().to_uppercase(), host.reason));

    if !host.hostnames.is_empty() {
        lines.push("Hostnames:".to_string());
        for h in &host.hostnames {
            lines.push(format!("  {} ({})", h.name, h.kind));
        }
    }

    let stats = &host.port_stats;
    lines.push(String::new());
    lines.push("Port Summary:".to_string());
    lines.push(format!(
        "  Open: {}, Closed: {}, Filtered: {}, Other: {}",
        stats.open, stats.closed, stats.filtered, stats.other
    ));

    let open = sorted(host, PortState::Open);
    if !open.is_empty() {
        lines.push(String::new());
        lines.push(format!("OPEN PORTS ({}):", open.len()));
        lines.extend(open.iter().map(|p| format_port(p)));
    }

    let filtered = sorted(host, PortState::Filtered);
    if !filtered.is_empty() {
        lines.push(String::new());
        lines.push(format!("FILTERED PORTS ({}):", filtered.len()));
        lines.extend(filtered.iter().take(FILTERED_LISTED).map(|p| format_port(p)));
        if filtered.len() > FILTERED_LISTED {
            lines.push(format!("  ... and {} more filtered ports", filtered.len() - FILTERED_LISTED));
        }
    }

    let closed = sorted(host, PortState::Closed);
    if !closed.is_empty() {
        lines.push(String::new());
        if closed.len() <= CLOSED_DETAIL_MAX {
            lines.push(format!("CLOSED PORTS ({}):", closed.len()));
            lines.extend(closed.iter().map(|p| format_port(p)));
        } else {
            lines.push(format!("CLOSED PORTS: {} ports closed", closed.len()));
        }
    }

    if let Some(extra) = &host.extra_ports {
        lines.push(String::new());
        lines.push(format!("EXTRA PORTS: {} ports {}", count_label(extra.count), extra.state));
        for r in &extra.reasons {
            lines.push(format!("  {}: {}", r.reason, count_label(r.count)));
        }
    }

    if !host.os_matches.is_empty() {
        lines.push(String::new());
        lines.push("OS DETECTION:".to_string());
        for m in host.os_matches.iter().take(OS_MATCHES_SHOWN) {
            let accuracy = m.accuracy.map_or_else(|| "?".to_string(), |a| a.to_string());
            lines.push(format!("  {} ({}%)", m.name, accuracy));
        }
    }

    if !host.trace_hops.is_empty() {
        lines.push(String::new());
        lines.push("TRACEROUTE:".to_string());
        for hop in &host.trace_hops {
            let ttl = hop.ttl.map_or_else(|| "?".to_string(), |t| t.to_string());
            let rtt = hop.rtt_ms.map_or_else(|| "?".to_string(), |t| format!("{:.2}", t));
            lines.push(format!("  TTL {}: {} ({}) - {}ms", ttl, hop.host, hop.ip, rtt));
        }
    }
}

fn render_summary(lines: &mut Vec<String>, scan: &ScanResult) {
    let totals = scan.port_totals();
    lines.push(String::new());
    lines.push("=".repeat(WIDTH));
    lines.push("SCAN SUMMARY".to_string());
    lines.push("=".repeat(WIDTH));
    lines.push(format!("Total Hosts Scanned: {}", scan.hosts.len()));
    lines.push(format!("Hosts Up: {}", scan.hosts_up()));
    if let Some(summary) = &scan.meta.run_summary {
        lines.push(format!("Nmap: {}", summary));
    }
    lines.push(String::new());
    lines.push("Port Statistics (All Hosts):".to_string());
    lines.push(format!("  Total Open: {}", totals.open));
    lines.push(format!("  Total Closed: {}", totals.closed));
    lines.push(format!("  Total Filtered: {}", totals.filtered));
}

/// Ports in `state`, stable-sorted by port number.
fn sorted(host: &HostRecord, state: PortState) -> Vec<&PortRecord> {
    let mut ports: Vec<&PortRecord> = host.ports_in(&state).collect();
    ports.sort_by_key(|p| p.sort_key());
    ports
}

fn count_label(count: Option<u32>) -> String {
    count.map_or_else(|| "?".to_string(), |c| c.to_string())
}

/// One fixed-column port line: `  22/tcp open     ssh             OpenSSH 9.6p1 (Ubuntu)`.
pub fn format_port(port: &PortRecord) -> String {
    let number = port.port_number.map_or_else(|| "unknown".to_string(), |n| n.to_string());
    let mut line = format!(
        "  {}/{:<3} {:<8.8} {:<15.15}",
        number, port.protocol, port.state, port.service_name
    );
    if !port.product.is_empty() || !port.version.is_empty() {
        line.push(' ');
        line.push_str(&port.product);
        if !port.version.is_empty() {
            line.push(' ');
            line.push_str(&port.version);
        }
    }
    if !port.extra_info.is_empty() {
        line.push_str(&format!(" ({})", port.extra_info));
    }
    line
}
