//! Schema walk from an nmap XML tree into [`ScanResult`].
//!
//! Only a document that fails to parse as XML is an error. Every other gap is
//! filled with the default for that field.

use crate::error::ReportError;
use crate::model::*;
use roxmltree::{Document, Node, ParsingOptions};
use std::str::FromStr;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub fn parse_document(xml: &str) -> Result<ScanResult, ReportError> {
    parse_document_at(xml, OffsetDateTime::now_utc())
}

/// Parse with an explicit timestamp, recorded as the model's parse time.
pub fn parse_document_at(xml: &str, parsed_at: OffsetDateTime) -> Result<ScanResult, ReportError> {
    // nmap writes `<!DOCTYPE nmaprun>` into every -oX file
    let opts = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let doc = Document::parse_with_options(xml, opts)?;
    let root = doc.root_element();
    if root.tag_name().name() != "nmaprun" {
        warn!(root = root.tag_name().name(), "unexpected root element, parsing anyway");
    }

    let hosts: Vec<HostRecord> = children(root, "host").map(parse_host).collect();
    let run_summary = child(root, "runstats")
        .and_then(|rs| child(rs, "finished"))
        .and_then(|f| f.attribute("summary"))
        .map(str::to_string);

    let meta = ScanMeta {
        version: attr_or(root, "version", "N/A"),
        args: attr_or(root, "args", "N/A"),
        source: None,
        start_time: root.attribute("startstr").map(str::to_string),
        run_summary,
        parsed_at,
    };
    info!(hosts = hosts.len(), version = %meta.version, "parsed scan document");
    Ok(ScanResult { meta, hosts })
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'i: 'a>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn attr_or(node: Node, name: &str, default: &str) -> String {
    node.attribute(name).unwrap_or(default).to_string()
}

/// Missing and unparsable values both come back as `None`; the latter is logged.
fn numeric<T: FromStr>(node: Node, name: &str) -> Option<T> {
    let raw = node.attribute(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            debug!(element = node.tag_name().name(), attr = name, value = raw, "non-numeric value");
            None
        }
    }
}

fn parse_host(host: Node) -> HostRecord {
    let (state, reason) = match child(host, "status") {
        Some(s) => (HostState::from_attr(s.attribute("state").unwrap_or("unknown")), attr_or(s, "reason", "")),
        None => (HostState::Unknown, String::new()),
    };

    // only the first address is modelled
    let (address, address_kind) = match child(host, "address") {
        Some(a) => (attr_or(a, "addr", "N/A"), AddressKind::from_attr(a.attribute("addrtype").unwrap_or("ipv4"))),
        None => ("N/A".to_string(), AddressKind::Ipv4),
    };

    let hostnames = child(host, "hostnames")
        .map(|hn| {
            children(hn, "hostname")
                .filter_map(|h| {
                    let name = h.attribute("name").unwrap_or("");
                    if name.is_empty() {
                        return None;
                    }
                    Some(Hostname { name: name.to_string(), kind: attr_or(h, "type", "") })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut ports = Vec::new();
    let mut extra_ports = None;
    if let Some(ports_el) = child(host, "ports") {
        ports = children(ports_el, "port").map(parse_port).collect();
        // a later grouping replaces an earlier one
        for ep in children(ports_el, "extraports") {
            extra_ports = Some(ExtraPorts {
                state: attr_or(ep, "state", "unknown"),
                count: numeric(ep, "count"),
                reasons: children(ep, "extrareasons")
                    .map(|r| ExtraReason { reason: attr_or(r, "reason", ""), count: numeric(r, "count") })
                    .collect(),
            });
        }
    }
    let port_stats = PortStats::tally(&ports);

    let os_matches = child(host, "os")
        .map(|os| {
            children(os, "osmatch")
                .map(|m| OsMatch { name: attr_or(m, "name", "Unknown"), accuracy: numeric(m, "accuracy") })
                .collect()
        })
        .unwrap_or_default();

    let trace_hops = child(host, "trace")
        .map(|t| {
            children(t, "hop")
                .map(|h| TraceHop {
                    ttl: numeric(h, "ttl"),
                    host: attr_or(h, "host", ""),
                    ip: attr_or(h, "ipaddr", ""),
                    rtt_ms: numeric(h, "rtt"),
                })
                .collect()
        })
        .unwrap_or_default();

    HostRecord {
        state,
        reason,
        address,
        address_kind,
        hostnames,
        ports,
        port_stats,
        extra_ports,
        os_matches,
        trace_hops,
    }
}

fn parse_port(port: Node) -> PortRecord {
    let (state, state_reason) = match child(port, "state") {
        Some(s) => (PortState::from_attr(s.attribute("state").unwrap_or("unknown")), attr_or(s, "reason", "")),
        None => (PortState::from_attr("unknown"), String::new()),
    };

    let service = child(port, "service");
    let svc = |name: &str, default: &str| service.map(|s| attr_or(s, name, default)).unwrap_or_else(|| default.to_string());

    PortRecord {
        protocol: attr_or(port, "protocol", "tcp"),
        port_number: numeric(port, "portid"),
        state,
        state_reason,
        service_name: svc("name", "unknown"),
        product: svc("product", ""),
        version: svc("version", ""),
        extra_info: svc("extrainfo", ""),
        detection_method: svc("method", ""),
        confidence: service.and_then(|s| numeric(s, "conf")).unwrap_or(0),
        scripts: children(port, "script")
            .map(|s| ScriptOutput { id: attr_or(s, "id", ""), output: attr_or(s, "output", "") })
            .collect(),
    }
}
