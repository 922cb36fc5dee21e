//! nmap XML parsing and plain-text report generation.

mod error;
pub mod model;
mod parse;
mod render;

pub use error::ReportError;
pub use model::*;
pub use parse::{parse_document, parse_document_at};
pub use render::{format_port, render, CLOSED_DETAIL_MAX, FILTERED_LISTED, OS_MATCHES_SHOWN};

use std::path::Path;
use tracing::info;

/// Read and parse a document from disk. The path is recorded as the model's source.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ScanResult, ReportError> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path)
        .map_err(|source| ReportError::ReadFailure { path: path.to_path_buf(), source })?;
    let mut scan = parse_document(&xml)?;
    scan.meta.source = Some(path.display().to_string());
    Ok(scan)
}

/// Write rendered report text to `dest`, replacing any existing file.
pub fn write_report(text: &str, dest: impl AsRef<Path>) -> Result<(), ReportError> {
    let dest = dest.as_ref();
    std::fs::write(dest, text).map_err(|source| ReportError::IoFailure { path: dest.to_path_buf(), source })?;
    info!(path = %dest.display(), bytes = text.len(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nmap-report-{}-{}", std::process::id(), name))
    }

    #[test]
    fn parse_file_records_source() {
        let path = scratch("scan.xml");
        std::fs::write(&path, include_str!("../tests/fixtures/sample.xml")).unwrap();
        let scan = parse_file(&path).unwrap();
        assert_eq!(scan.meta.source.as_deref(), Some(path.display().to_string().as_str()));
        assert!(render(&scan).contains(&format!("XML File: {}", path.display())));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_read_failure() {
        let err = parse_file(scratch("does-not-exist.xml")).unwrap_err();
        assert!(matches!(err, ReportError::ReadFailure { .. }));
    }

    #[test]
    fn garbage_file_is_malformed() {
        let path = scratch("garbage.xml");
        std::fs::write(&path, "").unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(matches!(err, ReportError::MalformedDocument(_)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_report_round_trips_text() {
        let scan = parse_document("<nmaprun/>").unwrap();
        let text = render(&scan);
        let path = scratch("report.txt");
        write_report(&text, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unwritable_destination_is_io_failure() {
        let scan = parse_document("<nmaprun/>").unwrap();
        let text = render(&scan);
        let dest = scratch("no-such-dir").join("report.txt");
        match write_report(&text, &dest) {
            Err(ReportError::IoFailure { path, .. }) => assert_eq!(path, dest),
            other => panic!("expected IoFailure, got {:?}", other),
        }
        // report text is untouched and still usable
        assert!(text.contains("Total Hosts: 0"));
    }

    #[test]
    fn model_serialises_to_json() {
        let scan = parse_document(include_str!("../tests/fixtures/sample.xml")).unwrap();
        let v = serde_json::to_value(&scan).unwrap();
        assert_eq!(v["meta"]["version"], "7.94");
        assert_eq!(v["hosts"][0]["state"], "up");
        assert_eq!(v["hosts"][0]["ports"][0]["port_number"], 443);
        assert_eq!(v["hosts"][0]["ports"][4]["state"]["other"], "open|filtered");
        assert_eq!(v["hosts"][1]["address_kind"], "ipv6");
    }
}
