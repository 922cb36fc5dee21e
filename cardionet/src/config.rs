use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG: &str = "cardionet.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct NmapConfig {
    /// nmap executable; defaults to `nmap` on PATH.
    pub binary: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ReportConfig {
    pub format: Option<String>,
    /// Directory for relative `--out` destinations.
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub nmap: Option<NmapConfig>,
    pub report: Option<ReportConfig>,
}

impl Config {
    pub fn nmap_binary(&self) -> &str {
        self.nmap.as_ref().and_then(|n| n.binary.as_deref()).unwrap_or("nmap")
    }

    pub fn report_format(&self) -> Option<&str> {
        self.report.as_ref().and_then(|r| r.format.as_deref())
    }

    pub fn out_dir(&self) -> Option<&Path> {
        self.report.as_ref().and_then(|r| r.out_dir.as_deref())
    }
}

pub fn parse_config(s: &str) -> Option<Config> {
    match serde_yaml::from_str(s) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(error = %e, "ignoring unparsable config");
            None
        }
    }
}

/// Load `path`, or `./cardionet.yaml` when no path is given and the file exists.
pub fn load_config(path: Option<&Path>) -> Option<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return None; }
        }
    };
    debug!(path = %path.display(), "loading config");
    let s = fs::read_to_string(&path).ok()?;
    parse_config(&s)
}
