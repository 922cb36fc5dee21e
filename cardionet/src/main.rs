use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nmap_report::ScanResult;
use script_stream::{Completion, WriterSink};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Csv }

impl OutputFormat {
    fn from_config(s: &str) -> Option<Self> {
        match s {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cardionet", version, about = "nmap companion: readable scan reports and live output streaming")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./cardionet.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log verbosity on stderr (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Turn an nmap XML file (-oX) into a readable report
    Report {
        /// nmap XML output file
        xml: PathBuf,
        /// Also save the report here. A missing extension for the format is appended.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Output format: text report, JSON model, or CSV port table
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Do not print the report to stdout
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// List NSE scripts matching a pattern via `nmap --script-help`
    Scripts {
        /// Script name, category or glob (e.g. ftp-*, default)
        pattern: String,
    },
    /// Run nmap with the given arguments and stream its output
    Run {
        /// Arguments passed to nmap verbatim (use -- before them)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cardionet_core::logging::init(cli.verbose)?;
    let cfg = config::load_config(cli.config.as_deref()).unwrap_or_default();
    match cli.command {
        Commands::Version => {
            println!("cardionet {} (core {})", env!("CARGO_PKG_VERSION"), cardionet_core::version());
        }
        Commands::Report { xml, out, format, quiet } => {
            let format = format
                .or_else(|| cfg.report_format().and_then(OutputFormat::from_config))
                .unwrap_or(OutputFormat::Text);
            let scan = nmap_report::parse_file(&xml)?;
            let body = render_as(&scan, format)?;
            if !quiet {
                print!("{}", body);
            }
            if let Some(path) = out {
                let dest = destination(&path, format, cfg.out_dir());
                nmap_report::write_report(&body, &dest)?;
                eprintln!("Report saved to: {}", dest.display());
            }
        }
        Commands::Scripts { pattern } => {
            let args = vec!["--script-help".to_string(), pattern];
            let rt = tokio::runtime::Runtime::new()?;
            let (names, completion) = rt.block_on(stream_nmap(cfg.nmap_binary(), &args, true))?;
            println!();
            println!("scripts ({}):", names.len());
            for n in &names { println!("  {}", n); }
            check_exit(cfg.nmap_binary(), completion)?;
        }
        Commands::Run { args } => {
            let rt = tokio::runtime::Runtime::new()?;
            let (_, completion) = rt.block_on(stream_nmap(cfg.nmap_binary(), &args, false))?;
            check_exit(cfg.nmap_binary(), completion)?;
        }
    }
    Ok(())
}

fn render_as(scan: &ScanResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => nmap_report::render(scan),
        OutputFormat::Json => {
            let mut s = serde_json::to_string_pretty(scan)?;
            s.push('\n');
            s
        }
        OutputFormat::Csv => ports_csv(scan)?,
    })
}

/// One row per port across all hosts.
fn ports_csv(scan: &ScanResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["address","protocol","port","state","reason","service","product","version","extra_info"])?;
    for h in &scan.hosts {
        for p in &h.ports {
            let port = p.port_number.map(|n| n.to_string()).unwrap_or_default();
            wtr.write_record([
                h.address.as_str(),
                p.protocol.as_str(),
                port.as_str(),
                p.state.as_str(),
                p.state_reason.as_str(),
                p.service_name.as_str(),
                p.product.as_str(),
                p.version.as_str(),
                p.extra_info.as_str(),
            ])?;
        }
    }
    let bytes = wtr.into_inner().map_err(|e| anyhow!("csv flush failed: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

/// Resolve where a saved report goes: relative paths land in `out_dir` when configured,
/// and the format's extension is appended unless already present.
fn destination(path: &Path, format: OutputFormat, out_dir: Option<&Path>) -> PathBuf {
    let ext = format.extension();
    let base = match out_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    if base.extension().map_or(false, |e| e == ext) {
        return base;
    }
    let mut s = base.into_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn check_exit(binary: &str, completion: Completion) -> Result<()> {
    match completion {
        Completion::Exited(0) => Ok(()),
        Completion::Exited(code) => Err(anyhow!("{} exited with status {}", binary, code)),
        Completion::Cancelled => Err(anyhow!("{} was interrupted", binary)),
    }
}

/// Spawn nmap, stream its stdout and stderr to our stdout, and hand back any script names found.
async fn stream_nmap(binary: &str, args: &[String], classify: bool) -> Result<(Vec<String>, Completion)> {
    info!(binary, ?args, "starting nmap");
    let mut child = Command::new(binary)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {}", binary))?;
    let stdout = child.stdout.take().ok_or_else(|| anyhow!("{} stdout was not captured", binary))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("{} stderr was not captured", binary))?;
    let reader = script_stream::merge_lines(BufReader::new(stdout), BufReader::new(stderr));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut sink = WriterSink::new(std::io::stdout());
    let (names, completion) = if classify {
        let listing = script_stream::collect_script_names(reader, &mut sink, exit_code(&mut child), &cancel).await;
        (listing.names, listing.completion)
    } else {
        let outcome = script_stream::forward_lines(reader, &mut sink, exit_code(&mut child), &cancel).await;
        (Vec::new(), outcome.completion)
    };

    if completion == Completion::Cancelled {
        if let Err(e) = child.kill().await {
            warn!(error = %e, "could not kill {}", binary);
        }
    }
    Ok((names, completion))
}

async fn exit_code(child: &mut Child) -> Option<i32> {
    match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "waiting for child failed");
            None
        }
    }
}
