//! Line-by-line streaming of an external process's output.
//!
//! Lines are forwarded to a [`LineSink`] as they arrive and never buffered
//! beyond the one being handled. [`collect_script_names`] additionally runs
//! each line through a [`ScriptClassifier`].

mod classifier;
mod merge;
mod sink;

pub use classifier::{ScriptClassifier, CATEGORIES_MARKER, MAX_SCRIPT_NAMES};
pub use merge::merge_lines;
pub use sink::{completion_marker, LineSink, WriterSink};

use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The source closed and the process reported this exit code.
    Exited(i32),
    /// The caller cancelled, the read failed, or the process left no exit code.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub lines: usize,
    pub completion: Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptListing {
    /// At most [`MAX_SCRIPT_NAMES`], in discovery order.
    pub names: Vec<String>,
    pub lines: usize,
    pub completion: Completion,
}

/// Forward every line of `reader` to `sink`, then report the exit code from `exit`.
///
/// `exit` resolves once the process has exited; `None` means there is no
/// status to report (killed, or waiting failed) and is treated as cancellation.
pub async fn forward_lines<R, S, F>(reader: R, sink: &mut S, exit: F, cancel: &CancellationToken) -> StreamOutcome
where
    R: AsyncBufRead + Unpin,
    S: LineSink + ?Sized,
    F: Future<Output = Option<i32>>,
{
    drive(reader, sink, exit, cancel, |_| {}).await
}

/// Like [`forward_lines`], also collecting script names from `nmap --script-help` output.
pub async fn collect_script_names<R, S, F>(reader: R, sink: &mut S, exit: F, cancel: &CancellationToken) -> ScriptListing
where
    R: AsyncBufRead + Unpin,
    S: LineSink + ?Sized,
    F: Future<Output = Option<i32>>,
{
    let mut classifier = ScriptClassifier::new();
    let outcome = drive(reader, sink, exit, cancel, |line| {
        if classifier.observe(line) {
            debug!(count = classifier.names().len(), "script name collected");
        }
    })
    .await;
    let names = classifier.into_names();
    info!(names = names.len(), lines = outcome.lines, "script listing finished");
    ScriptListing { names, lines: outcome.lines, completion: outcome.completion }
}

async fn drive<R, S, F>(
    mut reader: R,
    sink: &mut S,
    exit: F,
    cancel: &CancellationToken,
    mut on_line: impl FnMut(&str),
) -> StreamOutcome
where
    R: AsyncBufRead + Unpin,
    S: LineSink + ?Sized,
    F: Future<Output = Option<i32>>,
{
    let mut buf = Vec::new();
    let mut lines = 0usize;
    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(lines, "stream abandoned by caller");
                return StreamOutcome { lines, completion: Completion::Cancelled };
            }
            r = reader.read_until(b'\n', &mut buf) => r,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                sink.line(&line);
                on_line(&line);
                lines += 1;
                // let the sink's consumer run between lines of a fast producer
                tokio::task::yield_now().await;
            }
            Err(e) => {
                warn!(error = %e, lines, "reading process output failed");
                return StreamOutcome { lines, completion: Completion::Cancelled };
            }
        }
    }

    let code = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        code = exit => code,
    };
    match code {
        Some(code) => {
            sink.finished(code);
            info!(code, lines, "process finished");
            StreamOutcome { lines, completion: Completion::Exited(code) }
        }
        None => {
            warn!(lines, "output closed without an exit status");
            StreamOutcome { lines, completion: Completion::Cancelled }
        }
    }
}

/// Strip the line terminator; invalid UTF-8 is replaced rather than rejected.
fn decode_line(buf: &[u8]) -> String {
    let mut bytes = buf;
    if let Some(rest) = bytes.strip_suffix(b"\n") {
        bytes = rest;
    }
    if let Some(rest) = bytes.strip_suffix(b"\r") {
        bytes = rest;
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    async fn exited(code: i32) -> Option<i32> {
        Some(code)
    }

    #[tokio::test]
    async fn forwards_every_line_then_marker() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let input: &[u8] = b"Starting Nmap\r\n\n  indented  \nlast line without newline";
        let out = forward_lines(input, &mut sink, exited(0), &cancel).await;
        assert_eq!(out, StreamOutcome { lines: 4, completion: Completion::Exited(0) });
        assert_eq!(
            sink,
            vec!["Starting Nmap", "", "  indented  ", "last line without newline", "Process finished with code 0"]
        );
    }

    #[tokio::test]
    async fn collects_names_from_listing() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let input: &[u8] = b"alpha\nCategories: x\nbeta\nCategories: y\n";
        let listing = collect_script_names(input, &mut sink, exited(0), &cancel).await;
        assert_eq!(listing.names, vec!["alpha", "beta"]);
        assert_eq!(listing.lines, 4);
        assert_eq!(listing.completion, Completion::Exited(0));
        assert_eq!(sink.len(), 5);
        assert_eq!(sink[..4], ["alpha", "Categories: x", "beta", "Categories: y"]);
    }

    #[tokio::test]
    async fn names_capped_at_limit() {
        let text: String = (0..30).map(|i| format!("script-{}\nCategories: safe\n", i)).collect();
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let listing = collect_script_names(text.as_bytes(), &mut sink, exited(0), &cancel).await;
        assert_eq!(listing.names.len(), MAX_SCRIPT_NAMES);
        // every line still reaches the sink
        assert_eq!(listing.lines, 60);
        assert_eq!(sink.len(), 61);
    }

    #[tokio::test]
    async fn leading_marker_not_collected() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let input: &[u8] = b"Categories: default\n";
        let listing = collect_script_names(input, &mut sink, exited(0), &cancel).await;
        assert!(listing.names.is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let input: &[u8] = b"Failed to resolve \"nowhere\".\n";
        let out = forward_lines(input, &mut sink, exited(1), &cancel).await;
        assert_eq!(out.completion, Completion::Exited(1));
        assert_eq!(sink.last().map(String::as_str), Some("Process finished with code 1"));
    }

    #[tokio::test]
    async fn missing_exit_status_is_cancellation() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let input: &[u8] = b"partial\n";
        let out = forward_lines(input, &mut sink, async { None }, &cancel).await;
        assert_eq!(out, StreamOutcome { lines: 1, completion: Completion::Cancelled });
        assert_eq!(sink, vec!["partial"]);
    }

    #[tokio::test]
    async fn cancelled_before_start_emits_nothing() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let input: &[u8] = b"alpha\nCategories: x\n";
        let listing = collect_script_names(input, &mut sink, exited(0), &cancel).await;
        assert_eq!(listing.completion, Completion::Cancelled);
        assert!(listing.names.is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn cancel_while_waiting_for_exit() {
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let input: &[u8] = b"done\n";
        let exit = async move {
            trigger.cancel();
            std::future::pending::<Option<i32>>().await
        };
        let out = forward_lines(input, &mut sink, exit, &cancel).await;
        assert_eq!(out.completion, Completion::Cancelled);
        assert_eq!(sink, vec!["done"]);
    }

    #[tokio::test]
    async fn cancel_open_stream() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let producer = tokio::spawn(async move {
            tx.write_all(b"alpha\nCategories: x\n").await.unwrap();
            trigger.cancel();
            // keep the pipe open so only cancellation can end the stream
            std::future::pending::<()>().await;
        });
        let mut sink: Vec<String> = Vec::new();
        let listing = collect_script_names(BufReader::new(rx), &mut sink, exited(0), &cancel).await;
        assert_eq!(listing.completion, Completion::Cancelled);
        assert!(!sink.iter().any(|l| l.starts_with("Process finished")));
        producer.abort();
    }

    #[tokio::test]
    async fn stderr_lines_reach_sink_and_classifier() {
        let stdout: &'static [u8] = b"";
        let stderr: &'static [u8] = b"ftp-anon\nCategories: default auth safe\n";
        let mut sink: Vec<String> = Vec::new();
        let cancel = CancellationToken::new();
        let listing = collect_script_names(merge_lines(stdout, stderr), &mut sink, exited(0), &cancel).await;
        assert_eq!(listing.names, vec!["ftp-anon"]);
        assert_eq!(listing.lines, 2);
        assert_eq!(sink, vec!["ftp-anon", "Categories: default auth safe", "Process finished with code 0"]);
    }

    #[test]
    fn decode_strips_terminators_only() {
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b" abc \n"), " abc ");
        assert_eq!(decode_line(b"abc"), "abc");
        assert_eq!(decode_line(b"\xffabc\n"), "\u{fffd}abc");
    }
}
