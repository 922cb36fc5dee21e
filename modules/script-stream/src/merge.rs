//! Interleave two output pipes into one line stream.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Mutex;
use tracing::debug;

const MERGE_BUFFER: usize = 64 * 1024;

/// Combine `a` and `b` into a single reader of whole lines in arrival order.
///
/// Each source keeps its own line order; a final line missing its newline
/// gets one so it cannot run into the other source's next line. The result
/// reaches EOF once both sources are exhausted. Must be called inside a
/// tokio runtime.
pub fn merge_lines<A, B>(a: A, b: B) -> BufReader<DuplexStream>
where
    A: AsyncBufRead + Unpin + Send + 'static,
    B: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = tokio::io::duplex(MERGE_BUFFER);
    let tx = Arc::new(Mutex::new(tx));
    tokio::spawn(pump(a, Arc::clone(&tx)));
    tokio::spawn(pump(b, tx));
    BufReader::new(rx)
}

async fn pump<R>(mut reader: R, out: Arc<Mutex<DuplexStream>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if !buf.ends_with(b"\n") {
                    buf.push(b'\n');
                }
                if let Err(e) = out.lock().await.write_all(&buf).await {
                    debug!(error = %e, "merged stream closed by reader");
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "source pipe failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(mut reader: BufReader<DuplexStream>) -> Vec<String> {
        let mut out = Vec::new();
        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap() > 0 {
            out.push(line.trim_end_matches('\n').to_string());
            line.clear();
        }
        out
    }

    #[tokio::test]
    async fn both_sources_arrive_whole() {
        let stdout: &'static [u8] = b"Starting Nmap\nNmap done\n";
        let stderr: &'static [u8] = b"Failed to resolve \"nowhere\".\n";
        let lines = read_all(merge_lines(stdout, stderr)).await;
        assert_eq!(lines.len(), 3);
        assert!(lines.contains(&"Failed to resolve \"nowhere\".".to_string()));
        let start = lines.iter().position(|l| l == "Starting Nmap").unwrap();
        let done = lines.iter().position(|l| l == "Nmap done").unwrap();
        assert!(start < done);
    }

    #[tokio::test]
    async fn unterminated_tail_stays_separate() {
        let stdout: &'static [u8] = b"alpha";
        let stderr: &'static [u8] = b"beta";
        let mut lines = read_all(merge_lines(stdout, stderr)).await;
        lines.sort();
        assert_eq!(lines, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn empty_sources_end_immediately() {
        let none: &'static [u8] = b"";
        assert!(read_all(merge_lines(none, none)).await.is_empty());
    }
}
