use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The input is not well-formed XML; no partial model is produced.
    #[error("malformed scan document: {0}")]
    MalformedDocument(#[from] roxmltree::Error),
    #[error("failed to read {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Writing the rendered report failed. The text itself is still valid.
    #[error("failed to write report to {}: {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
