//! Core utilities shared by the report and stream modules and the CLI.

pub mod logging;

use time::macros::format_description;
use time::OffsetDateTime;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`, the layout used in report headers.
pub fn report_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| String::new())
}
