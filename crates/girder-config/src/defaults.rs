//! Default values for the runtime configuration.

use crate::compat::{HeaderCompat, PositionEncoding};
use crate::logging::LogFormat;

/// Default capacity of the framer's read buffer in bytes.
///
/// Bounds the largest admissible message; one megabyte comfortably holds
/// any text-sync payload an editor sends in practice.
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 1 << 20;

/// Default reactor idle interval in milliseconds.
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 50;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default header matching mode.
pub fn default_header_compat() -> HeaderCompat {
    HeaderCompat::Strict
}

/// Default position column interpretation.
pub fn default_position_encoding() -> PositionEncoding {
    PositionEncoding::Utf8ByteOffset
}
