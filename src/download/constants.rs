//! Constants for the download module (timeouts, filename length).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Longest filename kept after sanitization, in bytes (below `NAME_MAX`).
pub const MAX_FILENAME_BYTES: usize = 200;

/// Longest suffix still treated as an extension when truncating a filename.
pub const MAX_EXTENSION_BYTES: usize = 16;
