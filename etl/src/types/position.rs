use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Offset of the first event in every binlog file, right after the magic header.
pub const BINLOG_HEADER_SIZE: u64 = 4;

/// A position in the source binlog: a file name and a byte offset within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinlogPosition {
    pub log_file: String,
    pub log_position: u64,
}

/// The durable form of a [`BinlogPosition`].
pub type Checkpoint = BinlogPosition;

impl BinlogPosition {
    pub fn new(log_file: impl Into<String>, log_position: u64) -> Self {
        Self {
            log_file: log_file.into(),
            log_position,
        }
    }

    /// Returns the sequence number suffix of the binlog file name.
    ///
    /// Binlog files are named like `mysql-bin.000123`, the suffix increases with every
    /// rotation. Returns [`None`] when the name has no numeric suffix.
    pub fn file_sequence(&self) -> Option<u64> {
        parse_binlog_file_sequence(&self.log_file)
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_file, self.log_position)
    }
}

impl Ord for BinlogPosition {
    /// Orders by file sequence first, then by offset within the file.
    fn cmp(&self, other: &Self) -> Ordering {
        self.file_sequence()
            .cmp(&other.file_sequence())
            .then_with(|| self.log_file.cmp(&other.log_file))
            .then_with(|| self.log_position.cmp(&other.log_position))
    }
}

impl PartialOrd for BinlogPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parses the numeric suffix of a binlog file name, e.g. `123` from `binlog.000123`.
pub fn parse_binlog_file_sequence(file_name: &str) -> Option<u64> {
    let (_, suffix) = file_name.rsplit_once('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    suffix.parse().ok()
}
