// ABOUTME: known_hosts parsing, merging and formatting module
// ABOUTME: Turns raw file lines into merged, deterministically ordered host/key records

pub mod format;
pub mod merge;
pub mod parser;

pub use format::{Record, sorted_records};
pub use merge::MergeIndex;
pub use parser::{Line, parse_known_hosts_content, read_known_hosts};
