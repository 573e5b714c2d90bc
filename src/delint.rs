// ABOUTME: The delint pipeline: classified lines in, passthrough lines and sorted records out
// ABOUTME: Coordinates merging, optional transitive closure and ordering in a testable way

use crate::config::{DelintConfig, NonEntryLines};
use crate::ssh::{Line, MergeIndex, Record, sorted_records};
use anyhow::{Context, Result};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelintOptions {
    pub transitive: bool,
    pub non_entry_lines: NonEntryLines,
}

impl From<&DelintConfig> for DelintOptions {
    fn from(config: &DelintConfig) -> Self {
        Self {
            transitive: config.transitive,
            non_entry_lines: config.non_entry_lines,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelintStats {
    pub lines: usize,
    pub entries: usize,
    pub passthrough: usize,
    pub dropped: usize,
    pub keys: usize,
    pub records: usize,
    pub closure_passes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub passthrough: Vec<String>,
    pub records: Vec<Record>,
    pub stats: DelintStats,
}

pub fn normalize(lines: Vec<Line>, options: &DelintOptions) -> Normalized {
    let mut stats = DelintStats {
        lines: lines.len(),
        ..DelintStats::default()
    };
    let mut entries = Vec::new();
    let mut passthrough = Vec::new();

    for line in lines {
        match line {
            Line::Entry(entry) => entries.push(entry),
            other => {
                if let Line::Malformed(raw) = &other {
                    tracing::debug!("Passing through malformed line: {raw}");
                }
                match options.non_entry_lines {
                    NonEntryLines::Preserve => {
                        if let Some(text) = other.passthrough_text() {
                            passthrough.push(text.to_string());
                        }
                    }
                    NonEntryLines::Drop => stats.dropped += 1,
                }
            }
        }
    }
    stats.entries = entries.len();
    stats.passthrough = passthrough.len();

    let mut index = MergeIndex::merge(&entries);
    stats.keys = index.key_count();
    if options.transitive {
        stats.closure_passes = index.close();
    }

    let records = sorted_records(&index);
    stats.records = records.len();

    tracing::info!(
        lines = stats.lines,
        entries = stats.entries,
        passthrough = stats.passthrough,
        dropped = stats.dropped,
        keys = stats.keys,
        closure_passes = stats.closure_passes,
        records = stats.records,
        "Merged known_hosts entries"
    );

    Normalized {
        passthrough,
        records,
        stats,
    }
}

impl Normalized {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.passthrough {
            out.push_str(line);
            out.push('\n');
        }
        for record in &self.records {
            out.push_str(&record.render());
        }
        out
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for line in &self.passthrough {
            writeln!(out, "{line}").context("Failed to write output")?;
        }
        for record in &self.records {
            out.write_all(record.render().as_bytes())
                .context("Failed to write output")?;
        }
        out.flush().context("Failed to flush output")
    }
}
