// ABOUTME: Line classifier and entry parser for known_hosts files
// ABOUTME: Splits each raw line into blank, comment, directive, malformed or a parsed host/key entry

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Opaque key identity: two entries share a key only if both the type and the
/// material match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId {
    pub key_type: String,
    pub material: String,
}

impl KeyId {
    pub fn new(key_type: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            key_type: key_type.into(),
            material: material.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub hosts: BTreeSet<String>,
    pub key: KeyId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Blank(String),
    Comment(String),
    /// Marker lines such as `@cert-authority` or `@revoked`.
    Directive(String),
    /// Looked like an entry but had too few fields to be one.
    Malformed(String),
    Entry(Entry),
}

impl Line {
    /// The untouched text of a line that does not take part in merging.
    pub fn passthrough_text(&self) -> Option<&str> {
        match self {
            Line::Blank(raw) | Line::Comment(raw) | Line::Directive(raw) | Line::Malformed(raw) => {
                Some(raw.as_str())
            }
            Line::Entry(_) => None,
        }
    }
}

pub fn read_known_hosts(path: &Path) -> Result<Vec<Line>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read known_hosts file: {}", path.display()))?;

    Ok(parse_known_hosts_content(&content))
}

pub fn parse_known_hosts_content(content: &str) -> Vec<Line> {
    content.lines().map(classify).collect()
}

pub fn classify(raw: &str) -> Line {
    let raw = raw.strip_suffix('\r').unwrap_or(raw);
    let line = raw.trim();

    if line.is_empty() {
        return Line::Blank(raw.to_string());
    }
    if line.starts_with('#') {
        return Line::Comment(raw.to_string());
    }
    if line.starts_with('@') {
        return Line::Directive(raw.to_string());
    }

    match parse_entry(line) {
        Some(entry) => Line::Entry(entry),
        None => Line::Malformed(raw.to_string()),
    }
}

/// Parses `<hosts-csv> <key-type> <key-material...>`. Everything after the key
/// type, including any trailing comment, is kept as opaque key material.
pub fn parse_entry(line: &str) -> Option<Entry> {
    let line = line.trim();
    let (hosts_part, rest) = split_field(line)?;
    let (key_type, material) = split_field(rest)?;
    if material.is_empty() {
        return None;
    }

    let hosts: BTreeSet<String> = hosts_part
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect();
    if hosts.is_empty() {
        return None;
    }

    Some(Entry {
        hosts,
        key: KeyId::new(key_type, material),
    })
}

fn split_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    let (field, rest) = s.split_at(end);
    Some((field, rest.trim()))
}
