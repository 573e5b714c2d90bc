// ABOUTME: Output modes for a delinted known_hosts file: emit to stdout, unified diff, or apply in place
// ABOUTME: Applying writes a temporary file beside the target and renames it over the original

use crate::config::Mode;
use crate::delint::{DelintOptions, normalize};
use crate::ssh::{parse_known_hosts_content, read_known_hosts};
use anyhow::{Context, Result};
use similar::TextDiff;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Runs `mode` against `path` and returns the process exit status.
pub fn run(mode: Mode, path: &Path, options: &DelintOptions) -> Result<i32> {
    tracing::debug!("Running {mode:?} on {}", path.display());

    match mode {
        Mode::Emit => {
            let stdout = std::io::stdout();
            emit(path, options, &mut stdout.lock())?;
            Ok(0)
        }
        Mode::Diff => {
            let stdout = std::io::stdout();
            let changed = diff(path, options, &mut stdout.lock())?;
            Ok(i32::from(changed))
        }
        Mode::Apply => {
            apply(path, options)?;
            Ok(0)
        }
    }
}

pub fn emit<W: Write>(path: &Path, options: &DelintOptions, out: &mut W) -> Result<()> {
    let lines = read_known_hosts(path)?;
    let normalized = normalize(lines, options);
    tracing::debug!(
        "Emitting {} passthrough lines and {} records",
        normalized.stats.passthrough,
        normalized.stats.records
    );
    normalized.write_to(out)
}

/// Writes a unified diff between the file and its normalized form. Returns
/// whether any diff output was produced.
pub fn diff<W: Write>(path: &Path, options: &DelintOptions, out: &mut W) -> Result<bool> {
    let (original, normalized) = load_and_normalize(path, options)?;
    let patch = unified_diff(&original, &normalized);
    if patch.is_empty() {
        return Ok(false);
    }

    out.write_all(patch.as_bytes())
        .context("Failed to write diff")?;
    out.flush().context("Failed to flush diff")?;
    Ok(true)
}

pub fn unified_diff(old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header("old_known_hosts", "new_known_hosts")
        .to_string()
}

/// Rewrites the file with its normalized form. Returns whether the file was
/// replaced; an already normalized file is left untouched.
pub fn apply(path: &Path, options: &DelintOptions) -> Result<bool> {
    let (original, normalized) = load_and_normalize(path, options)?;
    if original == normalized {
        tracing::info!("{} is already normalized", path.display());
        return Ok(false);
    }

    replace_atomically(path, |file| {
        file.write_all(normalized.as_bytes())
            .context("Failed to write normalized known_hosts")
    })?;
    tracing::info!(
        bytes = normalized.len(),
        "Replaced {}",
        path.display()
    );
    Ok(true)
}

fn load_and_normalize(path: &Path, options: &DelintOptions) -> Result<(String, String)> {
    let original = fs::read_to_string(path)
        .with_context(|| format!("Failed to read known_hosts file: {}", path.display()))?;
    let normalized = normalize(parse_known_hosts_content(&original), options).render();
    Ok((original, normalized))
}

/// Replaces `path` with whatever `write` produces. The content goes to a
/// temporary file in the same directory which is renamed over the target only
/// once fully written and synced. On any error the temporary file is removed
/// and the target is left as it was.
pub fn replace_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    // Replace the file a symlink points at, not the link itself.
    let target: PathBuf = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut temp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temporary file in: {}", dir.display()))?;
    tracing::debug!("Writing to temporary file {}", temp.path().display());

    write(temp.as_file_mut())?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync temporary file: {}", temp.path().display()))?;

    if let Ok(metadata) = fs::metadata(&target) {
        fs::set_permissions(temp.path(), metadata.permissions()).with_context(|| {
            format!("Failed to copy permissions from: {}", target.display())
        })?;
    }

    temp.persist(&target)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace file: {}", target.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const MESSY: &str = "10.0.0.1 ssh-rsa FOO\n# keep me\nhost1 ssh-rsa FOO\n";
    const CLEAN: &str = "# keep me\nhost1,10.0.0.1 ssh-rsa FOO\n";

    fn known_hosts(temp_dir: &TempDir, content: &str) -> PathBuf {
        let path = temp_dir.path().join("known_hosts");
        fs::write(&path, content).unwrap();
        path
    }

    fn dir_entries(temp_dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_emit_writes_normalized_and_leaves_input() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, MESSY);

        let mut out = Vec::new();
        emit(&path, &DelintOptions::default(), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), CLEAN);
        assert_eq!(fs::read_to_string(&path).unwrap(), MESSY);
    }

    #[test]
    fn test_emit_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        let result = emit(&temp_dir.path().join("nope"), &DelintOptions::default(), &mut out);

        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_diff_on_normalized_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, CLEAN);

        let mut out = Vec::new();
        let changed = diff(&path, &DelintOptions::default(), &mut out).unwrap();

        assert!(!changed);
        assert!(out.is_empty());
        assert_eq!(run(Mode::Diff, &path, &DelintOptions::default()).unwrap(), 0);
    }

    #[test]
    fn test_diff_reports_changes() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, MESSY);

        let mut out = Vec::new();
        let changed = diff(&path, &DelintOptions::default(), &mut out).unwrap();
        let patch = String::from_utf8(out).unwrap();

        assert!(changed);
        assert!(patch.starts_with("--- old_known_hosts\n+++ new_known_hosts\n"));
        assert!(patch.contains("-10.0.0.1 ssh-rsa FOO\n"));
        assert!(patch.contains("+host1,10.0.0.1 ssh-rsa FOO\n"));
        assert_eq!(fs::read_to_string(&path).unwrap(), MESSY);
    }

    #[test]
    fn test_unified_diff_identical_is_empty() {
        assert_eq!(unified_diff(CLEAN, CLEAN), "");
        assert!(!unified_diff(MESSY, CLEAN).is_empty());
    }

    #[test]
    fn test_apply_replaces_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, MESSY);

        assert!(apply(&path, &DelintOptions::default()).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), CLEAN);
        assert_eq!(dir_entries(&temp_dir), vec!["known_hosts"]);

        // Second run finds nothing to do.
        assert!(!apply(&path, &DelintOptions::default()).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), CLEAN);
    }

    #[test]
    fn test_apply_preserves_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, MESSY);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        apply(&path, &DelintOptions::default()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_apply_through_symlink_keeps_link() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real_known_hosts");
        fs::write(&real, MESSY).unwrap();
        let link = temp_dir.path().join("known_hosts");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        apply(&link, &DelintOptions::default()).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), CLEAN);
    }

    #[test]
    fn test_failed_write_leaves_original_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, MESSY);

        let result = replace_atomically(&path, |file| {
            file.write_all(b"host1 ssh-rsa")?;
            anyhow::bail!("disk full")
        });

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("disk full"));
        assert_eq!(fs::read_to_string(&path).unwrap(), MESSY);
        assert_eq!(dir_entries(&temp_dir), vec!["known_hosts"]);
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a regular file.
        let target = temp_dir.path().join("known_hosts");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), "x").unwrap();

        let result = replace_atomically(&target, |file| {
            file.write_all(CLEAN.as_bytes())?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(target.is_dir());
        assert_eq!(dir_entries(&temp_dir), vec!["known_hosts"]);
    }

    #[test]
    fn test_replace_creates_missing_target() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fresh");

        replace_atomically(&path, |file| {
            file.write_all(CLEAN.as_bytes())?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), CLEAN);
    }

    #[test]
    fn test_run_exit_codes() {
        let temp_dir = TempDir::new().unwrap();
        let path = known_hosts(&temp_dir, MESSY);

        assert_eq!(run(Mode::Apply, &path, &DelintOptions::default()).unwrap(), 0);
        assert_eq!(run(Mode::Diff, &path, &DelintOptions::default()).unwrap(), 0);
        assert!(run(Mode::Emit, &temp_dir.path().join("missing"), &DelintOptions::default()).is_err());
    }
}
