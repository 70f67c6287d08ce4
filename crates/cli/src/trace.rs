//! JSON-lines driver traces
//!
//! One JSON object per line, tagged by `op`:
//!
//! ```text
//! {"op": "create", "path": "test_file"}
//! {"op": "write", "path": "test_file"}
//! {"op": "rename", "path": "test_file", "to": "best_file", "replace": false}
//! {"op": "remove", "path": "best_file", "type": "file"}
//! {"op": "mark", "name": "before"}
//! {"op": "commit", "from": "aa..", "to": "bb.."}
//! {"op": "remount"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use ml_core::Dtype;
use serde::Deserialize;
use std::io::BufRead;
use watcher::WatchEvent;

/// File kind as written in traces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    File,
    Dir,
    Symlink,
}

impl From<FileKind> for Dtype {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::File => Dtype::Regular,
            FileKind::Dir => Dtype::Directory,
            FileKind::Symlink => Dtype::Symlink,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceLine {
    Create {
        path: String,
        #[serde(default, rename = "type")]
        kind: FileKind,
    },
    Write {
        path: String,
        #[serde(default, rename = "type")]
        kind: FileKind,
    },
    Remove {
        path: String,
        #[serde(default, rename = "type")]
        kind: FileKind,
    },
    Rename {
        path: String,
        to: Option<String>,
        #[serde(default, rename = "type")]
        kind: FileKind,
        /// Destination existed and was clobbered
        #[serde(default)]
        replace: bool,
    },
    /// Unmount and mount the checkout again
    Remount,
    /// Remember the current position under a name
    Mark { name: String },
    /// Record a commit transition (hex commit ids)
    Commit { from: String, to: String },
}

impl TraceLine {
    /// The driver event this line stands for, if any
    pub fn to_event(&self) -> Option<WatchEvent> {
        match self {
            TraceLine::Create { path, kind } => Some(WatchEvent::create((*kind).into(), path.as_str())),
            TraceLine::Write { path, kind } => Some(WatchEvent::write((*kind).into(), path.as_str())),
            TraceLine::Remove { path, kind } => Some(WatchEvent::remove((*kind).into(), path.as_str())),
            TraceLine::Rename {
                path,
                to,
                kind,
                replace,
            } => {
                let mut event = WatchEvent::rename((*kind).into(), path.as_str(), "", *replace);
                event.dest = to.as_deref().map(Into::into);
                Some(event)
            }
            TraceLine::Remount | TraceLine::Mark { .. } | TraceLine::Commit { .. } => None,
        }
    }
}

/// Parse a whole trace
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceLine>> {
    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read trace line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid trace line {}: {}", index + 1, trimmed))?;
        lines.push(parsed);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_core::RawPath;
    use watcher::EventKind;

    #[test]
    fn test_parse_ops() {
        let text = r#"
# setup
{"op": "create", "path": "test_file"}
{"op": "rename", "path": "a", "to": "b", "type": "dir", "replace": true}
{"op": "mark", "name": "m1"}
{"op": "remount"}
"#;
        let lines = parse_trace(text.as_bytes()).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            TraceLine::Create {
                path: "test_file".to_string(),
                kind: FileKind::File
            }
        );
        assert_eq!(lines[2], TraceLine::Mark { name: "m1".to_string() });
        assert_eq!(lines[3], TraceLine::Remount);

        let event = lines[1].to_event().unwrap();
        assert_eq!(event.kind, EventKind::Rename);
        assert_eq!(event.file_type, Dtype::Directory);
        assert_eq!(event.dest, Some(RawPath::from("b")));
        assert!(event.dest_existed);
    }

    #[test]
    fn test_rename_without_destination() {
        let lines = parse_trace(r#"{"op": "rename", "path": "a"}"#.as_bytes()).unwrap();
        assert_eq!(lines[0].to_event().unwrap().dest, None);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = parse_trace("{\"op\": \"create\", \"path\": \"a\"}\n{\"op\": \"explode\"}\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
