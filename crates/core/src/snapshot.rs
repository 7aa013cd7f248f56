//! Snapshot persistence for the sandbox.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{io::SyncData, resource::Reservoir};

/// Metadata describing a snapshot on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Absolute path to the snapshot file.
    pub path: PathBuf,
    /// Human readable name.
    pub name: String,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
}

/// Everything needed to rebuild the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxState {
    /// The port's contribution to the shared sync blob.
    #[serde(default)]
    pub port: SyncData,
    /// Whether the structure was assembled.
    pub assembled: bool,
    /// Whether the port was attached to the structure.
    #[serde(default = "default_attached")]
    pub attached: bool,
    /// Structure reservoir contents.
    pub reservoir: Reservoir,
    /// Neighbor tank, `None` when the neighbor cell was empty.
    #[serde(default)]
    pub neighbor: Option<Reservoir>,
}

fn default_attached() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile {
    name: String,
    saved_at: DateTime<Utc>,
    state: SandboxState,
}

/// Reads and writes snapshot files in one directory.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the store writes to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All readable snapshots, most recent first.
    pub fn entries(&self) -> Result<Vec<SnapshotEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root).context("failed to read snapshot directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match read_file(&entry.path()) {
                Ok(file) => entries.push(SnapshotEntry {
                    path: entry.path(),
                    name: file.name,
                    saved_at: file.saved_at,
                }),
                Err(err) => {
                    warn!("Failed to read snapshot {:?}: {err}", entry.path());
                }
            }
        }

        entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(entries)
    }

    /// Write `state` as a new snapshot.
    pub fn create(&self, name: Option<&str>, state: &SandboxState) -> Result<SnapshotEntry> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;

        let saved_at = Utc::now();
        let name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("snapshot {}", saved_at.format("%Y-%m-%d %H:%M:%S")));
        let file_name = format!(
            "{}_{}.json",
            sanitize_component(&name),
            saved_at.format("%Y%m%d%H%M%S%3f")
        );
        let path = self.root.join(file_name);
        let file = SnapshotFile {
            name,
            saved_at,
            state: state.clone(),
        };
        let serialised = serde_json::to_vec_pretty(&file)?;
        fs::write(&path, serialised)
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(SnapshotEntry {
            path,
            name: file.name,
            saved_at,
        })
    }

    /// Load the state stored in `entry`.
    pub fn load(&self, entry: &SnapshotEntry) -> Result<SandboxState> {
        Ok(read_file(&entry.path)?.state)
    }

    /// Most recent snapshot, if any.
    pub fn latest(&self) -> Result<Option<SnapshotEntry>> {
        Ok(self.entries()?.into_iter().next())
    }
}

fn read_file(path: &Path) -> Result<SnapshotFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(file)
}

fn sanitize_component(input: &str) -> String {
    let result: String = input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect();
    if result.is_empty() {
        "snapshot".to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io::IoDirection,
        port::DIRECTION_KEY,
        resource::{PortKind, ResourceStack},
    };
    use tempfile::tempdir;

    fn sample_state() -> SandboxState {
        let mut port = SyncData::new();
        IoDirection::write(&mut port, DIRECTION_KEY, IoDirection::Output);
        SandboxState {
            port,
            assembled: true,
            attached: true,
            reservoir: Reservoir::with_contents(PortKind::Gas, 1_000, ResourceStack::new("steam", 640)),
            neighbor: Some(Reservoir::new(PortKind::Gas, 500)),
        }
    }

    #[test]
    fn snapshot_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path().join("snapshots"));
        assert!(store.entries()?.is_empty());
        assert!(store.latest()?.is_none());

        let state = sample_state();
        let entry = store.create(Some("  Before break  "), &state)?;
        assert!(entry.path.exists());
        assert_eq!(entry.name, "Before break");

        let entries = store.entries()?;
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load(&entries[0])?, state);

        let latest = store.latest()?.expect("expected latest entry");
        assert_eq!(latest.name, "Before break");
        Ok(())
    }

    #[test]
    fn unreadable_files_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());
        fs::write(dir.path().join("broken.json"), "{ not json")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;
        store.create(None, &sample_state())?;

        let entries = store.entries()?;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].name.starts_with("snapshot "));
        Ok(())
    }

    #[test]
    fn sanitize_creates_safe_filenames() {
        assert_eq!(sanitize_component("Before break!* ??"), "Beforebreak");
        assert_eq!(sanitize_component("***"), "snapshot");
    }
}
