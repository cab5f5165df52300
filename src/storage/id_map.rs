//! Temporary ID map file
//!
//! Hands resolved temporary IDs from one pipeline stage to the next. The map
//! is stored as a pretty-printed JSON object:
//!
//! ```json
//! { "aw_0a1b2c3d4e5f": { "repo": "octo/app", "number": 42 } }
//! ```
//!
//! Reads take a shared lock; writes go to a locked temp file and are
//! renamed into place.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use crate::domain::ResolvedMap;

/// File holding a serialized temporary ID map
pub struct IdMapFile {
    path: PathBuf,
}

impl IdMapFile {
    /// Creates a handle for the map file at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the map file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the map; a missing or empty file is an empty map
    pub fn read(&self) -> Result<ResolvedMap> {
        if !self.path.exists() {
            return Ok(ResolvedMap::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open id map: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on id map")?;

        if file.metadata().map(|m| m.len() == 0).unwrap_or(false) {
            return Ok(ResolvedMap::new());
        }

        let map = serde_json::from_reader(BufReader::new(&file))
            .with_context(|| format!("Failed to parse id map: {}", self.path.display()))?;

        Ok(map)
    }

    /// Writes the map (full rewrite)
    pub fn write(&self, map: &ResolvedMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on id map")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, map).context("Failed to serialize id map")?;
            writeln!(writer).context("Failed to write id map")?;
            writer.flush().context("Failed to flush id map")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}
