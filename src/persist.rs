//! Preference persistence across runs.
//!
//! Learned volume preferences survive restarts through a small JSON
//! file. A missing or unreadable file is a cache miss, never a fatal
//! error, so a fresh install and a corrupted disk behave the same way.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::log_debug;

const PREFS_VERSION: u32 = 1;

/// On-disk shape of the preference file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredPreferences {
    pub version: u32,
    pub preferred_level: f32,
    pub updated_at_ms: u64,
}

impl StoredPreferences {
    pub fn new(preferred_level: f32, updated_at_ms: u64) -> Self {
        Self {
            version: PREFS_VERSION,
            preferred_level,
            updated_at_ms,
        }
    }
}

/// File-backed store for learned preferences. A store without a path
/// accepts saves and drops them, so callers never branch on whether
/// persistence is enabled.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
}

impl PreferenceStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the stored preference, treating every failure as a miss.
    pub fn load(&self) -> Option<StoredPreferences> {
        let path = self.path.as_deref()?;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log_debug(&format!(
                        "Preference file {} unreadable: {err}",
                        path.display()
                    ));
                }
                return None;
            }
        };
        let stored: StoredPreferences = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                log_debug(&format!(
                    "Preference file {} corrupt, ignoring: {err}",
                    path.display()
                ));
                return None;
            }
        };
        if stored.version != PREFS_VERSION {
            log_debug(&format!(
                "Preference file {} has version {} (expected {PREFS_VERSION}), ignoring",
                path.display(),
                stored.version
            ));
            return None;
        }
        if !stored.preferred_level.is_finite()
            || !(0.0..=1.0).contains(&stored.preferred_level)
        {
            log_debug(&format!(
                "Preference file {} holds out-of-range level {}, ignoring",
                path.display(),
                stored.preferred_level
            ));
            return None;
        }
        Some(stored)
    }

    /// Write the preference atomically via a temp file and rename.
    pub fn save(&self, preferred_level: f32, updated_at_ms: u64) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let stored = StoredPreferences::new(preferred_level, updated_at_ms);
        let json = serde_json::to_string_pretty(&stored)
            .context("failed to serialize preferences")?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json.as_bytes()).with_context(|| {
            format!("failed to write preference temp file {}", temp_path.display())
        })?;
        fs::rename(&temp_path, path).with_context(|| {
            format!("failed to move preferences into place at {}", path.display())
        })?;
        Ok(())
    }
}
