//! Key-value persistence collaborator: plain JSON records keyed by string,
//! one file per key under the app data directory. Load failures degrade to
//! the caller-supplied default; records are disposable caches of UI state,
//! never the source of truth for a run in progress.

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "novel-translator";

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Store rooted in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| anyhow!("no platform data directory"))?;
        Ok(Self::at(base.join(APP_DIR_NAME)))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Loads the record stored under `key`, or `default` when the record is
    /// missing or unreadable.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.key_path(key);
        if !path.exists() {
            return default;
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(value) => value,
                Err(error) => {
                    warn!("failed to parse stored record {key}: {error}");
                    default
                }
            },
            Err(error) => {
                warn!("failed to read stored record {key}: {error}");
                default
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating store directory {}", self.root.display()))?;
        let serialized =
            serde_json::to_vec_pretty(value).with_context(|| format!("serializing {key}"))?;
        fs::write(self.key_path(key), serialized)
            .with_context(|| format!("writing stored record {key}"))
    }

    /// Removes every stored record.
    pub fn clear_all(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("listing store directory {}", self.root.display()))
            }
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)
                    .with_context(|| format!("removing stored record {}", path.display()))?;
            }
        }
        Ok(())
    }
}
