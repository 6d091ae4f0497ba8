//! Durable storage for the custom blocklist

use super::metadata::BlocklistEntry;
use super::BlocklistError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Load and save the full list of custom entries
#[async_trait]
pub trait BlocklistStore: Send + Sync {
    async fn load(&self) -> Result<Vec<BlocklistEntry>, BlocklistError>;
    async fn save(&self, entries: &[BlocklistEntry]) -> Result<(), BlocklistError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlocklistFile {
    version: String,
    last_updated: DateTime<Utc>,
    entries: Vec<BlocklistEntry>,
}

/// JSON file store: `{version, lastUpdated, entries}`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const FORMAT_VERSION: &'static str = "1.0";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlocklistStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<BlocklistEntry>, BlocklistError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No blocklist file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(BlocklistError::Storage(e.to_string())),
        };

        let file: BlocklistFile = serde_json::from_slice(&raw).map_err(|e| {
            BlocklistError::Storage(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(file.entries)
    }

    async fn save(&self, entries: &[BlocklistEntry]) -> Result<(), BlocklistError> {
        let file = BlocklistFile {
            version: Self::FORMAT_VERSION.to_string(),
            last_updated: Utc::now(),
            entries: entries.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| BlocklistError::Storage(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlocklistError::Storage(e.to_string()))?;
        }

        // Write then rename so readers never see a truncated file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| BlocklistError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| BlocklistError::Storage(e.to_string()))
    }
}
