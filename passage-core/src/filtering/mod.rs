//! Blocklist filtering for proxied targets
//!
//! Classification order is fixed: built-in advertisement domains, built-in
//! malicious domains, then the mutable custom list (first match wins).

pub mod lists;
pub mod matcher;
pub mod metadata;
pub mod store;

pub use metadata::{BlocklistEntry, BlocklistStats, Classification, EntryKind};
pub use store::{BlocklistStore, JsonFileStore};

use regex::Regex;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BlocklistError {
    #[error("Entry already exists: {kind:?} '{value}'")]
    DuplicateEntry { kind: EntryKind, value: String },
    #[error("Invalid pattern '{value}': {message}")]
    InvalidPattern { value: String, message: String },
    #[error("Entry value cannot be empty")]
    EmptyValue,
    #[error("Blocklist storage error: {0}")]
    Storage(String),
}

/// Custom entry with its pattern compiled once at insertion
struct CompiledEntry {
    entry: BlocklistEntry,
    regex: Option<Regex>,
}

impl CompiledEntry {
    fn compile(entry: BlocklistEntry) -> Result<Self, BlocklistError> {
        if entry.value.trim().is_empty() {
            return Err(BlocklistError::EmptyValue);
        }

        let regex = match entry.kind {
            EntryKind::Pattern => Some(matcher::compile_pattern(&entry.value).map_err(|e| {
                BlocklistError::InvalidPattern { value: entry.value.clone(), message: e.to_string() }
            })?),
            EntryKind::Domain | EntryKind::Exact => None,
        };

        Ok(Self { entry, regex })
    }

    fn matches(&self, host: &str, host_and_path: &str) -> bool {
        match self.entry.kind {
            EntryKind::Domain => matcher::matches_domain(&self.entry.value, host),
            EntryKind::Pattern => {
                self.regex.as_ref().is_some_and(|re| re.is_match(host_and_path))
            }
            EntryKind::Exact => self.entry.value == host_and_path,
        }
    }
}

/// Classifies target URLs against the built-in lists and the custom list
pub struct BlocklistFilter {
    adblock_enabled: bool,
    custom: RwLock<Vec<CompiledEntry>>,
    store: Option<Arc<dyn BlocklistStore>>,
}

impl BlocklistFilter {
    /// In-memory filter without persistence
    pub fn new(adblock_enabled: bool) -> Self {
        Self { adblock_enabled, custom: RwLock::new(Vec::new()), store: None }
    }

    /// Filter persisting every change of the custom list to `store`
    pub fn with_store(adblock_enabled: bool, store: Arc<dyn BlocklistStore>) -> Self {
        Self { adblock_enabled, custom: RwLock::new(Vec::new()), store: Some(store) }
    }

    /// Replace the custom list with the store's contents.
    ///
    /// Entries that fail to compile are skipped with a warning.
    pub async fn load(&self) -> Result<usize, BlocklistError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let mut compiled = Vec::new();
        for entry in store.load().await? {
            match CompiledEntry::compile(entry) {
                Ok(entry) => compiled.push(entry),
                Err(e) => log::warn!("⚠️ Skipping stored blocklist entry: {}", e),
            }
        }

        let count = compiled.len();
        *self.custom.write().await = compiled;
        log::info!("🛡️ Loaded {} custom blocklist entries", count);
        Ok(count)
    }

    /// Classify a target. Performs no I/O and never mutates the lists.
    pub async fn classify(&self, url: &Url) -> Classification {
        let Some(host) = url.host_str() else {
            return Classification::Allowed;
        };
        let host = host.trim_end_matches('.');

        if self.adblock_enabled {
            if let Some(domain) = lists::find_suffix_match(lists::AD_DOMAINS, host) {
                return Classification::Advertisement { domain: domain.to_string() };
            }
        }

        if let Some(domain) = lists::find_suffix_match(lists::MALICIOUS_DOMAINS, host) {
            return Classification::Malicious { domain: domain.to_string() };
        }

        let host_and_path = format!("{}{}", host, url.path());
        let custom = self.custom.read().await;
        custom
            .iter()
            .find(|compiled| compiled.matches(host, &host_and_path))
            .map(|compiled| Classification::Blacklisted {
                reason: compiled
                    .entry
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Blacklisted by user".to_string()),
            })
            .unwrap_or(Classification::Allowed)
    }

    /// Add a custom entry. A duplicate `(kind, value)` pair is rejected.
    pub async fn add(&self, entry: BlocklistEntry) -> Result<BlocklistEntry, BlocklistError> {
        let compiled = CompiledEntry::compile(entry)?;

        let added = compiled.entry.clone();
        // The write guard is held across persistence so saves land in order
        let mut custom = self.custom.write().await;
        if custom.iter().any(|existing| {
            existing.entry.kind == compiled.entry.kind && existing.entry.value == compiled.entry.value
        }) {
            return Err(BlocklistError::DuplicateEntry { kind: added.kind, value: added.value });
        }

        log::info!("🛡️ Blocklist entry added: {:?} '{}'", added.kind, added.value);
        custom.push(compiled);
        self.persist(&Self::entries_of(&custom)).await;

        Ok(added)
    }

    /// Remove every custom entry with this value. Returns the removed count.
    pub async fn remove(&self, value: &str) -> usize {
        let mut custom = self.custom.write().await;
        let before = custom.len();
        custom.retain(|compiled| compiled.entry.value != value);
        let removed = before - custom.len();

        if removed > 0 {
            log::info!("🛡️ Removed {} blocklist entries for '{}'", removed, value);
            self.persist(&Self::entries_of(&custom)).await;
        }
        removed
    }

    /// Custom entries in insertion order
    pub async fn entries(&self) -> Vec<BlocklistEntry> {
        Self::entries_of(&self.custom.read().await)
    }

    pub async fn stats(&self) -> BlocklistStats {
        BlocklistStats {
            ad_domains: lists::AD_DOMAINS.len(),
            malicious_domains: lists::MALICIOUS_DOMAINS.len(),
            custom_entries: self.custom.read().await.len(),
            adblock_enabled: self.adblock_enabled,
        }
    }

    pub fn adblock_enabled(&self) -> bool {
        self.adblock_enabled
    }

    fn entries_of(custom: &[CompiledEntry]) -> Vec<BlocklistEntry> {
        custom.iter().map(|compiled| compiled.entry.clone()).collect()
    }

    /// Storage failures keep the in-memory change and are logged
    async fn persist(&self, entries: &[BlocklistEntry]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(entries).await {
                log::error!("❌ Failed to persist blocklist: {}", e);
            }
        }
    }
}

impl Default for BlocklistFilter {
    fn default() -> Self {
        Self::new(true)
    }
}
