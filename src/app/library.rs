#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::media::MediaKind;
use super::sources::{SourceDescriptor, parse_custom_sources};
use crate::error::PlaybackError;

pub(crate) const CONTINUE_KEY: &str = "continue_watching";
pub(crate) const WATCHLIST_KEY: &str = "watchlist";
pub(crate) const CUSTOM_SOURCES_KEY: &str = "custom_sources";

pub(crate) const DEFAULT_CONTINUE_CAPACITY: usize = 20;
pub(crate) const DEFAULT_WATCHLIST_CAPACITY: usize = 100;

/// Key/value storage for the persisted lists. Reads and writes are single
/// synchronous steps; callers own the single writer.
pub trait Medium {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<M: Medium + ?Sized> Medium for &M {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryMedium {
    values: RefCell<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryMedium {
    pub(crate) fn with_value(key: &str, value: &str) -> Self {
        let medium = Self::default();
        medium
            .values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        medium
    }
}

#[cfg(test)]
impl Medium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContinueWatchingEntry {
    pub(crate) title_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) poster_url: Option<String>,
    pub(crate) kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) episode: Option<u32>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// A continue-watching record before it is stamped by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProgressUpdate {
    pub(crate) title_id: String,
    pub(crate) title: String,
    pub(crate) poster_url: Option<String>,
    pub(crate) kind: MediaKind,
    pub(crate) season: Option<u32>,
    pub(crate) episode: Option<u32>,
}

impl ProgressUpdate {
    fn stamp(self, at: DateTime<Utc>) -> ContinueWatchingEntry {
        ContinueWatchingEntry {
            title_id: self.title_id,
            title: self.title,
            poster_url: self.poster_url,
            kind: self.kind,
            season: self.season,
            episode: self.episode,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchlistEntry {
    pub(crate) title_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) poster_url: Option<String>,
}

/// Bounded, most-recent-first lists persisted through a [`Medium`].
///
/// Unreadable or corrupt lists read as empty and write failures are logged
/// and dropped; nothing here surfaces an error to the viewer.
pub(crate) struct Library<M> {
    medium: M,
    continue_capacity: usize,
    watchlist_capacity: usize,
}

impl<M: Medium> Library<M> {
    pub(crate) fn new(medium: M) -> Self {
        Self::with_capacities(medium, DEFAULT_CONTINUE_CAPACITY, DEFAULT_WATCHLIST_CAPACITY)
    }

    pub(crate) fn with_capacities(
        medium: M,
        continue_capacity: usize,
        watchlist_capacity: usize,
    ) -> Self {
        Self {
            medium,
            continue_capacity: continue_capacity.max(1),
            watchlist_capacity: watchlist_capacity.max(1),
        }
    }

    pub(crate) fn continue_watching(&self) -> Vec<ContinueWatchingEntry> {
        self.read_list(CONTINUE_KEY)
    }

    pub(crate) fn watchlist(&self) -> Vec<WatchlistEntry> {
        self.read_list(WATCHLIST_KEY)
    }

    pub(crate) fn upsert_continue_watching(&self, update: ProgressUpdate) -> ContinueWatchingEntry {
        self.upsert_continue_watching_at(update, Utc::now())
    }

    pub(crate) fn upsert_continue_watching_at(
        &self,
        update: ProgressUpdate,
        at: DateTime<Utc>,
    ) -> ContinueWatchingEntry {
        let entry = update.stamp(at);
        let mut list = self.continue_watching();
        list.retain(|existing| existing.title_id != entry.title_id);
        list.insert(0, entry.clone());
        list.truncate(self.continue_capacity);
        self.write_list(CONTINUE_KEY, &list);
        entry
    }

    pub(crate) fn remove_continue_watching(&self, title_id: &str) -> bool {
        let mut list = self.continue_watching();
        let before = list.len();
        list.retain(|entry| entry.title_id != title_id);
        let removed = list.len() != before;
        if removed {
            self.write_list(CONTINUE_KEY, &list);
        }
        removed
    }

    /// Adds the title to the front when absent, removes it when present.
    /// Returns the resulting membership.
    pub(crate) fn toggle_watchlist(&self, item: WatchlistEntry) -> bool {
        let mut list = self.watchlist();
        if let Some(pos) = list.iter().position(|entry| entry.title_id == item.title_id) {
            list.remove(pos);
            self.write_list(WATCHLIST_KEY, &list);
            return false;
        }
        list.insert(0, item);
        list.truncate(self.watchlist_capacity);
        self.write_list(WATCHLIST_KEY, &list);
        true
    }

    pub(crate) fn is_in_watchlist(&self, title_id: &str) -> bool {
        self.watchlist()
            .iter()
            .any(|entry| entry.title_id == title_id)
    }

    pub(crate) fn remove_from_watchlist(&self, title_id: &str) -> bool {
        let mut list = self.watchlist();
        let before = list.len();
        list.retain(|entry| entry.title_id != title_id);
        let removed = list.len() != before;
        if removed {
            self.write_list(WATCHLIST_KEY, &list);
        }
        removed
    }

    pub(crate) fn custom_sources(&self) -> Vec<SourceDescriptor> {
        let Some(raw) = self.read_raw(CUSTOM_SOURCES_KEY) else {
            return Vec::new();
        };
        parse_custom_sources(&raw).unwrap_or_else(|err| {
            self.report_corrupt(CUSTOM_SOURCES_KEY, &err.to_string());
            Vec::new()
        })
    }

    /// Stores a custom source, replacing any earlier one with the same name.
    pub(crate) fn add_custom_source(&self, source: SourceDescriptor) {
        let mut list = self.custom_sources();
        list.retain(|existing| existing.name() != source.name());
        list.push(source);
        self.write_list(CUSTOM_SOURCES_KEY, &list);
    }

    pub(crate) fn remove_custom_source(&self, name: &str) -> bool {
        let mut list = self.custom_sources();
        let before = list.len();
        list.retain(|existing| existing.name() != name);
        let removed = list.len() != before;
        if removed {
            self.write_list(CUSTOM_SOURCES_KEY, &list);
        }
        removed
    }

    pub(crate) fn clear_all(&self) {
        for key in [CONTINUE_KEY, WATCHLIST_KEY] {
            if let Err(err) = self.medium.remove(key) {
                warn!(key, error = %err, "failed to clear stored list");
            }
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.medium.read(key) {
            Ok(value) => value,
            Err(err) => {
                self.report_corrupt(key, &format!("{err:#}"));
                None
            }
        }
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let Some(raw) = self.read_raw(key) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            self.report_corrupt(key, &err.to_string());
            Vec::new()
        })
    }

    fn write_list<T: Serialize>(&self, key: &str, list: &[T]) {
        let result = serde_json::to_string(list)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.medium.write(key, &raw));
        if let Err(err) = result {
            warn!(key, error = %err, "dropping write to stored list");
        }
    }

    fn report_corrupt(&self, key: &str, detail: &str) {
        let err = PlaybackError::PersistedStateCorrupt {
            key: key.to_string(),
            detail: detail.to_string(),
        };
        warn!("{err}; treating as empty");
    }
}
