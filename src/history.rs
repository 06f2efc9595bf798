//! Persisted history of completed style analyses.
//!
//! History is a newest-first list capped at [`HISTORY_LIMIT`] entries. It is
//! read once when the store is opened and written back whole after every
//! insert or delete, through a [`HistoryRepository`].

use crate::error::Result;
use crate::image::{new_id, UploadedImage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Maximum number of saved styles.
pub const HISTORY_LIMIT: usize = 10;

/// Namespace key under which the history array is stored.
pub const HISTORY_KEY: &str = "prompt_architect_history";

/// A completed analysis and the images it was made from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStyle {
    /// Opaque identifier.
    pub id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Data URL of the first reference image, or empty.
    pub thumbnail: String,
    /// Raw analysis text.
    pub content: String,
    /// Reference images in upload order.
    pub reference_images: Vec<UploadedImage>,
}

impl SavedStyle {
    /// Creates an entry stamped with the current time.
    pub fn new(content: impl Into<String>, reference_images: Vec<UploadedImage>) -> Self {
        let thumbnail = reference_images
            .first()
            .map(|img| img.data_url.clone())
            .unwrap_or_default();
        Self {
            id: new_id(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            thumbnail,
            content: content.into(),
            reference_images,
        }
    }

    /// Returns the creation date formatted for listings.
    pub fn label(&self) -> String {
        let date = chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        format!("{} Style Profile", date)
    }
}

/// Storage backend for the history list.
pub trait HistoryRepository: Send + Sync {
    /// Loads the stored list. A missing store is an empty list.
    fn load(&self) -> Result<Vec<SavedStyle>>;

    /// Replaces the stored list.
    fn save(&self, entries: &[SavedStyle]) -> Result<()>;
}

/// Keeps history in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: Mutex<Vec<SavedStyle>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-filled with entries.
    pub fn with_entries(entries: Vec<SavedStyle>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Returns what was last saved.
    pub fn snapshot(&self) -> Vec<SavedStyle> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl HistoryRepository for MemoryRepository {
    fn load(&self) -> Result<Vec<SavedStyle>> {
        Ok(self.snapshot())
    }

    fn save(&self, entries: &[SavedStyle]) -> Result<()> {
        if let Ok(mut guard) = self.entries.lock() {
            *guard = entries.to_vec();
        }
        Ok(())
    }
}

/// Keeps history in a JSON object file under [`HISTORY_KEY`].
///
/// Other keys in the file are left untouched.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Creates a repository backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl HistoryRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<SavedStyle>> {
        let mut object = self.read_object()?;
        match object.remove(HISTORY_KEY) {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, entries: &[SavedStyle]) -> Result<()> {
        // an unreadable file is replaced rather than blocking the write
        let mut object = self.read_object().unwrap_or_default();
        object.insert(HISTORY_KEY.to_string(), serde_json::to_value(entries)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(object))?)?;
        Ok(())
    }
}

/// The in-memory history list and the repository it is persisted to.
pub struct HistoryStore<R> {
    repository: R,
    entries: Vec<SavedStyle>,
}

impl<R: HistoryRepository> HistoryStore<R> {
    /// Loads history from `repository`.
    ///
    /// A store that cannot be read or parsed is logged and treated as empty.
    pub fn open(repository: R) -> Self {
        let mut entries = match repository.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed to load history, starting empty: {e}");
                Vec::new()
            }
        };
        entries.truncate(HISTORY_LIMIT);
        Self {
            repository,
            entries,
        }
    }

    /// Returns the entries, newest first.
    pub fn entries(&self) -> &[SavedStyle] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks an entry up by identifier.
    pub fn get(&self, id: &str) -> Option<&SavedStyle> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Records a completed analysis at the front, evicting beyond the cap.
    pub fn record(&mut self, content: &str, images: &[UploadedImage]) -> Result<&SavedStyle> {
        self.insert(SavedStyle::new(content, images.to_vec()))?;
        Ok(&self.entries[0])
    }

    /// Inserts an entry at the front, evicting beyond the cap.
    ///
    /// The list in memory only changes once the repository accepted it.
    pub fn insert(&mut self, entry: SavedStyle) -> Result<()> {
        let mut next = Vec::with_capacity(HISTORY_LIMIT);
        next.push(entry);
        next.extend(self.entries.iter().take(HISTORY_LIMIT - 1).cloned());
        self.commit(next)?;
        tracing::debug!(entries = self.entries.len(), "history entry recorded");
        Ok(())
    }

    /// Deletes the entry with `id`. Returns whether one was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        let next = self.entries.iter().filter(|e| e.id != id).cloned().collect();
        self.commit(next)?;
        Ok(true)
    }

    fn commit(&mut self, next: Vec<SavedStyle>) -> Result<()> {
        self.repository.save(&next)?;
        self.entries = next;
        Ok(())
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_image;

    fn entry(id: &str) -> SavedStyle {
        SavedStyle {
            id: id.to_string(),
            timestamp: 1_700_000_000_000,
            thumbnail: String::new(),
            content: format!("content {id}"),
            reference_images: vec![],
        }
    }

    #[test]
    fn test_record_puts_newest_first() {
        let mut store = HistoryStore::open(MemoryRepository::new());
        store.record("first", &[sample_image("a")]).unwrap();
        store.record("second", &[sample_image("b"), sample_image("c")]).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[0].content, "second");
        assert_eq!(store.entries()[0].reference_images.len(), 2);
        assert_eq!(store.entries()[0].thumbnail, sample_image("b").data_url);
        assert_eq!(store.repository().snapshot(), store.entries().to_vec());
    }

    #[test]
    fn test_record_caps_at_limit() {
        let seeded: Vec<_> = (0..HISTORY_LIMIT).map(|i| entry(&i.to_string())).collect();
        let mut store = HistoryStore::open(MemoryRepository::with_entries(seeded));

        let id = store.record("newest", &[]).unwrap().id.clone();

        assert_eq!(store.len(), HISTORY_LIMIT);
        assert_eq!(store.entries()[0].id, id);
        // the oldest entry (last) was evicted
        assert!(store.get("9").is_none());
        assert!(store.get("8").is_some());
    }

    #[test]
    fn test_record_length_property() {
        for prev in 0..=HISTORY_LIMIT + 2 {
            let seeded: Vec<_> = (0..prev).map(|i| entry(&i.to_string())).collect();
            let mut store = HistoryStore::open(MemoryRepository::with_entries(seeded));
            let before = store.len();
            let id = store.record("x", &[]).unwrap().id.clone();
            assert_eq!(store.len(), (before + 1).min(HISTORY_LIMIT));
            assert_eq!(store.entries()[0].id, id);
        }
    }

    #[test]
    fn test_empty_images_give_empty_thumbnail() {
        let style = SavedStyle::new("text", vec![]);
        assert_eq!(style.thumbnail, "");
        assert!(!style.id.is_empty());
    }

    #[test]
    fn test_delete_preserves_order() {
        let seeded = vec![entry("a"), entry("b"), entry("c"), entry("d")];
        let mut store = HistoryStore::open(MemoryRepository::with_entries(seeded));

        assert!(store.delete("b").unwrap());
        let ids: Vec<_> = store.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
        assert_eq!(store.repository().snapshot().len(), 3);

        assert!(!store.delete("missing").unwrap());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_label_formats_date() {
        let style = entry("a");
        assert_eq!(style.label(), "2023-11-14 Style Profile");
    }

    #[test]
    fn test_json_file_round_trip_keeps_other_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("history.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let repo = JsonFileRepository::new(&path);
        let mut store = HistoryStore::open(repo.clone());
        store.record("analysis", &[sample_image("a")]).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[HISTORY_KEY][0]["content"], "analysis");
        assert!(raw[HISTORY_KEY][0]["referenceImages"][0]["dataUrl"].is_string());

        let reopened = HistoryStore::open(repo);
        assert_eq!(reopened.entries(), store.entries());
    }

    #[test]
    fn test_json_file_missing_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(temp.path().join("absent.json"));
        assert!(repo.load().unwrap().is_empty());
    }

    /// Accepts saves until `fail` is set.
    #[derive(Default)]
    struct FlakyRepository {
        inner: MemoryRepository,
        fail: std::sync::atomic::AtomicBool,
    }

    impl HistoryRepository for FlakyRepository {
        fn load(&self) -> Result<Vec<SavedStyle>> {
            self.inner.load()
        }

        fn save(&self, entries: &[SavedStyle]) -> Result<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save(entries)
        }
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let mut store = HistoryStore::open(FlakyRepository::default());
        let kept = store.record("kept", &[]).unwrap().id.clone();
        store
            .repository()
            .fail
            .store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(store.record("lost", &[]).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].id, kept);

        assert!(store.delete(&kept).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.repository().inner.snapshot(), store.entries());
    }

    #[test]
    fn test_corrupt_file_starts_empty_and_is_rewritten() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let repo = JsonFileRepository::new(&path);
        assert!(repo.load().is_err());

        let mut store = HistoryStore::open(repo.clone());
        assert!(store.is_empty());
        store.record("fresh", &[]).unwrap();
        assert_eq!(repo.load().unwrap().len(), 1);
    }
}
