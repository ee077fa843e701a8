use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, error, info, trace, warn};
use tempfile::NamedTempFile;

use crate::{AuditError, Note, Result, SaveOutcome};

/// Fixed key under which the serialized note collection is persisted.
///
/// Kept identical to the key used by earlier versions of the application so
/// that previously stored collections load unchanged.
pub const STORAGE_KEY: &str = "codeNotesAuditorAppV2";

/// A minimal key-value persistence boundary.
///
/// One fixed key holds the JSON-serialized note collection; it is read once
/// at startup and overwritten wholesale after every mutation.
pub trait KeyValueStore {
    /// Returns the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// File-backed key-value store.
///
/// The whole map is held as a JSON object in a single file. Writes go
/// through a temporary file in the same directory and are atomically
/// renamed into place, so a crash mid-write never corrupts the stored
/// collection.
pub struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`, reading any existing content.
    ///
    /// A missing file starts an empty store; an unreadable or corrupt file
    /// is logged and also starts empty, since persistence read failures are
    /// never surfaced as blocking errors.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        "Stored data at {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored data at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => {
                warn!("Failed to read {} ({}), starting empty", path.display(), e);
                HashMap::new()
            }
        };

        Self { path, entries }
    }

    fn persist(&self) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                debug!("Creating data directory: {}", parent.display());
                fs::create_dir_all(parent).map_err(|e| {
                    error!("Failed to create directory {}: {}", parent.display(), e);
                    AuditError::Io(e)
                })?;
            }
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            AuditError::Io(e)
        })?;

        trace!("Serializing store to JSON");
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            error!("Failed to serialize store: {}", e);
            AuditError::Serialization(e)
        })?;

        temp_file.write_all(json.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            AuditError::Io(e)
        })?;
        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            AuditError::Io(e)
        })?;

        // Atomically move the temporary file to the target location
        temp_file.persist(&self.path).map_err(|e| {
            error!("Failed to persist file {}: {}", self.path.display(), e.error);
            AuditError::Io(e.error)
        })?;

        trace!("Store persisted to {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

/// In-memory key-value store, used in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    /// Number of `set` calls, so tests can assert on write side effects.
    pub writes: usize,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Manages the in-memory note collection and its persistence.
///
/// The collection is kept sorted descending by creation time (newest first)
/// and is re-persisted in full after every mutation; the stored
/// representation is always a snapshot of the latest in-memory state.
/// All operations are synchronous and run to completion before the caller
/// regains control.
pub struct NoteStore<S: KeyValueStore> {
    store: S,
    notes: Vec<Note>,
    /// Id of the note currently selected for editing, if any.
    selected: Option<String>,
}

impl<S: KeyValueStore> NoteStore<S> {
    /// Loads the persisted collection from the given key-value store.
    ///
    /// Deserialization failures are logged and treated as an empty
    /// collection rather than raised to the caller. Records persisted by an
    /// older schema without `createdAt` are assigned the current time.
    pub fn load(store: S) -> Self {
        let notes = match store.get(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Note>>(&raw) {
                Ok(notes) => {
                    info!("Loaded {} notes", notes.len());
                    notes
                }
                Err(e) => {
                    warn!("Failed to parse stored notes ({}), starting empty", e);
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!("No stored notes found, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read stored notes ({}), starting empty", e);
                Vec::new()
            }
        };

        let mut store = Self {
            store,
            notes,
            selected: None,
        };
        store.sort();
        store
    }

    /// Read-only view of the collection, newest first.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Returns the note with the given id, if present.
    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Saves a note, replacing any existing note with the same id.
    ///
    /// New notes are prepended; either branch re-sorts the collection
    /// descending by creation time and persists it in full. Returns which
    /// branch occurred so the caller can surface a distinct confirmation.
    pub fn save(&mut self, note: Note) -> Result<SaveOutcome> {
        let outcome = match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => {
                debug!("Updating note {}", note.id);
                *existing = note;
                SaveOutcome::Updated
            }
            None => {
                debug!("Creating note {}", note.id);
                self.notes.insert(0, note);
                SaveOutcome::Created
            }
        };

        self.sort();
        self.persist()?;
        Ok(outcome)
    }

    /// Deletes the note with the given id.
    ///
    /// Returns `true` and persists if a note was removed; a missing id is a
    /// no-op with no persistence write. Any confirmation prompt is the
    /// caller's responsibility. Delete preserves the relative order of the
    /// remaining notes.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);

        if self.notes.len() == before {
            debug!("Delete of unknown note {} is a no-op", id);
            return Ok(false);
        }

        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }

        info!("Deleted note {}", id);
        self.persist()?;
        Ok(true)
    }

    /// Marks the note with the given id as selected for editing.
    pub fn select(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            return Err(AuditError::NoteNotFound { id: id.to_string() });
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    /// The note currently selected for editing, if any.
    pub fn selected(&self) -> Option<&Note> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    /// Clears the editing selection without mutating the collection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn sort(&mut self) {
        self.notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn persist(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.notes)?;
        self.store.set(STORAGE_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn note_at(id: &str, offset_secs: i64) -> Note {
        Note {
            id: id.to_string(),
            repo_url: format!("https://github.com/example/{}", id),
            rating: Some(7),
            description: String::new(),
            gemini_analysis: None,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn save_keeps_one_record_per_id() {
        let mut store = NoteStore::load(MemoryStore::default());
        let note = note_at("a", 0);
        assert_eq!(store.save(note.clone()).unwrap(), SaveOutcome::Created);
        assert_eq!(store.save(note).unwrap(), SaveOutcome::Updated);
        assert_eq!(store.notes().len(), 1);
    }

    #[test]
    fn collection_is_sorted_newest_first() {
        let mut store = NoteStore::load(MemoryStore::default());
        store.save(note_at("a", 0)).unwrap();
        store.save(note_at("b", 10)).unwrap();
        store.save(note_at("c", -10)).unwrap();

        let ids: Vec<_> = store.notes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        for pair in store.notes().windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn newer_note_lists_before_older() {
        let mut store = NoteStore::load(MemoryStore::default());
        let mut a = note_at("a", 0);
        a.repo_url = "https://x/y".into();
        a.rating = Some(7);
        let mut b = note_at("b", 5);
        b.rating = Some(5);

        store.save(a).unwrap();
        store.save(b).unwrap();

        let ids: Vec<_> = store.notes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn update_preserves_id_and_created_at() {
        let mut store = NoteStore::load(MemoryStore::default());
        let original = note_at("a", 0);
        let created_at = original.created_at;
        store.save(original).unwrap();

        let mut edited = store.get("a").unwrap().clone();
        edited.description = "revisited".to_string();
        assert_eq!(store.save(edited).unwrap(), SaveOutcome::Updated);

        let stored = store.get("a").unwrap();
        assert_eq!(stored.id, "a");
        assert_eq!(stored.created_at, created_at);
        assert_eq!(stored.description, "revisited");
        assert_eq!(store.notes().len(), 1);
    }

    #[test]
    fn delete_missing_id_is_a_noop_without_write() {
        let mut store = NoteStore::load(MemoryStore::default());
        store.save(note_at("a", 0)).unwrap();
        let writes_before = store.store.writes;

        assert!(!store.delete("missing").unwrap());
        assert_eq!(store.notes().len(), 1);
        assert_eq!(store.store.writes, writes_before);
    }

    #[test]
    fn delete_clears_matching_selection() {
        let mut store = NoteStore::load(MemoryStore::default());
        store.save(note_at("a", 0)).unwrap();
        store.select("a").unwrap();
        assert!(store.selected().is_some());

        assert!(store.delete("a").unwrap());
        assert!(store.selected().is_none());
    }

    #[test]
    fn select_unknown_id_fails() {
        let mut store = NoteStore::load(MemoryStore::default());
        assert!(matches!(
            store.select("nope"),
            Err(AuditError::NoteNotFound { .. })
        ));
    }

    #[test]
    fn persistence_round_trips_every_field() {
        let mut kv = MemoryStore::default();
        {
            let mut store = NoteStore::load(std::mem::take(&mut kv));
            let mut note = note_at("a", 0);
            note.description = "solid project".to_string();
            note.gemini_analysis = Some("Uses Symfony 6.x".to_string());
            note.rating = Some(9);
            store.save(note).unwrap();
            kv = store.store;
        }

        let reloaded = NoteStore::load(kv);
        let note = reloaded.get("a").unwrap();
        assert_eq!(note.description, "solid project");
        assert_eq!(note.gemini_analysis.as_deref(), Some("Uses Symfony 6.x"));
        assert_eq!(note.rating, Some(9));
    }

    #[test]
    fn corrupt_payload_loads_empty() {
        let mut kv = MemoryStore::default();
        kv.set(STORAGE_KEY, "{ not valid json ]").unwrap();
        let store = NoteStore::load(kv);
        assert!(store.notes().is_empty());
    }

    #[test]
    fn legacy_record_without_created_at_gets_migrated() {
        let mut kv = MemoryStore::default();
        kv.set(
            STORAGE_KEY,
            r#"[{"id":"old","repoUrl":"https://github.com/a/b","rating":4,"description":"d"}]"#,
        )
        .unwrap();

        let store = NoteStore::load(kv);
        let note = store.get("old").unwrap();
        assert_eq!(note.rating, Some(4));
        assert!(note.created_at <= Utc::now());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        {
            let mut fs_store = FileStore::open(&path);
            fs_store.set(STORAGE_KEY, "[]").unwrap();
        }

        let fs_store = FileStore::open(&path);
        assert_eq!(fs_store.get(STORAGE_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn file_store_survives_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        fs::write(&path, "garbage").unwrap();

        let fs_store = FileStore::open(&path);
        assert_eq!(fs_store.get(STORAGE_KEY).unwrap(), None);
    }
}
