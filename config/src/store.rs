// SPDX-License-Identifier: MPL-2.0-only

//! Key-value persistence for the selection and settings.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Serialize};

use crate::NAME;

/// Single-writer, last-write-wins string store.
///
/// Writes are best-effort: a failed `put` is logged and otherwise ignored,
/// so callers on the wallpaper path never have to handle persistence errors.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: &str);
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("stored value is not valid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("value could not be encoded: {0}")]
    Serialize(#[from] ron::Error),
}

/// Directory-backed store: one file per key, each holding a RON value.
#[derive(Debug, Clone)]
pub struct RonStore {
    dir: PathBuf,
}

impl RonStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `$XDG_CONFIG_HOME/motion-bg/v1`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(NAME).join("v1"))
    }

    /// Opens the store at [`RonStore::default_path`].
    ///
    /// # Errors
    ///
    /// Fails if no config directory is known or it cannot be created.
    pub fn open_default() -> Result<Self, Error> {
        let dir = Self::default_path().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no configuration directory for this user",
            ))
        })?;
        Self::new(dir)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Reads and decodes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Fails if the key is missing, unreadable, or does not decode as `T`.
    pub fn get_entry<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        let contents = fs::read_to_string(self.key_path(key))?;
        Ok(ron::from_str(&contents)?)
    }

    /// Encodes `value` and replaces whatever was stored under `key`.
    ///
    /// The value is written to a hidden sibling first and renamed into
    /// place, so readers observe either the old or the new value.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be encoded or the file cannot be written.
    pub fn set_entry<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let encoded = ron::to_string(value)?;
        let staging = self.dir.join(format!(".{key}.tmp"));
        fs::write(&staging, encoded)?;
        fs::rename(&staging, self.key_path(key))?;
        Ok(())
    }
}

impl PreferenceStore for RonStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.get_entry::<String>(key) {
            Ok(value) => Some(value),
            Err(Error::Io(why)) if why.kind() == io::ErrorKind::NotFound => None,
            Err(why) => {
                tracing::warn!(key, %why, "stored preference is unreadable");
                None
            }
        }
    }

    fn put(&self, key: &str, value: &str) {
        if let Err(why) = self.set_entry(key, value) {
            tracing::error!(key, %why, "failed to persist preference");
        }
    }
}

/// In-process store with no durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().map(|values| values.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_owned(), value.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{selected_video, select_video, VideoReference, VIDEO_KEY};

    #[test]
    fn missing_key_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();
        assert_eq!(store.get(VIDEO_KEY), None);
    }

    #[test]
    fn selection_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let video = VideoReference::new("/home/user/Videos/waves.webm").unwrap();

        {
            let store = RonStore::new(dir.path()).unwrap();
            select_video(&store, &video);
        }

        let reopened = RonStore::new(dir.path()).unwrap();
        assert_eq!(selected_video(&reopened), Some(video));
    }

    #[test]
    fn values_are_stored_as_ron_strings() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();
        store.put(VIDEO_KEY, "/videos/quote\"d.mp4");

        let raw = fs::read_to_string(dir.path().join(VIDEO_KEY)).unwrap();
        assert_eq!(raw, r#""/videos/quote\"d.mp4""#);
        assert_eq!(store.get(VIDEO_KEY).as_deref(), Some("/videos/quote\"d.mp4"));
        assert!(!dir.path().join(format!(".{VIDEO_KEY}.tmp")).exists());
    }

    #[test]
    fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();
        store.put(VIDEO_KEY, "/videos/a.mp4");
        store.put(VIDEO_KEY, "/videos/b.mp4");
        assert_eq!(store.get(VIDEO_KEY).as_deref(), Some("/videos/b.mp4"));
    }

    #[test]
    fn corrupt_value_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();
        fs::write(dir.path().join(VIDEO_KEY), "not ron at all (").unwrap();
        assert_eq!(store.get(VIDEO_KEY), None);
    }

    #[test]
    fn failed_put_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path().join("gone")).unwrap();
        fs::remove_dir(dir.path().join("gone")).unwrap();

        store.put(VIDEO_KEY, "/videos/a.mp4");
        assert_eq!(store.get(VIDEO_KEY), None);
    }

    #[test]
    fn entry_errors_keep_their_cause() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();

        let missing = store.get_entry::<String>(VIDEO_KEY).unwrap_err();
        assert!(matches!(&missing, Error::Io(why) if why.kind() == io::ErrorKind::NotFound));
        assert!(missing.to_string().starts_with("store i/o failed: "));

        fs::write(dir.path().join(VIDEO_KEY), "not ron at all (").unwrap();
        let corrupt = store.get_entry::<String>(VIDEO_KEY).unwrap_err();
        assert!(matches!(corrupt, Error::Parse(_)));
        assert!(std::error::Error::source(&corrupt).is_some());
    }
}
