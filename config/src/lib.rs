// SPDX-License-Identifier: MPL-2.0-only

//! Persisted state shared by `motion-bg set` and the wallpaper daemon.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

mod store;

pub use store::{Error, MemoryStore, PreferenceStore, RonStore};

pub const NAME: &str = "motion-bg";
/// Key holding the selected video locator.
pub const VIDEO_KEY: &str = "video";
pub const SETTINGS_KEY: &str = "settings";

/// Opaque locator of the user-selected video: an absolute path or a URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[must_use]
pub struct VideoReference(String);

impl VideoReference {
    /// Wraps a locator, rejecting empty and whitespace-only strings.
    pub fn new(locator: impl Into<String>) -> Option<Self> {
        let locator = locator.into();
        if locator.trim().is_empty() {
            None
        } else {
            Some(Self(locator))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the locator already carries a URI scheme such as `file://`.
    #[must_use]
    pub fn is_uri(&self) -> bool {
        match self.0.split_once("://") {
            Some((scheme, _)) => {
                !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            None => false,
        }
    }

    /// Filesystem path of the locator, if it is not a URI.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        (!self.is_uri()).then(|| Path::new(&self.0))
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the current selection. A missing or empty value means nothing is selected.
pub fn selected_video(store: &dyn PreferenceStore) -> Option<VideoReference> {
    store.get(VIDEO_KEY).and_then(VideoReference::new)
}

/// Overwrites the single selection slot.
pub fn select_video(store: &dyn PreferenceStore, video: &VideoReference) {
    store.put(VIDEO_KEY, video.as_str());
}

/// Resampling filter used when scaling frames to the output
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMethod {
    // nearest neighbor filtering
    Nearest,
    // bilinear filtering
    #[default]
    Linear,
    // lanczos filtering with window 3
    Lanczos,
}

/// Frame scaling mode
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq)]
pub enum ScalingMode {
    // Fit the frame and fill the rest of the area with the given RGB color
    Fit([f32; 3]),
    /// Stretch the frame ignoring any aspect ratio to fit the area
    Stretch,
    /// Zoom the frame so that it fills the whole area
    #[default]
    Zoom,
}

/// Presentation settings applied by the daemon to every output.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Setters)]
#[serde(deny_unknown_fields)]
#[must_use]
pub struct Settings {
    #[serde(default)]
    pub scaling_mode: ScalingMode,
    #[serde(default)]
    pub filter_method: FilterMethod,
}

impl Settings {
    /// Loads settings, falling back to defaults when missing or invalid.
    pub fn load(store: &RonStore) -> Self {
        match store.get_entry::<Settings>(SETTINGS_KEY) {
            Ok(settings) => settings,
            Err(Error::Io(why)) if why.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(why) => {
                tracing::warn!(%why, "settings are invalid, falling back to defaults");
                Self::default()
            }
        }
    }

    /// Persists the settings.
    ///
    /// # Errors
    ///
    /// Fails if the settings file could not be written.
    pub fn write(&self, store: &RonStore) -> Result<(), Error> {
        store.set_entry(SETTINGS_KEY, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_locators_are_rejected() {
        assert!(VideoReference::new("").is_none());
        assert!(VideoReference::new("   ").is_none());
        assert!(VideoReference::new("\n\t").is_none());
        assert_eq!(
            VideoReference::new("/videos/a.mp4").map(|v| v.to_string()),
            Some("/videos/a.mp4".to_string())
        );
    }

    #[test]
    fn uri_detection() {
        let uri = VideoReference::new("file:///videos/a.mp4").unwrap();
        assert!(uri.is_uri());
        assert!(uri.path().is_none());

        let path = VideoReference::new("/videos/a.mp4").unwrap();
        assert!(!path.is_uri());
        assert_eq!(path.path(), Some(Path::new("/videos/a.mp4")));

        let odd = VideoReference::new("/videos/weird://name.mp4").unwrap();
        assert!(!odd.is_uri());
    }

    #[test]
    fn selecting_overwrites_previous_choice() {
        let store = MemoryStore::default();
        assert!(selected_video(&store).is_none());

        select_video(&store, &VideoReference::new("/videos/a.mp4").unwrap());
        select_video(&store, &VideoReference::new("/videos/b.mp4").unwrap());

        assert_eq!(
            selected_video(&store),
            VideoReference::new("/videos/b.mp4")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stored_empty_string_reads_as_nothing_selected() {
        let store = MemoryStore::default();
        store.put(VIDEO_KEY, "");
        assert!(selected_video(&store).is_none());
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();
        assert_eq!(Settings::load(&store), Settings::default());

        std::fs::write(dir.path().join(SETTINGS_KEY), "(scaling_mode: Sideways)").unwrap();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RonStore::new(dir.path()).unwrap();
        let settings = Settings::default()
            .scaling_mode(ScalingMode::Fit([0.0, 0.0, 0.0]))
            .filter_method(FilterMethod::Nearest);
        settings.write(&store).unwrap();
        assert_eq!(Settings::load(&store), settings);
    }
}
