// SPDX-License-Identifier: MPL-2.0-only

//! Choosing the wallpaper video.

use std::{fs::File, io, path::Path};

use eyre::{WrapErr, bail, eyre};
use motion_bg_config::{PreferenceStore, VideoReference, select_video, selected_video};

use crate::video::{VIDEO_EXTENSIONS, is_video_file};

/// Validates `path` and stores it as the selection.
///
/// The file must exist, carry a video extension, and be readable by this
/// user, since the daemon opens it with the same credentials.
pub fn select(store: &dyn PreferenceStore, path: &Path) -> eyre::Result<VideoReference> {
    let path = path
        .canonicalize()
        .wrap_err_with(|| format!("{} does not exist", path.display()))?;

    if !path.is_file() {
        bail!("{} is not a file", path.display());
    }

    if !is_video_file(&path) {
        bail!(
            "{} is not a video; expected one of: {}",
            path.display(),
            VIDEO_EXTENSIONS.join(", ")
        );
    }

    if let Err(why) = File::open(&path) {
        if why.kind() == io::ErrorKind::PermissionDenied {
            bail!("permission denied: {} cannot be read", path.display());
        }
        return Err(why).wrap_err_with(|| format!("cannot open {}", path.display()));
    }

    let locator = path
        .to_str()
        .ok_or_else(|| eyre!("{} is not valid UTF-8", path.display()))?;
    let video = VideoReference::new(locator).ok_or_else(|| eyre!("empty path"))?;

    select_video(store, &video);

    // Stores swallow write failures, so read the slot back.
    if selected_video(store).as_ref() != Some(&video) {
        bail!("the selection could not be saved");
    }

    tracing::info!(%video, "wallpaper video selected");
    Ok(video)
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_bg_config::{MemoryStore, RonStore};

    #[test]
    fn selects_a_readable_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.webm");
        std::fs::write(&video, b"not really a video").unwrap();
        let store = MemoryStore::default();

        let selected = select(&store, &video).unwrap();

        assert_eq!(selected.path(), Some(video.canonicalize().unwrap().as_path()));
        assert_eq!(selected_video(&store), Some(selected));
    }

    #[test]
    fn replaces_the_previous_selection() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.mp4");
        let second = dir.path().join("b.MKV");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&second, b"b").unwrap();
        let store = RonStore::new(dir.path().join("prefs")).unwrap();

        select(&store, &first).unwrap();
        let second = select(&store, &second).unwrap();

        assert_eq!(selected_video(&store), Some(second));
    }

    #[test]
    fn rejects_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();

        assert!(select(&store, &dir.path().join("gone.mp4")).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_directories_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hello").unwrap();
        let store = MemoryStore::default();

        assert!(select(&store, dir.path()).is_err());
        assert!(select(&store, &notes).is_err());
        assert!(selected_video(&store).is_none());
    }
}
