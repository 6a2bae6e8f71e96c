// SPDX-License-Identifier: MPL-2.0

//! Watches the preference directory so a new selection applies without a restart.

use std::path::Path;

use calloop::{LoopHandle, channel};
use motion_bg_config::{RonStore, SETTINGS_KEY, VIDEO_KEY};
use notify::{
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};

use crate::host::MotionBg;

/// Starts watching `store`'s directory. Changes are delivered to the event
/// loop for as long as the returned watcher lives.
pub fn store_watcher(
    handle: &LoopHandle<'static, MotionBg>,
    store: &RonStore,
) -> eyre::Result<RecommendedWatcher> {
    let (notify_tx, notify_rx) = channel::sync_channel::<&'static str>(20);

    handle
        .insert_source(notify_rx, |event, _, state: &mut MotionBg| match event {
            channel::Event::Msg(key) => state.store_changed(key),
            channel::Event::Closed => tracing::debug!("preference watcher stopped"),
        })
        .map_err(|err| eyre::eyre!("{}", err.error))?;

    let dir = store.dir().to_path_buf();
    let watched = dir.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if let Some(key) = changed_key(&event, &dir) {
                    let _ = notify_tx.send(key);
                }
            }
            Err(why) => tracing::warn!(?why, "preference watcher error"),
        },
        notify::Config::default(),
    )?;

    watcher.watch(&watched, RecursiveMode::NonRecursive)?;
    tracing::debug!(dir = %watched.display(), "watching preferences");

    Ok(watcher)
}

/// The preference key an event rewrote, if any.
///
/// Entries are replaced by renaming a staging file over them, so a rename
/// onto the key counts as much as a direct write.
#[must_use]
pub fn changed_key(event: &notify::Event, dir: &Path) -> Option<&'static str> {
    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
        | EventKind::Remove(_) => {}
        _ => return None,
    }

    // With `Both`, the destination is the last path.
    let path = event.paths.last()?;
    if path.parent() != Some(dir) {
        return None;
    }

    [VIDEO_KEY, SETTINGS_KEY]
        .into_iter()
        .find(|key| path.file_name().is_some_and(|name| name == *key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, Event};
    use std::path::PathBuf;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn rename_onto_key_is_a_change() {
        let dir = Path::new("/prefs");
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/prefs/.video.tmp", "/prefs/video"],
        );
        assert_eq!(changed_key(&e, dir), Some(VIDEO_KEY));

        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/prefs/settings"],
        );
        assert_eq!(changed_key(&e, dir), Some(SETTINGS_KEY));
    }

    #[test]
    fn staging_files_are_ignored() {
        let dir = Path::new("/prefs");
        let e = event(EventKind::Create(CreateKind::File), &["/prefs/.video.tmp"]);
        assert_eq!(changed_key(&e, dir), None);
    }

    #[test]
    fn other_directories_are_ignored() {
        let dir = Path::new("/prefs");
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/elsewhere/video"],
        );
        assert_eq!(changed_key(&e, dir), None);
    }

    #[test]
    fn reads_are_not_changes() {
        let dir = Path::new("/prefs");
        let e = event(EventKind::Access(notify::event::AccessKind::Any), &["/prefs/video"]);
        assert_eq!(changed_key(&e, dir), None);
    }
}
