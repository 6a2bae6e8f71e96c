// SPDX-License-Identifier: MPL-2.0

//! Wallpaper engine: one per output session.
//!
//! The engine reads the selected video once when it is created, listens to
//! the lifecycle of the surface it draws into, and drives a
//! [`PlaybackController`]. Nothing here propagates errors to the host: a
//! failure leaves the surface blank instead of taking the daemon down.
//!
//! # Module Structure
//!
//! - [`surface`]: lifecycle events and the ordering guard
//! - [`playback`]: the player state machine and the media primitive traits
//! - [`session`]: translating host configures and closes into surface events

pub mod playback;
pub mod session;
pub mod surface;

use std::fmt;

use motion_bg_config::{PreferenceStore, VideoReference, selected_video};
use tracing::{debug, info};

pub use playback::{
    MediaPlayer, PlaybackController, PlaybackState, PlayerEvent, PlayerEventKind, PlayerFactory,
    PlayerId, SurfaceOf,
};
pub use session::HostSurface;
pub use surface::{SurfaceEvent, SurfaceLifecycle, SurfaceListener};

pub struct Engine<F: PlayerFactory> {
    name: String,
    video: Option<VideoReference>,
    playback: PlaybackController<F>,
    lifecycle: SurfaceLifecycle,
    destroyed: bool,
}

impl<F: PlayerFactory> Engine<F> {
    /// Starts a session, reading the current selection from `store`.
    pub fn on_create(name: impl Into<String>, store: &dyn PreferenceStore, factory: F) -> Self {
        let name = name.into();
        let video = selected_video(store);

        match &video {
            Some(video) => info!(engine = %name, %video, "engine created"),
            None => info!(engine = %name, "engine created without a selected video"),
        }

        Self {
            name,
            video,
            playback: PlaybackController::new(factory),
            lifecycle: SurfaceLifecycle::default(),
            destroyed: false,
        }
    }

    /// Delivers a surface event, dropping it if it breaks the lifecycle order.
    pub fn surface_event(&mut self, event: SurfaceEvent<SurfaceOf<F>>) {
        if self.destroyed {
            debug!(engine = %self.name, event = event.name(), "engine destroyed, ignoring surface event");
            return;
        }

        if !self.lifecycle.accept(&event) {
            return;
        }

        match event {
            SurfaceEvent::Created(surface) => self.surface_created(surface),
            SurfaceEvent::Changed { width, height } => self.surface_changed(width, height),
            SurfaceEvent::Destroyed => self.surface_destroyed(),
        }
    }

    pub fn handle_player_event(&mut self, event: &PlayerEvent) {
        if self.destroyed {
            return;
        }
        self.playback.handle_event(event);
    }

    /// Ends the session. The player is released whatever state it is in and
    /// every later event is ignored.
    pub fn on_destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.playback.release();
        self.lifecycle = SurfaceLifecycle::Detached;
        self.destroyed = true;
        info!(engine = %self.name, "engine destroyed");
    }

    /// Ends this session and starts the next one on the same output.
    ///
    /// The new session reads the selection again. A surface that is still
    /// attached, given with its last size, is replayed as `Created` then
    /// `Changed`.
    pub fn restart(
        &mut self,
        store: &dyn PreferenceStore,
        factory: F,
        attached: Option<(SurfaceOf<F>, (u32, u32))>,
    ) {
        self.on_destroy();
        *self = Self::on_create(self.name.clone(), store, factory);

        if let Some((surface, (width, height))) = attached {
            self.surface_event(SurfaceEvent::Created(surface));
            self.surface_event(SurfaceEvent::Changed { width, height });
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn video(&self) -> Option<&VideoReference> {
        self.video.as_ref()
    }

    #[must_use]
    pub fn playback(&self) -> &PlaybackController<F> {
        &self.playback
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.lifecycle.is_attached()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl<F: PlayerFactory> SurfaceListener for Engine<F> {
    type Surface = SurfaceOf<F>;

    fn surface_created(&mut self, surface: Self::Surface) {
        debug!(engine = %self.name, "surface created");
        self.playback.bind(self.video.as_ref(), surface);
    }

    fn surface_changed(&mut self, width: u32, height: u32) {
        debug!(engine = %self.name, width, height, "surface changed");
    }

    fn surface_destroyed(&mut self) {
        debug!(engine = %self.name, "surface destroyed");
        self.playback.detach_surface();
        self.playback.release();
    }
}

impl<F: PlayerFactory> fmt::Debug for Engine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("video", &self.video)
            .field("playback", &self.playback)
            .field("lifecycle", &self.lifecycle)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
