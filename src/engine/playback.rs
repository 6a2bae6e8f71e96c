// SPDX-License-Identifier: MPL-2.0

//! Playback controller owning at most one live player resource.
//!
//! The controller is an explicit state machine:
//!
//! ```text
//! Unbound --bind--> Binding --Prepared--> Bound
//!                      |                    |
//!                      +------Error---------+--> Failed
//! Binding/Bound/Failed --detach_surface--> Detaching
//! any --release--> Unbound
//! ```
//!
//! Asynchronous player events carry the [`PlayerId`] of the resource that
//! produced them. Events from a resource that has since been released are
//! discarded, which is what makes `release` safe while a prepare is still
//! in flight.

use std::{
    fmt, mem,
    sync::atomic::{AtomicU64, Ordering},
};

use motion_bg_config::VideoReference;
use tracing::{debug, error, info, warn};

/// Process-unique identity of one player resource. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(u64);

impl PlayerId {
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// The asynchronous prepare finished; playback may start.
    Prepared,
    /// Decoding or playback failed.
    Error(String),
}

/// Notification raised by a player, possibly from another thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEvent {
    pub id: PlayerId,
    pub kind: PlayerEventKind,
}

/// The media decode/playback primitive.
pub trait MediaPlayer {
    /// Drawing target frames are delivered to.
    type Surface;

    fn set_looping(&mut self, looping: bool);

    fn set_source(&mut self, video: &VideoReference) -> eyre::Result<()>;

    /// `None` detaches the player from its surface without releasing it.
    fn set_surface(&mut self, surface: Option<Self::Surface>);

    /// Begins preparing; completion is reported as [`PlayerEventKind::Prepared`].
    fn prepare_async(&mut self) -> eyre::Result<()>;

    fn start(&mut self) -> eyre::Result<()>;

    /// Frees the underlying resource. Must be idempotent.
    fn release(&mut self);
}

/// Creates players that report their events under the given id.
pub trait PlayerFactory {
    type Player: MediaPlayer;

    fn create(&mut self, id: PlayerId) -> eyre::Result<Self::Player>;
}

pub type SurfaceOf<F> = <<F as PlayerFactory>::Player as MediaPlayer>::Surface;

pub struct PlayerHandle<P> {
    id: PlayerId,
    player: P,
}

pub enum PlaybackState<P> {
    Unbound,
    Binding(PlayerHandle<P>),
    Bound(PlayerHandle<P>),
    Detaching(PlayerHandle<P>),
    Failed(PlayerHandle<P>),
}

impl<P> PlaybackState<P> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Unbound => "unbound",
            PlaybackState::Binding(_) => "binding",
            PlaybackState::Bound(_) => "bound",
            PlaybackState::Detaching(_) => "detaching",
            PlaybackState::Failed(_) => "failed",
        }
    }

    fn handle(&self) -> Option<&PlayerHandle<P>> {
        match self {
            PlaybackState::Unbound => None,
            PlaybackState::Binding(handle)
            | PlaybackState::Bound(handle)
            | PlaybackState::Detaching(handle)
            | PlaybackState::Failed(handle) => Some(handle),
        }
    }

    fn into_handle(self) -> Option<PlayerHandle<P>> {
        match self {
            PlaybackState::Unbound => None,
            PlaybackState::Binding(handle)
            | PlaybackState::Bound(handle)
            | PlaybackState::Detaching(handle)
            | PlaybackState::Failed(handle) => Some(handle),
        }
    }
}

pub struct PlaybackController<F: PlayerFactory> {
    factory: F,
    state: PlaybackState<F::Player>,
}

impl<F: PlayerFactory> PlaybackController<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            state: PlaybackState::Unbound,
        }
    }

    /// Creates a looping player for `video` on `surface` and starts preparing it.
    ///
    /// Without a video this does nothing. A resource still held from an
    /// earlier binding is released first. Failures are logged and leave the
    /// controller silent rather than propagating.
    pub fn bind(&mut self, video: Option<&VideoReference>, surface: SurfaceOf<F>) {
        let Some(video) = video else {
            info!("no video selected, nothing to play");
            return;
        };

        self.release();

        let id = PlayerId::next();
        let mut player = match self.factory.create(id) {
            Ok(player) => player,
            Err(why) => {
                error!(%id, ?why, "failed to create video player");
                return;
            }
        };

        let setup = configure(&mut player, video, surface);
        let handle = PlayerHandle { id, player };

        self.state = match setup {
            Ok(()) => {
                debug!(%id, %video, "preparing video");
                PlaybackState::Binding(handle)
            }
            Err(why) => {
                error!(%id, %video, ?why, "failed to prepare video");
                PlaybackState::Failed(handle)
            }
        };
    }

    /// Applies an asynchronous player notification.
    pub fn handle_event(&mut self, event: &PlayerEvent) {
        if self.player_id() != Some(event.id) {
            debug!(id = %event.id, "ignoring event from a released player");
            return;
        }

        self.state = match (mem::replace(&mut self.state, PlaybackState::Unbound), &event.kind) {
            (PlaybackState::Binding(mut handle), PlayerEventKind::Prepared) => {
                match handle.player.start() {
                    Ok(()) => {
                        info!(id = %handle.id, "video playback started");
                        PlaybackState::Bound(handle)
                    }
                    Err(why) => {
                        error!(id = %handle.id, ?why, "failed to start playback");
                        PlaybackState::Failed(handle)
                    }
                }
            }
            (
                PlaybackState::Binding(handle) | PlaybackState::Bound(handle),
                PlayerEventKind::Error(why),
            ) => {
                error!(id = %handle.id, %why, "video playback failed");
                PlaybackState::Failed(handle)
            }
            (PlaybackState::Detaching(handle), PlayerEventKind::Error(why)) => {
                warn!(id = %handle.id, %why, "detached player reported an error");
                PlaybackState::Detaching(handle)
            }
            (state, kind) => {
                debug!(state = state.name(), ?kind, "player event has no effect");
                state
            }
        };
    }

    /// Clears the surface on the live player without releasing it.
    pub fn detach_surface(&mut self) {
        self.state = match mem::replace(&mut self.state, PlaybackState::Unbound) {
            PlaybackState::Binding(mut handle)
            | PlaybackState::Bound(mut handle)
            | PlaybackState::Failed(mut handle) => {
                handle.player.set_surface(None);
                debug!(id = %handle.id, "player detached from surface");
                PlaybackState::Detaching(handle)
            }
            state => state,
        };
    }

    /// Releases the held player, if any.
    pub fn release(&mut self) {
        if let Some(mut handle) = mem::replace(&mut self.state, PlaybackState::Unbound).into_handle()
        {
            handle.player.release();
            debug!(id = %handle.id, "player released");
        }
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState<F::Player> {
        &self.state
    }

    #[must_use]
    pub fn player_id(&self) -> Option<PlayerId> {
        self.state.handle().map(|handle| handle.id)
    }

    #[must_use]
    pub fn has_live_player(&self) -> bool {
        self.state.handle().is_some()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, PlaybackState::Failed(_))
    }
}

fn configure<P: MediaPlayer>(
    player: &mut P,
    video: &VideoReference,
    surface: P::Surface,
) -> eyre::Result<()> {
    player.set_looping(true);
    player.set_source(video)?;
    player.set_surface(Some(surface));
    player.prepare_async()
}

impl<F: PlayerFactory> Drop for PlaybackController<F> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<F: PlayerFactory> fmt::Debug for PlaybackController<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state.name())
            .field("player", &self.player_id())
            .finish()
    }
}
