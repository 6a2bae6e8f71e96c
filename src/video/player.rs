// SPDX-License-Identifier: MPL-2.0

//! GStreamer implementation of [`MediaPlayer`].
//!
//! Each player owns one pipeline:
//!
//! ```text
//! uridecodebin ! videoconvert ! video/x-raw,format=RGBA ! appsink
//! ```
//!
//! The appsink callback runs on a streaming thread and hands frames to the
//! attached [`FrameTarget`]. Bus messages are inspected synchronously on the
//! posting thread and forwarded to the event loop as [`PlayerEvent`]s:
//! the first `AsyncDone` means the prepare finished, the first `Error`
//! means playback failed. Looping seeks back to zero on EOS.

use std::{
    fmt,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use calloop::channel::Sender;
use eyre::{WrapErr, eyre};
use gstreamer::prelude::*;
use motion_bg_config::VideoReference;
use tracing::{debug, error, warn};

use super::{
    detection::hardware_decoders,
    frame::{FrameTarget, VideoFrame},
};
use crate::engine::{MediaPlayer, PlayerEvent, PlayerEventKind, PlayerFactory, PlayerId};

/// Creates [`GstPlayer`]s reporting to the event loop through `events`.
#[derive(Clone)]
pub struct GstPlayerFactory {
    events: Sender<PlayerEvent>,
}

impl GstPlayerFactory {
    /// Initializes GStreamer and probes the available decoders.
    pub fn new(events: Sender<PlayerEvent>) -> eyre::Result<Self> {
        gstreamer::init().wrap_err("failed to initialize GStreamer")?;
        // Probing ranks out broken decoders before the first pipeline autoplugs.
        let hardware = hardware_decoders();
        debug!(hardware = !hardware.is_empty(), "GStreamer ready");
        Ok(Self { events })
    }
}

impl PlayerFactory for GstPlayerFactory {
    type Player = GstPlayer;

    fn create(&mut self, id: PlayerId) -> eyre::Result<GstPlayer> {
        Ok(GstPlayer::new(id, self.events.clone()))
    }
}

pub struct GstPlayer {
    id: PlayerId,
    events: Sender<PlayerEvent>,
    pipeline: Option<gstreamer::Pipeline>,
    /// Shared with the appsink callback; `None` while detached.
    target: Arc<Mutex<Option<FrameTarget>>>,
    looping: Arc<AtomicBool>,
    prepared: Arc<AtomicBool>,
}

impl GstPlayer {
    fn new(id: PlayerId, events: Sender<PlayerEvent>) -> Self {
        Self {
            id,
            events,
            pipeline: None,
            target: Arc::new(Mutex::new(None)),
            looping: Arc::new(AtomicBool::new(false)),
            prepared: Arc::new(AtomicBool::new(false)),
        }
    }

    fn notify_prepared(&self) {
        if !self.prepared.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(PlayerEvent {
                id: self.id,
                kind: PlayerEventKind::Prepared,
            });
        }
    }

    fn install_callbacks(&self, pipeline: &gstreamer::Pipeline) -> eyre::Result<()> {
        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| eyre!("Failed to get appsink from pipeline"))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| eyre!("Element 'sink' is not an AppSink"))?;

        let target = Arc::clone(&self.target);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| handle_sample(appsink, &target))
                .build(),
        );

        let bus = pipeline
            .bus()
            .ok_or_else(|| eyre!("pipeline has no bus"))?;

        let id = self.id;
        let events = Mutex::new(self.events.clone());
        let send = move |kind: PlayerEventKind| {
            if let Ok(events) = events.lock() {
                let _ = events.send(PlayerEvent { id, kind });
            }
        };
        let prepared = Arc::clone(&self.prepared);
        let failed = AtomicBool::new(false);
        let looping = Arc::clone(&self.looping);
        let weak_pipeline = pipeline.downgrade();

        bus.set_sync_handler(move |_, msg| {
            use gstreamer::MessageView;

            match msg.view() {
                MessageView::AsyncDone(_) => {
                    if !prepared.swap(true, Ordering::SeqCst) {
                        send(PlayerEventKind::Prepared);
                    }
                }
                MessageView::Error(err) => {
                    if !failed.swap(true, Ordering::SeqCst) {
                        error!(
                            %id,
                            src = ?err.src().map(|s| s.path_string()),
                            error = %err.error(),
                            "GStreamer pipeline error"
                        );
                        send(PlayerEventKind::Error(err.error().to_string()));
                    }
                }
                MessageView::Warning(warning) => {
                    warn!(
                        %id,
                        src = ?warning.src().map(|s| s.path_string()),
                        error = %warning.error(),
                        "GStreamer pipeline warning"
                    );
                }
                MessageView::Eos(_) if looping.load(Ordering::SeqCst) => {
                    if let Some(pipeline) = weak_pipeline.upgrade() {
                        // Seeking from a streaming thread deadlocks; defer it.
                        pipeline.call_async(move |pipeline| {
                            let flags = gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT;
                            match pipeline.seek_simple(flags, gstreamer::ClockTime::ZERO) {
                                Ok(()) => debug!(%id, "Video EOS, seeking to start"),
                                Err(why) => error!(%id, ?why, "Failed to seek to start for loop"),
                            }
                        });
                    }
                }
                _ => {}
            }

            gstreamer::BusSyncReply::Drop
        });

        Ok(())
    }
}

impl MediaPlayer for GstPlayer {
    type Surface = FrameTarget;

    fn set_looping(&mut self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
    }

    fn set_source(&mut self, video: &VideoReference) -> eyre::Result<()> {
        if self.pipeline.is_some() {
            eyre::bail!("{} already has a source", self.id);
        }

        let uri = source_uri(video)?;
        let pipeline = decode_pipeline(
            &uri,
            "videoconvert ! video/x-raw,format=RGBA ! appsink name=sink sync=true max-buffers=2 drop=true",
        )?;

        self.install_callbacks(&pipeline)?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn set_surface(&mut self, surface: Option<FrameTarget>) {
        match self.target.lock() {
            Ok(mut target) => *target = surface,
            Err(poisoned) => *poisoned.into_inner() = surface,
        }
    }

    fn prepare_async(&mut self) -> eyre::Result<()> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| eyre!("{} has no source", self.id))?;

        match pipeline.set_state(gstreamer::State::Paused) {
            Ok(gstreamer::StateChangeSuccess::Async) => {
                debug!(id = %self.id, "preparing asynchronously");
            }
            Ok(_) => self.notify_prepared(),
            Err(why) => eyre::bail!("pipeline refused to preroll: {why:?}"),
        }

        Ok(())
    }

    fn start(&mut self) -> eyre::Result<()> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| eyre!("{} has no source", self.id))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| eyre!("Failed to start pipeline: {:?}", e))?;
        Ok(())
    }

    fn release(&mut self) {
        self.set_surface(None);

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(why) = pipeline.set_state(gstreamer::State::Null) {
                warn!(id = %self.id, ?why, "pipeline did not stop cleanly");
            }
            if let Some(bus) = pipeline.bus() {
                bus.unset_sync_handler();
            }
            debug!(id = %self.id, "pipeline released");
        }
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for GstPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GstPlayer")
            .field("id", &self.id)
            .field("has_pipeline", &self.pipeline.is_some())
            .field("looping", &self.looping.load(Ordering::Relaxed))
            .finish()
    }
}

/// URI for `uridecodebin`: URIs pass through, paths become `file://` URIs.
pub(super) fn source_uri(video: &VideoReference) -> eyre::Result<String> {
    let Some(path) = video.path() else {
        return Ok(video.as_str().to_owned());
    };

    let path = canonical(path)?;
    let uri = gstreamer::glib::filename_to_uri(&path, None)
        .map_err(|why| eyre!("cannot express {} as a URI: {why}", path.display()))?;
    Ok(uri.to_string())
}

/// `uridecodebin` reading `uri`, linked into the `sink` description.
pub(super) fn decode_pipeline(uri: &str, sink: &str) -> eyre::Result<gstreamer::Pipeline> {
    let escaped_uri = uri.replace('\\', "\\\\").replace('"', "\\\"");
    let description = format!("uridecodebin uri=\"{escaped_uri}\" ! {sink}");

    debug!(pipeline = %description, "Creating GStreamer pipeline");

    gstreamer::parse::launch(&description)?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| eyre!("Failed to create pipeline"))
}

fn canonical(path: &Path) -> eyre::Result<std::path::PathBuf> {
    path.canonicalize()
        .wrap_err_with(|| format!("video {} is not accessible", path.display()))
}

fn handle_sample(
    appsink: &gstreamer_app::AppSink,
    target: &Mutex<Option<FrameTarget>>,
) -> Result<gstreamer::FlowSuccess, gstreamer::FlowError> {
    let sample = match appsink.pull_sample() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Callback pull_sample failed: {:?}", e);
            return Ok(gstreamer::FlowSuccess::Ok);
        }
    };

    let Some(frame) = frame_from_sample(&sample) else {
        tracing::trace!("Skipped frame: unreadable sample");
        return Ok(gstreamer::FlowSuccess::Ok);
    };

    // Publishing under the lock means a detach cannot race a frame onto a
    // surface that was already handed back.
    if let Ok(target) = target.lock() {
        if let Some(target) = target.as_ref() {
            target.publish(frame);
        }
    }

    Ok(gstreamer::FlowSuccess::Ok)
}

fn frame_from_sample(sample: &gstreamer::Sample) -> Option<VideoFrame> {
    let buffer = sample.buffer()?;
    let caps = sample.caps()?;
    let video_info = gstreamer_video::VideoInfo::from_caps(caps).ok()?;
    let map = buffer.map_readable().ok()?;

    let offset = *video_info.offset().first()?;
    let stride = usize::try_from(*video_info.stride().first()?).ok()?;

    VideoFrame::from_plane(
        map.as_slice().get(offset..)?,
        video_info.width(),
        video_info.height(),
        stride,
    )
}
