// SPDX-License-Identifier: MPL-2.0

//! Deciding what this system can play.
//!
//! [`is_video_file`] is a cheap extension check used when a video is
//! selected. The GStreamer side probes hardware decoders once per process
//! and can trial-decode a selection before it is handed to the daemon.

use std::path::Path;
#[cfg(feature = "video")]
use std::sync::OnceLock;

#[cfg(feature = "video")]
use gstreamer::prelude::*;
#[cfg(feature = "video")]
use motion_bg_config::VideoReference;
#[cfg(feature = "video")]
use tracing::{debug, info, warn};

/// Container extensions accepted as videos, compared case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov", "m4v", "ogv"];

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(feature = "video")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderApi {
    Nvdec,
    /// Both the legacy `vaapi*` and the newer `va*` plugins.
    Vaapi,
}

#[cfg(feature = "video")]
const HARDWARE_DECODERS: &[(DecoderApi, &str)] = &[
    (DecoderApi::Nvdec, "nvh264dec"),
    (DecoderApi::Nvdec, "nvh265dec"),
    (DecoderApi::Nvdec, "nvvp9dec"),
    (DecoderApi::Nvdec, "nvav1dec"),
    (DecoderApi::Vaapi, "vah264dec"),
    (DecoderApi::Vaapi, "vah265dec"),
    (DecoderApi::Vaapi, "vavp9dec"),
    (DecoderApi::Vaapi, "vaav1dec"),
    (DecoderApi::Vaapi, "vaapih264dec"),
    (DecoderApi::Vaapi, "vaapih265dec"),
    (DecoderApi::Vaapi, "vaapivp9dec"),
];

/// Hardware decoder elements usable on this system.
///
/// Probed on first call. Empty means every video decodes in software.
#[cfg(feature = "video")]
pub fn hardware_decoders() -> &'static [&'static str] {
    static DECODERS: OnceLock<Vec<&'static str>> = OnceLock::new();
    DECODERS.get_or_init(probe_hardware_decoders)
}

#[cfg(feature = "video")]
fn probe_hardware_decoders() -> Vec<&'static str> {
    if gstreamer::init().is_err() {
        return Vec::new();
    }

    let decoders: Vec<&'static str> = HARDWARE_DECODERS
        .iter()
        .filter(|(api, name)| decoder_usable(*api, name))
        .map(|(_, name)| *name)
        .collect();

    if decoders.is_empty() {
        warn!("no hardware video decoder available, videos decode in software");
    } else {
        info!(?decoders, "hardware video decoders available");
    }

    decoders
}

/// NVDEC elements register even where CUDA is unusable, and autoplugging
/// would then prefer them over a working software decoder. Those that fail
/// to instantiate are ranked out.
#[cfg(feature = "video")]
fn decoder_usable(api: DecoderApi, name: &str) -> bool {
    let Some(factory) = gstreamer::ElementFactory::find(name) else {
        return false;
    };

    if api != DecoderApi::Nvdec {
        return true;
    }

    match factory.create().build() {
        Ok(_) => true,
        Err(why) => {
            warn!(decoder = name, %why, "hardware decoder cannot start, demoting it");
            factory.set_rank(gstreamer::Rank::NONE);
            false
        }
    }
}

/// Trial-decodes `video` through the same source the daemon uses.
///
/// Blocks until the pipeline prerolls, fails, or a few seconds pass.
#[cfg(feature = "video")]
#[must_use]
pub fn can_play_video(video: &VideoReference) -> bool {
    let pipeline = match super::player::source_uri(video)
        .and_then(|uri| super::player::decode_pipeline(&uri, "video/x-raw ! fakesink"))
    {
        Ok(pipeline) => pipeline,
        Err(why) => {
            debug!(%video, ?why, "no trial pipeline");
            return false;
        }
    };

    let Some(bus) = pipeline.bus() else {
        return false;
    };

    let playable = pipeline.set_state(gstreamer::State::Paused).is_ok() && {
        let msg = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_seconds(5),
            &[gstreamer::MessageType::AsyncDone, gstreamer::MessageType::Error],
        );
        matches!(
            msg.as_ref().map(|msg| msg.view()),
            Some(gstreamer::MessageView::AsyncDone(_))
        )
    };

    let _ = pipeline.set_state(gstreamer::State::Null);
    debug!(%video, playable, "trial decode finished");
    playable
}
