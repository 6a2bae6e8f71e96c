// SPDX-License-Identifier: MPL-2.0

//! Video playback backend.
//!
//! # Module Structure
//!
//! - [`detection`]: File type detection and decoder probing
//! - [`frame`]: Frame hand-off between decoder threads and the event loop
//! - [`player`]: GStreamer-based [`MediaPlayer`](crate::engine::MediaPlayer)
//!
//! # Supported Formats
//!
//! | Format | Extension |
//! |--------|-----------|
//! | MPEG-4 | `.mp4`, `.m4v` |
//! | WebM   | `.webm`   |
//! | Matroska | `.mkv`  |
//! | AVI    | `.avi`    |
//! | QuickTime | `.mov` |
//! | Ogg Video | `.ogv` |

mod detection;
mod frame;
#[cfg(feature = "video")]
mod player;

pub use detection::{VIDEO_EXTENSIONS, is_video_file};
#[cfg(feature = "video")]
pub use detection::{can_play_video, hardware_decoders};
pub use frame::{FrameTarget, VideoFrame};
#[cfg(feature = "video")]
pub use player::GstPlayerFactory;

#[cfg(test)]
mod tests;
