// SPDX-License-Identifier: MPL-2.0

//! Hand-off of decoded frames from GStreamer threads to the event loop.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use calloop::ping::Ping;

/// A decoded RGBA frame with tightly packed rows.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Copies `height` rows of `width * 4` bytes out of a strided plane.
    ///
    /// Empty frames and planes too short for their stride are rejected.
    #[must_use]
    pub fn from_plane(plane: &[u8], width: u32, height: u32, stride: usize) -> Option<Self> {
        let row = width as usize * 4;
        if width == 0
            || height == 0
            || stride == 0
            || stride < row
            || plane.len() < stride * (height as usize - 1) + row
        {
            return None;
        }

        let mut data = Vec::with_capacity(row * height as usize);
        for line in plane.chunks(stride).take(height as usize) {
            data.extend_from_slice(&line[..row]);
        }

        Some(Self {
            width,
            height,
            data,
        })
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

struct FrameSlot {
    latest: Mutex<Option<VideoFrame>>,
    ping: Ping,
}

/// Mailbox standing in for one layer surface.
///
/// Only the newest frame is kept. Publishing wakes the event loop through
/// the ping registered for the surface; older frames that were never drawn
/// are dropped.
#[derive(Clone)]
pub struct FrameTarget {
    slot: Arc<FrameSlot>,
}

impl FrameTarget {
    pub fn new(ping: Ping) -> Self {
        Self {
            slot: Arc::new(FrameSlot {
                latest: Mutex::new(None),
                ping,
            }),
        }
    }

    pub fn publish(&self, frame: VideoFrame) {
        if let Ok(mut latest) = self.slot.latest.lock() {
            latest.replace(frame);
        }
        self.slot.ping.ping();
    }

    /// Takes the newest undrawn frame.
    #[must_use]
    pub fn take(&self) -> Option<VideoFrame> {
        self.slot.latest.lock().ok()?.take()
    }
}

impl fmt::Debug for FrameTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTarget")
            .field("handles", &Arc::strong_count(&self.slot))
            .finish()
    }
}
