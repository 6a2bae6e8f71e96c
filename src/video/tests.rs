// SPDX-License-Identifier: MPL-2.0

//! Unit tests for video detection and frame hand-off.

use std::path::Path;

use super::{FrameTarget, VideoFrame, is_video_file};

#[test]
fn test_is_video_file() {
    assert!(is_video_file(Path::new("test.mp4")));
    assert!(is_video_file(Path::new("test.MP4")));
    assert!(is_video_file(Path::new("test.webm")));
    assert!(is_video_file(Path::new("test.WEBM")));
    assert!(is_video_file(Path::new("test.mkv")));
    assert!(is_video_file(Path::new("test.m4v")));
    assert!(is_video_file(Path::new("test.mov")));
    assert!(is_video_file(Path::new("test.ogv")));
    assert!(is_video_file(Path::new("test.avi")));
    assert!(!is_video_file(Path::new("test.gif")));
    assert!(!is_video_file(Path::new("test.png")));
    assert!(!is_video_file(Path::new("test.jpg")));
    assert!(!is_video_file(Path::new("test.avif")));
}

#[test]
fn test_edge_cases() {
    // No extension
    assert!(!is_video_file(Path::new("test")));
    assert!(!is_video_file(Path::new("/path/to/mp4")));

    // Hidden files and multiple dots
    assert!(is_video_file(Path::new(".hidden.mp4")));
    assert!(is_video_file(Path::new("my.video.file.WebM")));

    // Relative paths
    assert!(is_video_file(Path::new("./test.mkv")));
    assert!(is_video_file(Path::new("../test.mp4")));
}

#[test]
fn frames_drop_row_padding() {
    // 2x2 RGBA with 4 bytes of padding per row.
    let plane = [
        1, 1, 1, 255, 2, 2, 2, 255, 0, 0, 0, 0, //
        3, 3, 3, 255, 4, 4, 4, 255,
    ];
    let frame = VideoFrame::from_plane(&plane, 2, 2, 12).unwrap();
    assert_eq!(frame.data.len(), 16);
    assert_eq!(&frame.data[8..12], &[3, 3, 3, 255]);
}

#[test]
fn short_planes_are_rejected() {
    assert!(VideoFrame::from_plane(&[0; 15], 2, 2, 8).is_none());
    assert!(VideoFrame::from_plane(&[0; 64], 4, 2, 8).is_none());
}

#[test]
fn empty_frames_are_rejected() {
    assert!(VideoFrame::from_plane(&[], 0, 2, 0).is_none());
    assert!(VideoFrame::from_plane(&[0; 16], 0, 2, 8).is_none());
    assert!(VideoFrame::from_plane(&[0; 16], 2, 0, 8).is_none());
}

#[cfg(feature = "video")]
#[test]
fn missing_videos_are_not_playable() {
    let video = motion_bg_config::VideoReference::new("/nonexistent/motion-bg/clip.mp4").unwrap();
    assert!(!super::can_play_video(&video));
}

#[cfg(feature = "video")]
#[test]
fn undecodable_files_are_not_playable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.mp4");
    std::fs::write(&path, [0x5au8; 4096]).unwrap();

    let video = motion_bg_config::VideoReference::new(path.to_str().unwrap()).unwrap();
    assert!(!super::can_play_video(&video));
}

#[test]
fn target_keeps_only_the_newest_frame() {
    let (ping, _source) = calloop::ping::make_ping().unwrap();
    let target = FrameTarget::new(ping);
    let producer = target.clone();

    for shade in [10u8, 20, 30] {
        producer.publish(VideoFrame {
            width: 1,
            height: 1,
            data: vec![shade, shade, shade, 255],
        });
    }

    assert_eq!(target.take().map(|f| f.data[0]), Some(30));
    assert!(target.take().is_none());
}
