// SPDX-License-Identifier: MPL-2.0-only

//! Frame scaling methods such as fit, stretch, and zoom.

use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbaImage;
use motion_bg_config::{FilterMethod, ScalingMode, Settings};

use crate::video::VideoFrame;

/// Scales `frame` to the layer size according to `settings`.
pub fn scale(
    frame: &VideoFrame,
    layer_width: u32,
    layer_height: u32,
    settings: &Settings,
) -> eyre::Result<RgbaImage> {
    let options = ResizeOptions::new().resize_alg(algorithm(settings.filter_method));

    match settings.scaling_mode {
        ScalingMode::Fit(color) => fit(frame, &color, layer_width, layer_height, &options),
        ScalingMode::Stretch => resize(frame, layer_width, layer_height, &options),
        ScalingMode::Zoom => zoom(frame, layer_width, layer_height, &options),
    }
}

fn algorithm(method: FilterMethod) -> ResizeAlg {
    match method {
        FilterMethod::Nearest => ResizeAlg::Nearest,
        FilterMethod::Linear => ResizeAlg::Convolution(FilterType::Bilinear),
        FilterMethod::Lanczos => ResizeAlg::Convolution(FilterType::Lanczos3),
    }
}

fn resize(
    frame: &VideoFrame,
    width: u32,
    height: u32,
    options: &ResizeOptions,
) -> eyre::Result<RgbaImage> {
    let src = ImageRef::new(frame.width, frame.height, &frame.data, PixelType::U8x4)?;
    let mut dst = Image::new(width, height, PixelType::U8x4);
    Resizer::new().resize(&src, &mut dst, options)?;

    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| eyre::eyre!("resized frame has the wrong size"))
}

/// Crops the frame to the layer's aspect ratio around its center, then scales.
pub fn zoom(
    frame: &VideoFrame,
    layer_width: u32,
    layer_height: u32,
    options: &ResizeOptions,
) -> eyre::Result<RgbaImage> {
    let options = options.clone().fit_into_destination(Some((0.5, 0.5)));
    resize(frame, layer_width, layer_height, &options)
}

/// Letterboxes the frame on a solid background.
pub fn fit(
    frame: &VideoFrame,
    color: &[f32; 3],
    layer_width: u32,
    layer_height: u32,
    options: &ResizeOptions,
) -> eyre::Result<RgbaImage> {
    let background = image::Rgba([
        (u8::MAX as f32 * color[0]).round() as u8,
        (u8::MAX as f32 * color[1]).round() as u8,
        (u8::MAX as f32 * color[2]).round() as u8,
        u8::MAX,
    ]);
    let mut filled_image = RgbaImage::from_pixel(layer_width, layer_height, background);

    let (new_width, new_height) = fitted_size(frame.width, frame.height, layer_width, layer_height);
    let resized_image = resize(frame, new_width, new_height, options)?;

    image::imageops::replace(
        &mut filled_image,
        &resized_image,
        ((layer_width - new_width) / 2).into(),
        ((layer_height - new_height) / 2).into(),
    );

    Ok(filled_image)
}

/// Largest size with the frame's aspect ratio that fits inside the layer.
#[must_use]
pub fn fitted_size(width: u32, height: u32, layer_width: u32, layer_height: u32) -> (u32, u32) {
    let ratio = (layer_width as f64 / width as f64).min(layer_height as f64 / height as f64);

    (
        ((width as f64 * ratio).round() as u32).clamp(1, layer_width.max(1)),
        ((height as f64 * ratio).round() as u32).clamp(1, layer_height.max(1)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> VideoFrame {
        VideoFrame {
            width,
            height,
            data: rgba.repeat((width * height) as usize),
        }
    }

    #[test]
    fn fitted_size_preserves_aspect_ratio() {
        assert_eq!(fitted_size(1920, 1080, 1280, 1024), (1280, 720));
        assert_eq!(fitted_size(1080, 1920, 1920, 1080), (608, 1080));
        assert_eq!(fitted_size(640, 360, 1280, 720), (1280, 720));
    }

    #[test]
    fn every_mode_fills_the_layer() {
        let frame = solid(16, 9, [200, 100, 50, 255]);
        for scaling_mode in [
            ScalingMode::Zoom,
            ScalingMode::Stretch,
            ScalingMode::Fit([0.0, 0.0, 0.0]),
        ] {
            let settings = Settings::default().scaling_mode(scaling_mode);
            let image = scale(&frame, 40, 40, &settings).unwrap();
            assert_eq!(image.dimensions(), (40, 40), "{scaling_mode:?}");
        }
    }

    #[test]
    fn fit_paints_the_background_color() {
        let frame = solid(16, 9, [200, 100, 50, 255]);
        let settings = Settings::default()
            .scaling_mode(ScalingMode::Fit([0.0, 0.0, 1.0]))
            .filter_method(FilterMethod::Nearest);
        let image = scale(&frame, 32, 32, &settings).unwrap();

        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(16, 16).0, [200, 100, 50, 255]);
    }

    #[test]
    fn zoom_keeps_the_center() {
        // Left half red, right half blue; zooming into a tall layer keeps the seam centered.
        let mut data = Vec::new();
        for _ in 0..4 {
            for x in 0..8 {
                data.extend_from_slice(if x < 4 { &[255, 0, 0, 255] } else { &[0, 0, 255, 255] });
            }
        }
        let frame = VideoFrame {
            width: 8,
            height: 4,
            data,
        };
        let settings = Settings::default().filter_method(FilterMethod::Nearest);
        let image = scale(&frame, 4, 8, &settings).unwrap();

        assert_eq!(image.get_pixel(0, 4).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(3, 4).0, [0, 0, 255, 255]);
    }
}
