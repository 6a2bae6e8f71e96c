// SPDX-License-Identifier: MPL-2.0

use image::RgbaImage;
use sctk::{
    reexports::client::protocol::wl_shm,
    shell::{WaylandSurface, wlr_layer::LayerSurface},
    shm::slot::{Buffer, CreateBufferError, SlotPool},
};

pub fn canvas(
    pool: &mut SlotPool,
    image: &RgbaImage,
    width: i32,
    height: i32,
    stride: i32,
) -> Result<Buffer, CreateBufferError> {
    let (buffer, canvas) = pool.create_buffer(width, height, stride, wl_shm::Format::Xrgb8888)?;

    xrgb888_canvas(canvas, image);

    Ok(buffer)
}

pub fn layer_surface(layer: &LayerSurface, buffer: &Buffer, buffer_damage: (i32, i32)) {
    let wl_surface = layer.wl_surface();

    // Damage the entire window
    wl_surface.damage_buffer(0, 0, buffer_damage.0, buffer_damage.1);

    // Attach and commit to present.
    if let Err(why) = buffer.attach_to(wl_surface) {
        tracing::error!(?why, "buffer attachment failed");
    }

    wl_surface.commit();
}

/// Draws the image on an 8-bit canvas.
pub fn xrgb888_canvas(canvas: &mut [u8], image: &RgbaImage) {
    for (dest, pixel) in canvas.chunks_exact_mut(4).zip(image.pixels()) {
        let [r, g, b, _] = pixel.0;

        let r = u32::from(r) << 16;
        let g = u32::from(g) << 8;
        let b = u32::from(b);

        dest.copy_from_slice(&(r | g | b).to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_are_packed_little_endian_xrgb() {
        let image = RgbaImage::from_raw(2, 1, vec![0x11, 0x22, 0x33, 0xff, 0xaa, 0xbb, 0xcc, 0x00])
            .unwrap();
        let mut canvas = [0xffu8; 8];

        xrgb888_canvas(&mut canvas, &image);

        assert_eq!(canvas, [0x33, 0x22, 0x11, 0x00, 0xcc, 0xbb, 0xaa, 0x00]);
    }
}
