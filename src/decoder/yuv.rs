//! BT.601 video-range YUV420 to RGB conversion
//!
//! Fixed-point arithmetic with 8 fractional bits and a +128 rounding bias,
//! chroma upsampled by nearest neighbour. The numeric mapping is exact and
//! must not change: every converted pixel equals `convert_pixel` of its
//! luma sample and the chroma sample at `(x / 2, y / 2)`.

use super::{DecodedImage, RawFrame};

#[inline]
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Converts one YUV sample triple into RGB.
#[inline]
pub fn convert_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [clamp_channel(r), clamp_channel(g), clamp_channel(b)]
}

/// Converts a validated frame into a packed RGBA8 image.
///
/// Odd widths and heights reuse the chroma sample at `index / 2` for the last
/// column and row.
pub fn convert(frame: &RawFrame<'_>) -> DecodedImage {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let chroma_width = frame.chroma_width();

    let mut pixels = vec![0u8; width * height * DecodedImage::BYTES_PER_PIXEL];

    for (row, out) in pixels
        .chunks_exact_mut(width * DecodedImage::BYTES_PER_PIXEL)
        .enumerate()
    {
        let luma = frame.y().row(row, width);
        let u = frame.u().row(row / 2, chroma_width);
        let v = frame.v().row(row / 2, chroma_width);

        for (x, px) in out
            .chunks_exact_mut(DecodedImage::BYTES_PER_PIXEL)
            .enumerate()
        {
            let [r, g, b] = convert_pixel(luma[x], u[x / 2], v[x / 2]);
            px[0] = r;
            px[1] = g;
            px[2] = b;
            px[3] = 255;
        }
    }

    DecodedImage::from_rgba(frame.width(), frame.height(), pixels)
}
