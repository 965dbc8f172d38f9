//! Texture conversion: pixel decoding and output encoding
//!
//! [`RawPixelCodec`] turns any allow-listed source pixel format into RGBA8.
//! The decoded top mip is then written as PNG or re-encoded into a `.vtex`
//! (RGBA8, BC7 or BC5).

use anyhow::{Context, Result};
use half::f16;
use serde::Deserialize;
use vsrc_common::{PixelCodec, PixelFormat, Texture};

use crate::formats::{VTexFormat, VTexHeader, write_vtex};

#[derive(Debug, thiserror::Error)]
pub enum PixelError {
    #[error("{format:?} image of {width}x{height} needs {expected} bytes, got {actual}")]
    SizeMismatch {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Built-in decoder for every uncompressed format plus DXT1/3/5
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPixelCodec;

impl PixelCodec for RawPixelCodec {
    type Error = PixelError;

    fn decode(
        &self,
        format: PixelFormat,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, PixelError> {
        let expected = format.image_size(width, height, 1);
        if bytes.len() < expected {
            return Err(PixelError::SizeMismatch {
                format,
                width,
                height,
                expected,
                actual: bytes.len(),
            });
        }
        let bytes = &bytes[..expected];
        let (w, h) = (width.max(1) as usize, height.max(1) as usize);
        match format {
            PixelFormat::Dxt1 => Ok(decode_blocks(bytes, w, h, 8, |b, out| {
                decode_color_block(b, out, ColorAlpha::Opaque)
            })),
            PixelFormat::Dxt1OneBitAlpha => Ok(decode_blocks(bytes, w, h, 8, |b, out| {
                decode_color_block(b, out, ColorAlpha::PunchThrough)
            })),
            PixelFormat::Dxt3 => Ok(decode_blocks(bytes, w, h, 16, decode_dxt3_block)),
            PixelFormat::Dxt5 => Ok(decode_blocks(bytes, w, h, 16, decode_dxt5_block)),
            _ => {
                let stride = format.bytes_per_pixel();
                let mut out = Vec::with_capacity(w * h * 4);
                for px in bytes.chunks_exact(stride) {
                    out.extend_from_slice(&decode_pixel(format, px));
                }
                Ok(out)
            }
        }
    }
}

fn expand(value: u16, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((u32::from(value) * 255 + max / 2) / max) as u8
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn f32_at(px: &[u8], i: usize) -> f32 {
    f32::from_le_bytes([px[i * 4], px[i * 4 + 1], px[i * 4 + 2], px[i * 4 + 3]])
}

fn u16_at(px: &[u8], i: usize) -> u16 {
    u16::from_le_bytes([px[i * 2], px[i * 2 + 1]])
}

/// One uncompressed pixel to RGBA8. Channel order and bit packing follow
/// the format name, lowest bits first for packed 16-bit formats.
fn decode_pixel(format: PixelFormat, px: &[u8]) -> [u8; 4] {
    use PixelFormat::*;
    match format {
        Rgba8888 | Uvwq8888 | Uvlx8888 => [px[0], px[1], px[2], px[3]],
        Abgr8888 => [px[3], px[2], px[1], px[0]],
        Argb8888 => [px[1], px[2], px[3], px[0]],
        Bgra8888 => [px[2], px[1], px[0], px[3]],
        Bgrx8888 => [px[2], px[1], px[0], 255],
        Rgb888 => [px[0], px[1], px[2], 255],
        Bgr888 => [px[2], px[1], px[0], 255],
        Rgb888Bluescreen => bluescreen([px[0], px[1], px[2]]),
        Bgr888Bluescreen => bluescreen([px[2], px[1], px[0]]),
        Rgb565 => {
            let v = u16_at(px, 0);
            [expand(v & 0x1f, 5), expand((v >> 5) & 0x3f, 6), expand(v >> 11, 5), 255]
        }
        Bgr565 => {
            let v = u16_at(px, 0);
            [expand(v >> 11, 5), expand((v >> 5) & 0x3f, 6), expand(v & 0x1f, 5), 255]
        }
        Bgrx5551 | Bgra5551 => {
            let v = u16_at(px, 0);
            let a = if format == Bgra5551 && v & 0x8000 == 0 {
                0
            } else {
                255
            };
            [
                expand((v >> 10) & 0x1f, 5),
                expand((v >> 5) & 0x1f, 5),
                expand(v & 0x1f, 5),
                a,
            ]
        }
        Bgra4444 => {
            let v = u16_at(px, 0);
            [
                expand((v >> 8) & 0xf, 4),
                expand((v >> 4) & 0xf, 4),
                expand(v & 0xf, 4),
                expand(v >> 12, 4),
            ]
        }
        I8 => [px[0], px[0], px[0], 255],
        Ia88 => [px[0], px[0], px[0], px[1]],
        A8 => [0, 0, 0, px[0]],
        Uv88 => [px[0], px[1], 0, 255],
        Rgba16161616F => {
            let c = |i| unit_to_u8(f16::from_bits(u16_at(px, i)).to_f32());
            [c(0), c(1), c(2), c(3)]
        }
        Rgba16161616 => {
            let c = |i| (u16_at(px, i) >> 8) as u8;
            [c(0), c(1), c(2), c(3)]
        }
        R32F => {
            let r = unit_to_u8(f32_at(px, 0));
            [r, r, r, 255]
        }
        Rgb323232F => [
            unit_to_u8(f32_at(px, 0)),
            unit_to_u8(f32_at(px, 1)),
            unit_to_u8(f32_at(px, 2)),
            255,
        ],
        Rgba32323232F => [
            unit_to_u8(f32_at(px, 0)),
            unit_to_u8(f32_at(px, 1)),
            unit_to_u8(f32_at(px, 2)),
            unit_to_u8(f32_at(px, 3)),
        ],
        Dxt1 | Dxt1OneBitAlpha | Dxt3 | Dxt5 => [0, 0, 0, 0],
    }
}

/// Pure blue marks transparent texels
fn bluescreen(rgb: [u8; 3]) -> [u8; 4] {
    if rgb == [0, 0, 255] {
        [0, 0, 0, 0]
    } else {
        [rgb[0], rgb[1], rgb[2], 255]
    }
}

/// Walk 4x4 blocks, clipping the decoded texels to the image
fn decode_blocks(
    bytes: &[u8],
    width: usize,
    height: usize,
    block_size: usize,
    decode: impl Fn(&[u8], &mut [[u8; 4]; 16]),
) -> Vec<u8> {
    let mut out = vec![0u8; width * height * 4];
    let blocks_x = width.div_ceil(4);
    for (i, block) in bytes.chunks_exact(block_size).enumerate() {
        let (bx, by) = (i % blocks_x * 4, i / blocks_x * 4);
        let mut texels = [[0u8; 4]; 16];
        decode(block, &mut texels);
        for (t, texel) in texels.iter().enumerate() {
            let (x, y) = (bx + t % 4, by + t / 4);
            if x < width && y < height {
                let at = (y * width + x) * 4;
                out[at..at + 4].copy_from_slice(texel);
            }
        }
    }
    out
}

fn rgb565(v: u16) -> [u8; 4] {
    [expand(v >> 11, 5), expand((v >> 5) & 0x3f, 6), expand(v & 0x1f, 5), 255]
}

fn mix(a: [u8; 4], b: [u8; 4], wa: u16, wb: u16) -> [u8; 4] {
    let total = wa + wb;
    let c = |i: usize| ((u16::from(a[i]) * wa + u16::from(b[i]) * wb) / total) as u8;
    [c(0), c(1), c(2), 255]
}

/// Alpha handling of a BC1 color block
#[derive(Clone, Copy, PartialEq, Eq)]
enum ColorAlpha {
    /// DXT1: 3-color mode ends in opaque black
    Opaque,
    /// DXT1 with one-bit alpha: 3-color mode ends in transparent black
    PunchThrough,
    /// DXT3/DXT5: always 4-color, alpha comes from the alpha block
    External,
}

fn decode_color_block(block: &[u8], out: &mut [[u8; 4]; 16], alpha: ColorAlpha) {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let (a, b) = (rgb565(c0), rgb565(c1));
    let palette = if c0 > c1 || alpha == ColorAlpha::External {
        [a, b, mix(a, b, 2, 1), mix(a, b, 1, 2)]
    } else if alpha == ColorAlpha::PunchThrough {
        [a, b, mix(a, b, 1, 1), [0; 4]]
    } else {
        [a, b, mix(a, b, 1, 1), [0, 0, 0, 255]]
    };
    let bits = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    for (i, texel) in out.iter_mut().enumerate() {
        *texel = palette[((bits >> (i * 2)) & 0x3) as usize];
    }
}

fn decode_dxt3_block(block: &[u8], out: &mut [[u8; 4]; 16]) {
    decode_color_block(&block[8..], out, ColorAlpha::External);
    for (i, texel) in out.iter_mut().enumerate() {
        let nibble = (block[i / 2] >> ((i % 2) * 4)) & 0xf;
        texel[3] = nibble * 17;
    }
}

fn decode_dxt5_block(block: &[u8], out: &mut [[u8; 4]; 16]) {
    decode_color_block(&block[8..], out, ColorAlpha::External);
    let (a0, a1) = (u16::from(block[0]), u16::from(block[1]));
    let mut alpha = [a0 as u8, a1 as u8, 0, 0, 0, 0, 0, 0];
    if a0 > a1 {
        for i in 1..7u16 {
            alpha[i as usize + 1] = (((7 - i) * a0 + i * a1) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            alpha[i as usize + 1] = (((5 - i) * a0 + i * a1) / 5) as u8;
        }
        alpha[6] = 0;
        alpha[7] = 255;
    }
    let mut bits = 0u64;
    for (i, b) in block[2..8].iter().enumerate() {
        bits |= u64::from(*b) << (i * 8);
    }
    for (i, texel) in out.iter_mut().enumerate() {
        texel[3] = alpha[((bits >> (i * 3)) & 0x7) as usize];
    }
}

/// Output encoding for decoded textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    #[default]
    Png,
    Rgba8,
    Bc7,
    Bc5,
}

impl TextureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TextureFormat::Png => "png",
            TextureFormat::Rgba8 | TextureFormat::Bc7 | TextureFormat::Bc5 => "vtex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Some(TextureFormat::Png),
            "rgba8" => Some(TextureFormat::Rgba8),
            "bc7" => Some(TextureFormat::Bc7),
            "bc5" => Some(TextureFormat::Bc5),
            _ => None,
        }
    }
}

/// Top mip, first frame and face, as RGBA8
pub fn decode_top_mip<C: PixelCodec>(texture: &Texture, codec: &C) -> Result<image::RgbaImage> {
    let pixels = texture
        .top_image()
        .with_context(|| format!("Texture '{}' has no image data", texture.name))?;
    let rgba = codec
        .decode(texture.format, pixels, texture.width, texture.height)
        .with_context(|| format!("Failed to decode pixels of '{}'", texture.name))?;
    image::RgbaImage::from_raw(texture.width.max(1), texture.height.max(1), rgba)
        .with_context(|| format!("Decoded size mismatch for '{}'", texture.name))
}

/// Encode RGBA8 pixels in the requested output format
pub fn encode_image(image: &image::RgbaImage, format: TextureFormat, linear: bool) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    if format == TextureFormat::Png {
        let mut out = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .context("Failed to encode PNG")?;
        return Ok(out.into_inner());
    }
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        anyhow::bail!("Texture {}x{} exceeds .vtex limits", width, height);
    }
    let pixels = image.as_raw();
    let (vtex_format, data) = match format {
        TextureFormat::Bc7 => (VTexFormat::Bc7, compress_bc7(pixels, width, height)),
        TextureFormat::Bc5 => (VTexFormat::Bc5, compress_bc5(pixels, width, height)),
        _ => (VTexFormat::Rgba8, pixels.to_vec()),
    };
    let mut out = Vec::with_capacity(VTexHeader::SIZE + data.len());
    write_vtex(
        &mut out,
        VTexHeader::new(width, height, vtex_format, linear),
        &data,
    )?;
    Ok(out)
}

/// Copy pixels into a buffer padded to whole 4x4 blocks, repeating edges
fn pad_to_blocks(pixels: &[u8], width: u32, height: u32, channels: &[usize]) -> (Vec<u8>, usize, usize) {
    let (w, h) = (width as usize, height as usize);
    let padded_width = w.div_ceil(4) * 4;
    let padded_height = h.div_ceil(4) * 4;
    let mut out = Vec::with_capacity(padded_width * padded_height * channels.len());
    for y in 0..padded_height {
        for x in 0..padded_width {
            let src = (y.min(h - 1) * w + x.min(w - 1)) * 4;
            out.extend(channels.iter().map(|&c| pixels[src + c]));
        }
    }
    (out, padded_width, padded_height)
}

/// RGBA8 to BC7 (fast settings)
pub fn compress_bc7(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    use intel_tex_2::bc7;

    let (data, padded_width, padded_height) = pad_to_blocks(pixels, width, height, &[0, 1, 2, 3]);
    let mut output = vec![0u8; padded_width / 4 * padded_height / 4 * 16];
    let surface = intel_tex_2::RgbaSurface {
        width: padded_width as u32,
        height: padded_height as u32,
        stride: (padded_width * 4) as u32,
        data: &data,
    };
    let settings = if pixels.chunks_exact(4).all(|p| p[3] == 255) {
        bc7::opaque_fast_settings()
    } else {
        bc7::alpha_fast_settings()
    };
    bc7::compress_blocks_into(&settings, &surface, &mut output);
    output
}

/// RG channels of RGBA8 to BC5, for normal maps
pub fn compress_bc5(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    use intel_tex_2::bc5;

    let (data, padded_width, padded_height) = pad_to_blocks(pixels, width, height, &[0, 1]);
    let mut output = vec![0u8; padded_width / 4 * padded_height / 4 * 16];
    let surface = intel_tex_2::RgSurface {
        width: padded_width as u32,
        height: padded_height as u32,
        stride: (padded_width * 2) as u32,
        data: &data,
    };
    bc5::compress_blocks_into(&surface, &mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(format: PixelFormat, bytes: &[u8], w: u32, h: u32) -> Vec<u8> {
        RawPixelCodec.decode(format, bytes, w, h).unwrap()
    }

    #[test]
    fn test_channel_orders() {
        let px = [10, 20, 30, 40];
        assert_eq!(decode(PixelFormat::Rgba8888, &px, 1, 1), [10, 20, 30, 40]);
        assert_eq!(decode(PixelFormat::Bgra8888, &px, 1, 1), [30, 20, 10, 40]);
        assert_eq!(decode(PixelFormat::Abgr8888, &px, 1, 1), [40, 30, 20, 10]);
        assert_eq!(decode(PixelFormat::Argb8888, &px, 1, 1), [20, 30, 40, 10]);
        assert_eq!(decode(PixelFormat::Bgrx8888, &px, 1, 1), [30, 20, 10, 255]);
        assert_eq!(decode(PixelFormat::Bgr888, &px[..3], 1, 1), [30, 20, 10, 255]);
        assert_eq!(decode(PixelFormat::Ia88, &px[..2], 1, 1), [10, 10, 10, 20]);
    }

    #[test]
    fn test_packed_16_bit() {
        // red in the low bits for RGB565
        assert_eq!(decode(PixelFormat::Rgb565, &0x001fu16.to_le_bytes(), 1, 1), [255, 0, 0, 255]);
        assert_eq!(decode(PixelFormat::Bgr565, &0x001fu16.to_le_bytes(), 1, 1), [0, 0, 255, 255]);
        assert_eq!(decode(PixelFormat::Bgra5551, &0x7c00u16.to_le_bytes(), 1, 1), [255, 0, 0, 0]);
        assert_eq!(decode(PixelFormat::Bgra4444, &0xf00fu16.to_le_bytes(), 1, 1), [0, 0, 255, 255]);
    }

    #[test]
    fn test_bluescreen_is_transparent() {
        assert_eq!(decode(PixelFormat::Rgb888Bluescreen, &[0, 0, 255], 1, 1), [0, 0, 0, 0]);
        assert_eq!(decode(PixelFormat::Rgb888Bluescreen, &[1, 0, 255], 1, 1), [1, 0, 255, 255]);
    }

    #[test]
    fn test_half_float_clamps() {
        let mut px = Vec::new();
        for v in [0.5f32, 2.0, -1.0, 1.0] {
            px.extend_from_slice(&f16::from_f32(v).to_bits().to_le_bytes());
        }
        assert_eq!(decode(PixelFormat::Rgba16161616F, &px, 1, 1), [128, 255, 0, 255]);
    }

    #[test]
    fn test_dxt1_solid_block() {
        // c0 = pure red, c1 = black, every index 0
        let mut block = Vec::new();
        block.extend_from_slice(&0xf800u16.to_le_bytes());
        block.extend_from_slice(&0x0000u16.to_le_bytes());
        block.extend_from_slice(&[0; 4]);
        let rgba = decode(PixelFormat::Dxt1, &block, 4, 4);
        assert_eq!(rgba.len(), 64);
        assert!(rgba.chunks(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn test_dxt1_one_bit_alpha_transparent_entry() {
        // c0 <= c1 selects 3-color mode; index 3 is transparent
        let mut block = Vec::new();
        block.extend_from_slice(&0x0000u16.to_le_bytes());
        block.extend_from_slice(&0xffffu16.to_le_bytes());
        block.extend_from_slice(&[0xff; 4]);
        let rgba = decode(PixelFormat::Dxt1OneBitAlpha, &block, 4, 4);
        assert!(rgba.chunks(4).all(|p| p[3] == 0));
    }

    #[test]
    fn test_dxt5_alpha_endpoints() {
        let mut block = vec![200u8, 100];
        // first texel index 1, the rest index 0
        block.extend_from_slice(&[1, 0, 0, 0, 0, 0]);
        block.extend_from_slice(&0xffffu16.to_le_bytes());
        block.extend_from_slice(&0xffffu16.to_le_bytes());
        block.extend_from_slice(&[0; 4]);
        let rgba = decode(PixelFormat::Dxt5, &block, 4, 4);
        assert_eq!(rgba[3], 100);
        assert_eq!(rgba[7], 200);
        assert_eq!(&rgba[0..3], &[255, 255, 255]);
    }

    #[test]
    fn test_small_dxt_image_is_clipped() {
        let block = [0u8; 16];
        let rgba = decode(PixelFormat::Dxt3, &block, 2, 1);
        assert_eq!(rgba.len(), 2 * 4);
    }

    #[test]
    fn test_short_input_is_error() {
        let err = RawPixelCodec
            .decode(PixelFormat::Rgba8888, &[0; 12], 2, 2)
            .unwrap_err();
        assert!(matches!(err, PixelError::SizeMismatch { expected: 16, actual: 12, .. }));
    }

    #[test]
    fn test_encode_png_and_rgba8() {
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let png = encode_image(&image, TextureFormat::Png, false).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let raw = encode_image(&image, TextureFormat::Rgba8, true).unwrap();
        let header = VTexHeader::from_bytes(&raw).unwrap();
        assert_eq!((header.width, header.height), (3, 2));
        assert_eq!(header.flags, VTexHeader::FLAG_LINEAR);
        assert_eq!(raw.len(), VTexHeader::SIZE + 3 * 2 * 4);
    }

    #[test]
    fn test_padding_repeats_edges() {
        let pixels: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
        let (padded, w, h) = pad_to_blocks(&pixels, 2, 2, &[0, 1]);
        assert_eq!((w, h), (4, 4));
        assert_eq!(padded.len(), 4 * 4 * 2);
        // (3, 0) repeats pixel (1, 0)
        assert_eq!(&padded[6..8], &[4, 5]);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(TextureFormat::parse("BC7"), Some(TextureFormat::Bc7));
        assert_eq!(TextureFormat::Bc5.extension(), "vtex");
        assert_eq!(TextureFormat::parse("dxt9"), None);
    }
}
