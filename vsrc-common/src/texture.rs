//! Pixel formats and the intermediate texture representation
//!
//! The format table is a closed allow-list. Raw enum values that are not
//! listed here are rejected, never mapped to a default.

use serde::Serialize;

use crate::error::{DecodeError, DecodeResult};

/// Pixel formats a texture container may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixelFormat {
    Rgba8888,
    Abgr8888,
    Rgb888,
    Bgr888,
    Rgb565,
    I8,
    Ia88,
    A8,
    Rgb888Bluescreen,
    Bgr888Bluescreen,
    Argb8888,
    Bgra8888,
    Dxt1,
    Dxt3,
    Dxt5,
    Bgrx8888,
    Bgr565,
    Bgrx5551,
    Bgra4444,
    Dxt1OneBitAlpha,
    Bgra5551,
    Uv88,
    Uvwq8888,
    Rgba16161616F,
    Rgba16161616,
    Uvlx8888,
    R32F,
    Rgb323232F,
    Rgba32323232F,
}

impl PixelFormat {
    /// Map the on-disk enum value. `P8` (7) is declared by the format but
    /// never used by the engine and is not accepted.
    pub fn from_raw(raw: i32) -> DecodeResult<Self> {
        use PixelFormat::*;
        let format = match raw {
            0 => Rgba8888,
            1 => Abgr8888,
            2 => Rgb888,
            3 => Bgr888,
            4 => Rgb565,
            5 => I8,
            6 => Ia88,
            8 => A8,
            9 => Rgb888Bluescreen,
            10 => Bgr888Bluescreen,
            11 => Argb8888,
            12 => Bgra8888,
            13 => Dxt1,
            14 => Dxt3,
            15 => Dxt5,
            16 => Bgrx8888,
            17 => Bgr565,
            18 => Bgrx5551,
            19 => Bgra4444,
            20 => Dxt1OneBitAlpha,
            21 => Bgra5551,
            22 => Uv88,
            23 => Uvwq8888,
            24 => Rgba16161616F,
            25 => Rgba16161616,
            26 => Uvlx8888,
            27 => R32F,
            28 => Rgb323232F,
            29 => Rgba32323232F,
            _ => return Err(DecodeError::UnsupportedPixelFormat(raw)),
        };
        Ok(format)
    }

    pub fn to_raw(self) -> i32 {
        use PixelFormat::*;
        match self {
            Rgba8888 => 0,
            Abgr8888 => 1,
            Rgb888 => 2,
            Bgr888 => 3,
            Rgb565 => 4,
            I8 => 5,
            Ia88 => 6,
            A8 => 8,
            Rgb888Bluescreen => 9,
            Bgr888Bluescreen => 10,
            Argb8888 => 11,
            Bgra8888 => 12,
            Dxt1 => 13,
            Dxt3 => 14,
            Dxt5 => 15,
            Bgrx8888 => 16,
            Bgr565 => 17,
            Bgrx5551 => 18,
            Bgra4444 => 19,
            Dxt1OneBitAlpha => 20,
            Bgra5551 => 21,
            Uv88 => 22,
            Uvwq8888 => 23,
            Rgba16161616F => 24,
            Rgba16161616 => 25,
            Uvlx8888 => 26,
            R32F => 27,
            Rgb323232F => 28,
            Rgba32323232F => 29,
        }
    }

    /// Bytes per 4x4 block for block-compressed formats
    pub fn block_bytes(self) -> Option<usize> {
        match self {
            PixelFormat::Dxt1 | PixelFormat::Dxt1OneBitAlpha => Some(8),
            PixelFormat::Dxt3 | PixelFormat::Dxt5 => Some(16),
            _ => None,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.block_bytes().is_some()
    }

    /// Bytes per pixel for uncompressed formats; 0 for block formats
    pub fn bytes_per_pixel(self) -> usize {
        use PixelFormat::*;
        match self {
            Rgba8888 | Abgr8888 | Argb8888 | Bgra8888 | Bgrx8888 | Uvwq8888 | Uvlx8888 | R32F => 4,
            Rgb888 | Bgr888 | Rgb888Bluescreen | Bgr888Bluescreen => 3,
            Rgb565 | Ia88 | Bgr565 | Bgrx5551 | Bgra4444 | Bgra5551 | Uv88 => 2,
            I8 | A8 => 1,
            Rgba16161616F | Rgba16161616 => 8,
            Rgb323232F => 12,
            Rgba32323232F => 16,
            Dxt1 | Dxt1OneBitAlpha | Dxt3 | Dxt5 => 0,
        }
    }

    pub fn has_alpha(self) -> bool {
        use PixelFormat::*;
        matches!(
            self,
            Rgba8888
                | Abgr8888
                | Ia88
                | A8
                | Argb8888
                | Bgra8888
                | Dxt1OneBitAlpha
                | Dxt3
                | Dxt5
                | Bgra4444
                | Bgra5551
                | Rgba16161616F
                | Rgba16161616
                | Rgba32323232F
        )
    }

    /// Byte size of one image of the given dimensions in this format.
    /// Block formats round each dimension up to whole 4x4 blocks.
    /// Saturates at `usize::MAX`; see [`Self::checked_image_size`].
    pub fn image_size(self, width: u32, height: u32, depth: u32) -> usize {
        self.checked_image_size(width, height, depth)
            .unwrap_or(usize::MAX)
    }

    /// [`Self::image_size`], or `None` when the size does not fit in `usize`
    pub fn checked_image_size(self, width: u32, height: u32, depth: u32) -> Option<usize> {
        let (w, h, d) = (width.max(1) as usize, height.max(1) as usize, depth.max(1) as usize);
        match self.block_bytes() {
            Some(block) => w
                .div_ceil(4)
                .checked_mul(h.div_ceil(4))?
                .checked_mul(block)?
                .checked_mul(d),
            None => w
                .checked_mul(h)?
                .checked_mul(d)?
                .checked_mul(self.bytes_per_pixel()),
        }
    }
}

/// Dimensions of mip `level` for a base size; halves with floor, minimum 1
pub fn mip_dimension(base: u32, level: u32) -> u32 {
    base.checked_shr(level).unwrap_or(0).max(1)
}

/// Largest legal mip count for a base size: log2(max(w, h)) + 1
pub fn max_mip_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    32 - largest.leading_zeros()
}

/// One mip level of a texture; holds every frame/face/slice of that level
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub data: Vec<u8>,
}

/// Engine-agnostic texture: declared format plus raw mip bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub frames: u32,
    pub faces: u32,
    /// Largest mip first
    pub mips: Vec<MipLevel>,
    /// Treat as linear data (normal maps, masks)
    pub linear: bool,
}

impl Texture {
    /// Bytes of the top mip, first frame, first face
    pub fn top_image(&self) -> Option<&[u8]> {
        let mip = self.mips.first()?;
        let size = self.format.image_size(mip.width, mip.height, mip.depth);
        mip.data.get(..size)
    }
}
