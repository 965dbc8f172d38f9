//! Mip chain location
//!
//! Image data is stored smallest mip first. Within one mip the order is
//! frames, then faces, then depth slices. Nothing is decompressed here; each
//! mip is copied out as the raw bytes of its declared format.

use vsrc_common::{
    BinaryReader, DecodeError, DecodeResult, MipLevel, PixelFormat, Texture, max_mip_count,
    mip_dimension,
};

use crate::header::{RESOURCE_IMAGE, RESOURCE_LOW_RES_IMAGE, ResourceData, VtfHeader};

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDocument {
    pub header: VtfHeader,
    /// Low-resolution preview, usually DXT1 16x16
    pub thumbnail: Option<MipLevel>,
    /// Largest mip first. Each holds every frame, face and slice of its level.
    pub mips: Vec<MipLevel>,
}

/// Bytes one mip level occupies across all frames, faces and slices.
/// `None` when the header declares more than `usize` can address.
pub fn mip_level_size(header: &VtfHeader, level: u32) -> Option<usize> {
    let w = mip_dimension(header.width, level);
    let h = mip_dimension(header.height, level);
    let d = mip_dimension(header.depth, level);
    header
        .format
        .checked_image_size(w, h, d)?
        .checked_mul(header.frames as usize)?
        .checked_mul(header.face_count() as usize)
}

/// Decode a `.vtf` buffer into its header and raw mip chain
pub fn decode_texture(data: &[u8]) -> DecodeResult<TextureDocument> {
    let header = VtfHeader::read(data)?;

    let limit = max_mip_count(header.width, header.height);
    if header.mip_count == 0 || header.mip_count > limit {
        return Err(DecodeError::malformed(format!(
            "mip count {} out of range 1..={} for {}x{}",
            header.mip_count, limit, header.width, header.height
        )));
    }

    let thumbnail_size = header
        .low_res_format
        .map(|f| f.image_size(header.low_res_width, header.low_res_height, 1))
        .unwrap_or(0);

    let (thumbnail_offset, image_offset) = if header.resources.is_empty() {
        let thumb = header.header_size as usize;
        (thumb, thumb.saturating_add(thumbnail_size))
    } else {
        let offset_of = |tag| match header.resource(tag).map(|r| &r.data) {
            Some(ResourceData::Offset(offset)) => Some(*offset as usize),
            _ => None,
        };
        let image = offset_of(RESOURCE_IMAGE)
            .ok_or_else(|| DecodeError::malformed("resource directory has no image entry"))?;
        (offset_of(RESOURCE_LOW_RES_IMAGE).unwrap_or(0), image)
    };

    let file = BinaryReader::new(data);

    let thumbnail = match header.low_res_format {
        Some(format) if thumbnail_size > 0 && thumbnail_offset > 0 => {
            match file.slice_at(thumbnail_offset, thumbnail_size) {
                Ok(bytes) => Some(MipLevel {
                    width: header.low_res_width,
                    height: header.low_res_height,
                    depth: 1,
                    data: bytes.to_vec(),
                }),
                Err(_) => {
                    tracing::warn!(
                        "Thumbnail ({:?}, {} bytes at {}) passes end of file, ignoring",
                        format,
                        thumbnail_size,
                        thumbnail_offset
                    );
                    None
                }
            }
        }
        _ => None,
    };

    // Walk from the smallest level up, then flip so the largest comes first.
    let mut mips = Vec::with_capacity(header.mip_count as usize);
    let mut offset = image_offset;
    for level in (0..header.mip_count).rev() {
        let size = mip_level_size(&header, level).ok_or_else(|| {
            DecodeError::malformed(format!(
                "mip {} of {}x{}x{} {:?} ({} frames, {} faces) overflows",
                level,
                header.width,
                header.height,
                header.depth,
                header.format,
                header.frames,
                header.face_count()
            ))
        })?;
        let bytes = file
            .slice_at(offset, size)
            .map_err(|_| DecodeError::TruncatedMip {
                level,
                offset,
                len: size,
                size: data.len(),
            })?;
        mips.push(MipLevel {
            width: mip_dimension(header.width, level),
            height: mip_dimension(header.height, level),
            depth: mip_dimension(header.depth, level),
            data: bytes.to_vec(),
        });
        offset = offset.checked_add(size).ok_or(DecodeError::TruncatedMip {
            level,
            offset,
            len: size,
            size: data.len(),
        })?;
    }
    mips.reverse();

    tracing::debug!(
        "Decoded VTF {}.{}: {}x{} {:?}, {} mips, {} frames, {} faces",
        header.version.0,
        header.version.1,
        header.width,
        header.height,
        header.format,
        mips.len(),
        header.frames,
        header.face_count()
    );

    Ok(TextureDocument {
        header,
        thumbnail,
        mips,
    })
}

impl TextureDocument {
    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn format(&self) -> PixelFormat {
        self.header.format
    }

    pub fn mip_count(&self) -> usize {
        self.mips.len()
    }

    /// Bytes of one 2D image. `mip` 0 is the largest.
    pub fn image(&self, mip: usize, frame: u32, face: u32, slice: u32) -> Option<&[u8]> {
        let level = self.mips.get(mip)?;
        let faces = self.header.face_count();
        if frame >= self.header.frames || face >= faces || slice >= level.depth {
            return None;
        }
        let slice_size = self
            .header
            .format
            .checked_image_size(level.width, level.height, 1)?;
        let index = (frame as usize * faces as usize + face as usize) * level.depth as usize
            + slice as usize;
        let start = index.checked_mul(slice_size)?;
        level.data.get(start..start.checked_add(slice_size)?)
    }

    /// Convert into the engine-agnostic texture, consuming the mip data
    pub fn into_texture(self, name: impl Into<String>) -> Texture {
        let linear = self.header.is_linear();
        Texture {
            name: name.into(),
            width: self.header.width,
            height: self.header.height,
            format: self.header.format,
            frames: self.header.frames,
            faces: self.header.face_count(),
            mips: self.mips,
            linear,
        }
    }
}
