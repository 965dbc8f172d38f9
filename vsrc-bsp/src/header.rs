//! VBSP header and lump directory
//!
//! # Layout
//! ```text
//! 0x000: ident   [u8; 4]  "VBSP"
//! 0x004: version i32
//! 0x008: lumps   [LumpEntry; 64]  (16 bytes each)
//! 0x408: map_revision i32
//! ```
//!
//! Each lump entry is `{ offset i32, length i32, version i32, uncompressed_size i32 }`.
//! A non-zero `uncompressed_size` marks an LZMA-compressed lump.

use vsrc_common::{BinaryReader, DecodeError, DecodeResult};

pub const BSP_IDENT: [u8; 4] = *b"VBSP";
pub const LUMP_COUNT: usize = 64;

/// Lump kinds the decoder understands, with their directory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LumpKind {
    Entities,
    Planes,
    TexData,
    Vertices,
    TexInfo,
    Faces,
    Lighting,
    Edges,
    SurfEdges,
    Models,
    Brushes,
    BrushSides,
    DispInfo,
    DispVerts,
    GameLump,
    TexDataStringData,
    TexDataStringTable,
    LightingHdr,
}

impl LumpKind {
    pub fn index(self) -> usize {
        match self {
            LumpKind::Entities => 0,
            LumpKind::Planes => 1,
            LumpKind::TexData => 2,
            LumpKind::Vertices => 3,
            LumpKind::TexInfo => 6,
            LumpKind::Faces => 7,
            LumpKind::Lighting => 8,
            LumpKind::Edges => 12,
            LumpKind::SurfEdges => 13,
            LumpKind::Models => 14,
            LumpKind::Brushes => 18,
            LumpKind::BrushSides => 19,
            LumpKind::DispInfo => 26,
            LumpKind::DispVerts => 33,
            LumpKind::GameLump => 35,
            LumpKind::TexDataStringData => 43,
            LumpKind::TexDataStringTable => 44,
            LumpKind::LightingHdr => 53,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LumpKind::Entities => "ENTITIES",
            LumpKind::Planes => "PLANES",
            LumpKind::TexData => "TEXDATA",
            LumpKind::Vertices => "VERTEXES",
            LumpKind::TexInfo => "TEXINFO",
            LumpKind::Faces => "FACES",
            LumpKind::Lighting => "LIGHTING",
            LumpKind::Edges => "EDGES",
            LumpKind::SurfEdges => "SURFEDGES",
            LumpKind::Models => "MODELS",
            LumpKind::Brushes => "BRUSHES",
            LumpKind::BrushSides => "BRUSHSIDES",
            LumpKind::DispInfo => "DISPINFO",
            LumpKind::DispVerts => "DISP_VERTS",
            LumpKind::GameLump => "GAME_LUMP",
            LumpKind::TexDataStringData => "TEXDATA_STRING_DATA",
            LumpKind::TexDataStringTable => "TEXDATA_STRING_TABLE",
            LumpKind::LightingHdr => "LIGHTING_HDR",
        }
    }
}

/// One directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LumpEntry {
    pub offset: i32,
    pub length: i32,
    pub version: i32,
    pub uncompressed_size: i32,
}

impl LumpEntry {
    pub const SIZE: usize = 16;

    pub fn is_empty(&self) -> bool {
        self.length <= 0
    }

    pub fn is_compressed(&self) -> bool {
        self.uncompressed_size != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BspHeader {
    pub version: i32,
    pub lumps: [LumpEntry; LUMP_COUNT],
    pub map_revision: i32,
}

impl BspHeader {
    pub const SIZE: usize = 8 + LUMP_COUNT * LumpEntry::SIZE + 4;

    pub fn read(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < Self::SIZE {
            return Err(DecodeError::malformed(format!(
                "file is {} bytes, header needs {}",
                data.len(),
                Self::SIZE
            )));
        }
        let mut r = BinaryReader::new(data);
        let ident: [u8; 4] = r.read_array()?;
        if ident != BSP_IDENT {
            return Err(DecodeError::malformed(format!(
                "bad ident {:?}, expected VBSP",
                String::from_utf8_lossy(&ident)
            )));
        }
        let version = r.read_i32()?;
        let mut lumps = [LumpEntry::default(); LUMP_COUNT];
        for lump in lumps.iter_mut() {
            *lump = LumpEntry {
                offset: r.read_i32()?,
                length: r.read_i32()?,
                version: r.read_i32()?,
                uncompressed_size: r.read_i32()?,
            };
        }
        let map_revision = r.read_i32()?;
        Ok(Self {
            version,
            lumps,
            map_revision,
        })
    }

    pub fn lump(&self, kind: LumpKind) -> &LumpEntry {
        &self.lumps[kind.index()]
    }

    /// Byte range of a lump, checked against the buffer and record size.
    /// Absent lumps yield an empty slice.
    pub fn lump_bytes<'a>(
        &self,
        data: &'a [u8],
        kind: LumpKind,
        record_size: usize,
    ) -> DecodeResult<&'a [u8]> {
        let entry = self.lump(kind);
        if entry.is_empty() {
            return Ok(&[]);
        }
        if entry.is_compressed() {
            return Err(DecodeError::CompressedLump(kind.name()));
        }
        let truncated = || DecodeError::TruncatedLump {
            lump: kind.name(),
            offset: entry.offset.max(0) as usize,
            len: entry.length as usize,
            record_size,
            size: data.len(),
        };
        if entry.offset < 0 || (entry.length as usize) % record_size != 0 {
            return Err(truncated());
        }
        BinaryReader::new(data)
            .slice_at(entry.offset as usize, entry.length as usize)
            .map_err(|_| truncated())
    }
}
