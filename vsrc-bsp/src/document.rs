//! Decoded level: every lump the converter needs, as flat arenas
//!
//! Cross references stay raw. [`LevelDocument`] offers checked accessors
//! that turn a bad index into [`DecodeError::InvalidIndex`] at the point of
//! use, so one bad face never poisons the rest of the level.

use glam::Vec3;
use vsrc_common::{BinaryReader, DecodeError, DecodeResult};

use crate::entities::{Entity, parse_entities};
use crate::game_lump::{GameLump, StaticProps, decode_game_lumps, decode_static_props};
use crate::header::{BspHeader, LumpKind};
use crate::lumps::{
    Brush, BrushSide, DispInfo, DispVert, Edge, Face, Model, Plane, TexData, TexInfo, decode_lump,
};

/// VBSP versions shipped by Source engine games
pub const KNOWN_VERSIONS: std::ops::RangeInclusive<i32> = 17..=21;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelDocument {
    pub version: i32,
    pub map_revision: i32,
    pub planes: Vec<Plane>,
    pub vertices: Vec<Vec3>,
    pub edges: Vec<Edge>,
    /// Signed edge indices. Negative means the edge is walked backwards.
    pub surfedges: Vec<i32>,
    pub faces: Vec<Face>,
    pub texinfos: Vec<TexInfo>,
    pub texdata: Vec<TexData>,
    /// Offsets into `string_data`, indexed by `TexData::name_id`
    pub string_table: Vec<i32>,
    pub string_data: Vec<u8>,
    pub models: Vec<Model>,
    pub brushes: Vec<Brush>,
    pub brush_sides: Vec<BrushSide>,
    pub disp_infos: Vec<DispInfo>,
    pub disp_verts: Vec<DispVert>,
    /// LDR lightmap samples (`ColorRGBExp32`, 4 bytes per luxel)
    pub lighting: Vec<u8>,
    pub lighting_hdr: Vec<u8>,
    pub entities: String,
    pub game_lumps: Vec<GameLump>,
}

/// Decode a whole `.bsp` buffer.
///
/// Any structural problem (bad header, truncated lump, compressed lump)
/// fails the level as a whole.
pub fn decode_level(data: &[u8]) -> DecodeResult<LevelDocument> {
    let header = BspHeader::read(data)?;
    if !KNOWN_VERSIONS.contains(&header.version) {
        tracing::warn!("Unusual VBSP version {}, decoding anyway", header.version);
    }

    let entities = header.lump_bytes(data, LumpKind::Entities, 1)?;
    let entities = String::from_utf8_lossy(entities)
        .trim_end_matches('\0')
        .to_string();

    let doc = LevelDocument {
        version: header.version,
        map_revision: header.map_revision,
        planes: decode_lump(data, &header, LumpKind::Planes)?,
        vertices: decode_lump(data, &header, LumpKind::Vertices)?,
        edges: decode_lump(data, &header, LumpKind::Edges)?,
        surfedges: decode_lump(data, &header, LumpKind::SurfEdges)?,
        faces: decode_lump(data, &header, LumpKind::Faces)?,
        texinfos: decode_lump(data, &header, LumpKind::TexInfo)?,
        texdata: decode_lump(data, &header, LumpKind::TexData)?,
        string_table: decode_lump(data, &header, LumpKind::TexDataStringTable)?,
        string_data: header
            .lump_bytes(data, LumpKind::TexDataStringData, 1)?
            .to_vec(),
        models: decode_lump(data, &header, LumpKind::Models)?,
        brushes: decode_lump(data, &header, LumpKind::Brushes)?,
        brush_sides: decode_lump(data, &header, LumpKind::BrushSides)?,
        disp_infos: decode_lump(data, &header, LumpKind::DispInfo)?,
        disp_verts: decode_lump(data, &header, LumpKind::DispVerts)?,
        lighting: header.lump_bytes(data, LumpKind::Lighting, 4)?.to_vec(),
        lighting_hdr: header.lump_bytes(data, LumpKind::LightingHdr, 4)?.to_vec(),
        entities,
        game_lumps: decode_game_lumps(data, &header)?,
    };

    tracing::debug!(
        "Decoded VBSP v{}: {} faces, {} vertices, {} texinfos, {} models, {} displacements",
        doc.version,
        doc.faces.len(),
        doc.vertices.len(),
        doc.texinfos.len(),
        doc.models.len(),
        doc.disp_infos.len()
    );
    Ok(doc)
}

/// Index into an arena, failing with [`DecodeError::InvalidIndex`]
pub fn checked<'a, T>(items: &'a [T], index: i64, what: &'static str) -> DecodeResult<&'a T> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .ok_or(DecodeError::InvalidIndex {
            what,
            index,
            count: items.len(),
        })
}

impl LevelDocument {
    pub fn plane(&self, index: i64) -> DecodeResult<&Plane> {
        checked(&self.planes, index, "plane")
    }

    pub fn vertex(&self, index: i64) -> DecodeResult<Vec3> {
        checked(&self.vertices, index, "vertex").copied()
    }

    pub fn edge(&self, index: i64) -> DecodeResult<&Edge> {
        checked(&self.edges, index, "edge")
    }

    pub fn surfedge(&self, index: i64) -> DecodeResult<i32> {
        checked(&self.surfedges, index, "surfedge").copied()
    }

    pub fn texinfo(&self, index: i64) -> DecodeResult<&TexInfo> {
        checked(&self.texinfos, index, "texinfo")
    }

    pub fn texdata_at(&self, index: i64) -> DecodeResult<&TexData> {
        checked(&self.texdata, index, "texdata")
    }

    pub fn dispinfo(&self, index: i64) -> DecodeResult<&DispInfo> {
        checked(&self.disp_infos, index, "dispinfo")
    }

    /// Vertex index the surfedge starts at. A negative surfedge walks its
    /// edge backwards, so it starts at the edge's second vertex.
    pub fn surfedge_vertex(&self, surfedge_index: i64) -> DecodeResult<u32> {
        let surfedge = self.surfedge(surfedge_index)?;
        let edge = self.edge(i64::from(surfedge).abs())?;
        let vertex = if surfedge >= 0 { edge.v[0] } else { edge.v[1] };
        Ok(u32::from(vertex))
    }

    /// Ordered vertex indices of a face's boundary loop
    pub fn face_loop(&self, face: &Face) -> DecodeResult<Vec<u32>> {
        let count = face.num_edges.max(0) as i64;
        (0..count)
            .map(|i| {
                let index = self.surfedge_vertex(i64::from(face.first_edge) + i)?;
                checked(&self.vertices, i64::from(index), "vertex")?;
                Ok(index)
            })
            .collect()
    }

    /// Material name for a texdata entry via the string table
    pub fn texdata_name(&self, texdata: i64) -> DecodeResult<String> {
        let td = self.texdata_at(texdata)?;
        let offset = *checked(&self.string_table, i64::from(td.name_id), "texdata string")?;
        let offset = usize::try_from(offset).map_err(|_| DecodeError::InvalidIndex {
            what: "texdata string offset",
            index: i64::from(offset),
            count: self.string_data.len(),
        })?;
        BinaryReader::new(&self.string_data).cstring_at(offset)
    }

    /// Material name a texinfo points at
    pub fn texture_name(&self, texinfo: i64) -> DecodeResult<String> {
        let ti = self.texinfo(texinfo)?;
        self.texdata_name(i64::from(ti.texdata))
    }

    pub fn world(&self) -> Option<&Model> {
        self.models.first()
    }

    /// Faces belonging to a brush model, clamped to the face lump
    pub fn model_faces(&self, model: &Model) -> std::ops::Range<usize> {
        let start = (model.first_face.max(0) as usize).min(self.faces.len());
        let end = start
            .saturating_add(model.num_faces.max(0) as usize)
            .min(self.faces.len());
        start..end
    }

    pub fn entities(&self) -> Vec<Entity> {
        parse_entities(&self.entities)
    }

    pub fn static_props(&self) -> DecodeResult<Option<StaticProps>> {
        decode_static_props(&self.game_lumps)
    }

    /// Lightmap samples, preferring LDR and falling back to HDR
    pub fn lightmap_samples(&self) -> &[u8] {
        if self.lighting.is_empty() {
            &self.lighting_hdr
        } else {
            &self.lighting
        }
    }
}
