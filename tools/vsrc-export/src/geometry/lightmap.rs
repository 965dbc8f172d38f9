//! Lightmap atlas: shelf-packs face lightmap rectangles onto one page
//! and optionally bakes the level's lighting samples into it.

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use vsrc_bsp::Face;
use vsrc_bsp::lumps::SURF_NOLIGHT;
use vsrc_common::{Diagnostics, MipLevel, PixelFormat, Texture};

use super::face::FacePolygon;

/// Largest page the packer will grow to
pub const MAX_LIGHTMAP_PAGE: u32 = 4096;

/// Bytes per ColorRGBExp32 sample
const SAMPLE_SIZE: usize = 4;

/// Rectangle of one face on the page, in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightmapRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LightmapAtlas {
    page: u32,
    rects: HashMap<u32, LightmapRect>,
}

/// Luxel extent of a face: a size of N covers N + 1 samples
fn face_extent(face: &Face) -> Option<(u32, u32)> {
    let w = u32::try_from(face.lightmap_size[0]).ok()?;
    let h = u32::try_from(face.lightmap_size[1]).ok()?;
    Some((w + 1, h + 1))
}

fn shelf_pack(items: &[(u32, u32, u32)], page: u32) -> Option<HashMap<u32, LightmapRect>> {
    let mut rects = HashMap::with_capacity(items.len());
    let (mut x, mut y, mut shelf) = (0u32, 0u32, 0u32);
    for &(face, width, height) in items {
        if width > page || height > page {
            return None;
        }
        if x + width > page {
            y += shelf;
            x = 0;
            shelf = 0;
        }
        if y + height > page {
            return None;
        }
        rects.insert(
            face,
            LightmapRect {
                x,
                y,
                width,
                height,
            },
        );
        x += width;
        shelf = shelf.max(height);
    }
    Some(rects)
}

impl LightmapAtlas {
    /// Pack every lit polygon, doubling the page until everything fits.
    /// Faces that do not fit even the largest page get no lightmap.
    pub fn pack<'a>(
        polygons: impl IntoIterator<Item = &'a FacePolygon>,
        initial_page: u32,
        diag: &mut Diagnostics,
    ) -> Self {
        let mut items: Vec<(u32, u32, u32)> = polygons
            .into_iter()
            .filter(|p| p.face.has_lightmap() && !p.texinfo.has_flag(SURF_NOLIGHT))
            .filter_map(|p| face_extent(&p.face).map(|(w, h)| (p.index, w, h)))
            .collect();
        // Tallest first keeps shelves tight; face index breaks ties
        items.sort_by(|a, b| b.2.cmp(&a.2).then(b.1.cmp(&a.1)).then(a.0.cmp(&b.0)));

        let mut page = initial_page.clamp(16, MAX_LIGHTMAP_PAGE).next_power_of_two();
        loop {
            if let Some(rects) = shelf_pack(&items, page) {
                tracing::debug!("Packed {} lightmaps into a {}x{} page", rects.len(), page, page);
                return Self { page, rects };
            }
            if page >= MAX_LIGHTMAP_PAGE {
                break;
            }
            page *= 2;
        }

        // Pack what fits at the largest size and drop the rest
        let mut rects = HashMap::new();
        let mut fitted = Vec::new();
        for item in &items {
            fitted.push(*item);
            match shelf_pack(&fitted, page) {
                Some(packed) => rects = packed,
                None => {
                    fitted.pop();
                    diag.skipped(
                        format!("lightmap of face {}", item.0),
                        format!("does not fit a {}x{} page", page, page),
                    );
                }
            }
        }
        Self { page, rects }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn rect(&self, face: u32) -> Option<LightmapRect> {
        self.rects.get(&face).copied()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Normalised page coordinates for a luxel position of `face`
    pub fn uv(&self, face: u32, luxel: Vec2) -> Vec2 {
        match self.rect(face) {
            Some(rect) => {
                let local = luxel.clamp(
                    Vec2::ZERO,
                    Vec2::new((rect.width - 1) as f32, (rect.height - 1) as f32),
                );
                (Vec2::new(rect.x as f32, rect.y as f32) + local + 0.5) / self.page as f32
            }
            None => Vec2::ZERO,
        }
    }

    /// Bake style-0 lighting samples into an RGBA8 page
    pub fn bake(&self, faces: &[Face], samples: &[u8], diag: &mut Diagnostics) -> Option<Texture> {
        if self.rects.is_empty() || samples.is_empty() {
            return None;
        }
        let page = self.page as usize;
        let mut data = vec![0u8; page * page * 4];
        for (&index, rect) in &self.rects {
            let Some(face) = faces.get(index as usize) else {
                continue;
            };
            let start = face.light_offset.max(0) as usize;
            let count = (rect.width * rect.height) as usize;
            let Some(bytes) = samples.get(start..start + count * SAMPLE_SIZE) else {
                diag.skipped(
                    format!("lightmap of face {}", index),
                    "samples past the end of the lighting lump",
                );
                continue;
            };
            for (i, sample) in bytes.chunks_exact(SAMPLE_SIZE).enumerate() {
                let (sx, sy) = (i as u32 % rect.width, i as u32 / rect.width);
                let texel = ((rect.y + sy) as usize * page + (rect.x + sx) as usize) * 4;
                let rgb = decode_rgbe(sample);
                data[texel] = to_srgb8(rgb.x);
                data[texel + 1] = to_srgb8(rgb.y);
                data[texel + 2] = to_srgb8(rgb.z);
                data[texel + 3] = 255;
            }
        }
        Some(Texture {
            name: "lightmap".into(),
            width: self.page,
            height: self.page,
            format: PixelFormat::Rgba8888,
            frames: 1,
            faces: 1,
            mips: vec![MipLevel {
                width: self.page,
                height: self.page,
                depth: 1,
                data,
            }],
            linear: false,
        })
    }
}

/// ColorRGBExp32: three bytes scaled by a signed power-of-two exponent
pub fn decode_rgbe(sample: &[u8]) -> Vec3 {
    let exponent = sample[3] as i8;
    Vec3::new(sample[0] as f32, sample[1] as f32, sample[2] as f32) * 2f32.powi(i32::from(exponent))
        / 255.0
}

fn to_srgb8(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::face::face_polygon;
    use crate::geometry::fixtures::{LevelBuilder, quad};

    #[test]
    fn test_rgbe_decode() {
        assert_eq!(decode_rgbe(&[255, 0, 0, 0]), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(decode_rgbe(&[255, 255, 255, 1]), Vec3::splat(2.0));
        assert!((decode_rgbe(&[128, 0, 0, 0xFF]).x - 64.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_shelf_pack_wraps_rows() {
        let rects = shelf_pack(&[(0, 10, 8), (1, 10, 6), (2, 10, 4)], 24).unwrap();
        assert_eq!(rects[&0], LightmapRect { x: 0, y: 0, width: 10, height: 8 });
        assert_eq!(rects[&1], LightmapRect { x: 10, y: 0, width: 10, height: 6 });
        assert_eq!(rects[&2], LightmapRect { x: 0, y: 8, width: 10, height: 4 });
        assert!(shelf_pack(&[(0, 30, 1)], 24).is_none());
    }

    #[test]
    fn test_page_grows_until_fit() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("dev/dev_blank", 0);
        // 64 units at 1/16 luxel per unit: 4 luxels, 5 samples
        let faces: Vec<u32> = (0..4)
            .map(|i| level.lit_face(&quad(Vec3::new(i as f32 * 128.0, 0.0, 0.0), 64.0), tex))
            .collect();
        let doc = level.finish();
        let polys: Vec<_> = faces.iter().map(|&f| face_polygon(&doc, f).unwrap()).collect();

        let mut diag = Diagnostics::new();
        let atlas = LightmapAtlas::pack(&polys, 8, &mut diag);
        assert!(diag.is_empty());
        assert_eq!(atlas.page(), 16);
        assert_eq!(atlas.len(), 4);

        let rect = atlas.rect(faces[0]).unwrap();
        assert_eq!((rect.width, rect.height), (5, 5));
        let uv = atlas.uv(faces[0], Vec2::ZERO);
        assert_eq!(uv, Vec2::new(rect.x as f32 + 0.5, rect.y as f32 + 0.5) / 16.0);
    }

    #[test]
    fn test_bake_writes_face_samples() {
        let mut level = LevelBuilder::new();
        let tex = level.texture("dev/dev_blank", 0);
        let face = level.lit_face(&quad(Vec3::ZERO, 64.0), tex);
        let doc = level.finish();
        let poly = face_polygon(&doc, face).unwrap();

        let mut diag = Diagnostics::new();
        let atlas = LightmapAtlas::pack([&poly], 16, &mut diag);
        let texture = atlas.bake(&doc.faces, doc.lightmap_samples(), &mut diag).unwrap();
        assert_eq!(texture.width, 16);
        let data = &texture.mips[0].data;
        // Fixture samples are full-intensity white
        assert_eq!(&data[..4], &[255, 255, 255, 255]);
        assert_eq!(&data[(16 * 16 - 1) * 4..], &[0, 0, 0, 0]);
    }
}
