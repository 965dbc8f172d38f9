//! Geometry reconstruction: level faces → renderable meshes
//!
//! Each brush model becomes one mesh per material. Regular faces are fan
//! triangulated from their edge loop; displaced faces are replaced by
//! their grid. Sky and tool surfaces never reach the visible meshes; clip
//! surfaces go to a separate collision mesh. Every triangle records the
//! face it came from.
//!
//! Positions pass through the configured [`CoordTransform`]. Triangles keep
//! source winding unless the transform mirrors the scene.

pub mod collision;
pub mod displacement;
pub mod face;
pub mod lightmap;
pub mod smoothing;
pub mod surface;

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use vsrc_bsp::LevelDocument;
use vsrc_common::{ConvexHull, CoordTransform, Diagnostics, Mesh, Texture, Vertex};

pub use collision::brush_hulls;
pub use displacement::{DisplacementGrid, build_displacement};
pub use face::{FacePolygon, face_polygon, fan_triangles};
pub use lightmap::LightmapAtlas;
pub use surface::{SurfaceKind, classify_surface, clean_material_name};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryOptions {
    pub transform: CoordTransform,
    /// Initial lightmap page size; grows when the faces do not fit
    pub lightmap_page: u32,
    /// Average normals across shared smoothing groups
    pub smooth_normals: bool,
    /// Build clip meshes and brush hulls
    pub collision: bool,
    /// Bake lighting samples into an atlas texture
    pub bake_lightmaps: bool,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            transform: CoordTransform::default(),
            lightmap_page: 1024,
            smooth_normals: false,
            collision: true,
            bake_lightmaps: true,
        }
    }
}

/// Geometry of one brush model (model 0 is the world)
#[derive(Debug, Clone, Default)]
pub struct ModelGeometry {
    pub index: usize,
    /// One mesh per material, in order of first use
    pub meshes: Vec<Mesh>,
    /// Clip surfaces and brush hulls
    pub collision: Option<Mesh>,
}

impl ModelGeometry {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LevelGeometry {
    pub models: Vec<ModelGeometry>,
    /// Faces classified as sky
    pub sky_faces: Vec<u32>,
    pub lightmap: Option<Texture>,
    pub lightmap_page: u32,
}

impl LevelGeometry {
    /// Every material used by a visible mesh
    pub fn materials(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .iter()
            .flat_map(|m| m.meshes.iter())
            .flat_map(|m| m.materials.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Accumulates per-material meshes for one model
struct MeshSet<'a> {
    options: &'a GeometryOptions,
    atlas: &'a LightmapAtlas,
    meshes: Vec<Mesh>,
    groups: Vec<Vec<u32>>,
    by_material: HashMap<String, usize>,
}

impl<'a> MeshSet<'a> {
    fn new(options: &'a GeometryOptions, atlas: &'a LightmapAtlas) -> Self {
        Self {
            options,
            atlas,
            meshes: Vec::new(),
            groups: Vec::new(),
            by_material: HashMap::new(),
        }
    }

    fn mesh(&mut self, material: &str) -> usize {
        if let Some(&i) = self.by_material.get(material) {
            return i;
        }
        let mut mesh = Mesh::new(material.replace('/', "_"));
        mesh.material_slot(material);
        self.meshes.push(mesh);
        self.groups.push(Vec::new());
        self.by_material.insert(material.to_string(), self.meshes.len() - 1);
        self.meshes.len() - 1
    }

    fn vertex(&self, poly: &FacePolygon, position: Vec3, base: Vec3, normal: Vec3) -> Vertex {
        let transform = &self.options.transform;
        let mut vertex = Vertex::new(
            transform.position(position),
            transform.direction(normal),
            face::texture_uv(&poly.texinfo, poly.texture_size, base),
        );
        vertex.lightmap_uv = self
            .atlas
            .uv(poly.index, face::lightmap_luxel(&poly.texinfo, &poly.face, base));
        vertex
    }

    fn push(&mut self, poly: &FacePolygon, vertices: Vec<Vertex>, triangles: &[[u32; 3]]) {
        let slot = self.mesh(&poly.material);
        let transform = self.options.transform;
        let mesh = &mut self.meshes[slot];
        let base = mesh.vertices.len() as u32;
        self.groups[slot].extend(std::iter::repeat_n(poly.face.smoothing_groups, vertices.len()));
        mesh.vertices.extend(vertices);
        for tri in triangles {
            let tri = transform.triangle([tri[0] + base, tri[1] + base, tri[2] + base]);
            mesh.push_triangle(tri, 0, poly.index);
        }
    }

    fn push_face(&mut self, poly: &FacePolygon) {
        let triangles = fan_triangles(&poly.points);
        let vertices = poly
            .points
            .iter()
            .map(|&p| self.vertex(poly, p, p, poly.normal))
            .collect();
        self.push(poly, vertices, &triangles);
    }

    fn push_displacement(&mut self, poly: &FacePolygon, grid: &DisplacementGrid) {
        let vertices = (0..grid.vertex_count())
            .map(|i| {
                let mut v = self.vertex(poly, grid.positions[i], grid.base[i], grid.normals[i]);
                v.color = grid.color(i);
                v
            })
            .collect();
        self.push(poly, vertices, &grid.triangles);
    }

    fn finish(mut self) -> Vec<Mesh> {
        if self.options.smooth_normals {
            for (mesh, groups) in self.meshes.iter_mut().zip(&self.groups) {
                smoothing::smooth_normals(&mut mesh.vertices, groups);
            }
        }
        self.meshes
    }
}

/// Collision-only surfaces, one material slot per tool texture
fn push_collision_face(mesh: &mut Mesh, poly: &FacePolygon, transform: &CoordTransform) {
    let slot = mesh.material_slot(&poly.material);
    let base = mesh.vertices.len() as u32;
    mesh.vertices.extend(poly.points.iter().map(|&p| {
        Vertex::new(
            transform.position(p),
            transform.direction(poly.normal),
            Vec2::ZERO,
        )
    }));
    for tri in fan_triangles(&poly.points) {
        let tri = transform.triangle([tri[0] + base, tri[1] + base, tri[2] + base]);
        mesh.push_triangle(tri, slot, poly.index);
    }
}

/// Rebuild every brush model of a level. Bad faces are skipped with a
/// warning; the rest of the level is still produced.
pub fn reconstruct_level(
    doc: &LevelDocument,
    options: &GeometryOptions,
    diag: &mut Diagnostics,
) -> LevelGeometry {
    let mut sky_faces = Vec::new();
    let mut per_model: Vec<Vec<FacePolygon>> = Vec::with_capacity(doc.models.len());
    for model in &doc.models {
        let mut polygons = Vec::new();
        for index in doc.model_faces(model) {
            match face_polygon(doc, index as u32) {
                Ok(poly) if poly.kind == SurfaceKind::Sky => sky_faces.push(poly.index),
                Ok(poly) if poly.kind == SurfaceKind::Hidden => {}
                Ok(poly) => polygons.push(poly),
                Err(warning) => diag.warn(warning),
            }
        }
        per_model.push(polygons);
    }

    let atlas = LightmapAtlas::pack(
        per_model
            .iter()
            .flatten()
            .filter(|p| p.kind == SurfaceKind::Visible),
        options.lightmap_page,
        diag,
    );

    let mut models = Vec::with_capacity(per_model.len());
    for (index, polygons) in per_model.iter().enumerate() {
        let mut set = MeshSet::new(options, &atlas);
        let mut clip = Mesh::new(format!("model{}_collision", index));
        for poly in polygons {
            match poly.kind {
                SurfaceKind::CollisionOnly => {
                    if options.collision {
                        push_collision_face(&mut clip, poly, &options.transform);
                    }
                }
                _ if poly.face.has_displacement() => match build_displacement(doc, poly) {
                    Ok(grid) => set.push_displacement(poly, &grid),
                    Err(warning) => diag.warn(warning),
                },
                _ => set.push_face(poly),
            }
        }
        let meshes = set.finish();
        tracing::debug!(
            "Model {}: {} meshes, {} collision triangles",
            index,
            meshes.len(),
            clip.triangle_count()
        );
        models.push(ModelGeometry {
            index,
            meshes,
            collision: (!clip.is_empty()).then_some(clip),
        });
    }

    if options.collision {
        let hulls: Vec<ConvexHull> = brush_hulls(doc, &options.transform, diag);
        if let Some(world) = models.first_mut().filter(|_| !hulls.is_empty()) {
            world
                .collision
                .get_or_insert_with(|| Mesh::new("model0_collision"))
                .collision = hulls;
        }
    }

    let lightmap = if options.bake_lightmaps {
        atlas.bake(&doc.faces, doc.lightmap_samples(), diag)
    } else {
        None
    };

    tracing::info!(
        "Reconstructed {} models, {} sky faces, {} lightmaps on a {}px page",
        models.len(),
        sky_faces.len(),
        atlas.len(),
        atlas.page()
    );
    LevelGeometry {
        models,
        sky_faces,
        lightmap,
        lightmap_page: atlas.page(),
    }
}

/// In-memory level construction for tests
#[cfg(test)]
pub(crate) mod fixtures {
    use glam::{Vec3, Vec4};
    use vsrc_bsp::{DispInfo, DispVert, Edge, Face, LevelDocument, Model, Plane, TexData, TexInfo};

    /// Square in the XY plane facing +Z, in source (clockwise) winding
    pub fn quad(origin: Vec3, size: f32) -> [Vec3; 4] {
        [
            origin,
            origin + Vec3::new(0.0, size, 0.0),
            origin + Vec3::new(size, size, 0.0),
            origin + Vec3::new(size, 0.0, 0.0),
        ]
    }

    /// Luxels per unit used by every fixture texinfo
    const LUXEL_SCALE: f32 = 1.0 / 16.0;

    pub struct LevelBuilder {
        doc: LevelDocument,
    }

    impl LevelBuilder {
        pub fn new() -> Self {
            let mut doc = LevelDocument {
                version: 20,
                ..Default::default()
            };
            // Edge 0 is never referenced by a surfedge
            doc.edges.push(Edge { v: [0, 0] });
            Self { doc }
        }

        /// Register a material with planar XY texture and lightmap axes
        pub fn texture(&mut self, name: &str, flags: i32) -> i16 {
            let name_id = self.doc.string_table.len() as i32;
            self.doc.string_table.push(self.doc.string_data.len() as i32);
            self.doc.string_data.extend_from_slice(name.as_bytes());
            self.doc.string_data.push(0);
            self.doc.texdata.push(TexData {
                reflectivity: Vec3::splat(0.5),
                name_id,
                width: 64,
                height: 64,
                view_width: 64,
                view_height: 64,
            });
            self.doc.texinfos.push(TexInfo {
                texture_vecs: [Vec4::new(1.0, 0.0, 0.0, 0.0), Vec4::new(0.0, 1.0, 0.0, 0.0)],
                lightmap_vecs: [
                    Vec4::new(LUXEL_SCALE, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, LUXEL_SCALE, 0.0, 0.0),
                ],
                flags,
                texdata: self.doc.texdata.len() as i32 - 1,
            });
            self.doc.texinfos.len() as i16 - 1
        }

        /// Add an unlit face; the plane comes from the loop's Newell normal
        pub fn face(&mut self, points: &[Vec3], texinfo: i16) -> u32 {
            // Clockwise loops: the cross product sum points inward
            let normal = -(0..points.len())
                .map(|i| points[i].cross(points[(i + 1) % points.len()]))
                .sum::<Vec3>()
                .normalize_or_zero();
            self.doc.planes.push(Plane {
                normal,
                dist: normal.dot(points[0]),
                kind: 0,
            });

            let first_edge = self.doc.surfedges.len() as i32;
            let first_vertex = self.doc.vertices.len() as u16;
            self.doc.vertices.extend_from_slice(points);
            for i in 0..points.len() {
                let a = first_vertex + i as u16;
                let b = first_vertex + ((i + 1) % points.len()) as u16;
                // Alternate edge directions to exercise negative surfedges
                if i % 2 == 0 {
                    self.doc.edges.push(Edge { v: [a, b] });
                    self.doc.surfedges.push(self.doc.edges.len() as i32 - 1);
                } else {
                    self.doc.edges.push(Edge { v: [b, a] });
                    self.doc.surfedges.push(-(self.doc.edges.len() as i32 - 1));
                }
            }

            let (mins, maxs) = points.iter().fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(lo, hi), &p| (lo.min(p), hi.max(p)),
            );
            let lo = (mins * LUXEL_SCALE).floor();
            let hi = (maxs * LUXEL_SCALE).ceil();
            self.doc.faces.push(Face {
                plane: self.doc.planes.len() as u16 - 1,
                side: 0,
                on_node: 1,
                first_edge,
                num_edges: points.len() as i16,
                texinfo,
                dispinfo: -1,
                fog_volume: -1,
                styles: [0, 255, 255, 255],
                light_offset: -1,
                area: 0.0,
                lightmap_mins: [lo.x as i32, lo.y as i32],
                lightmap_size: [(hi.x - lo.x) as i32, (hi.y - lo.y) as i32],
                original_face: -1,
                num_prims: 0,
                first_prim: 0,
                smoothing_groups: 0,
            });
            self.doc.faces.len() as u32 - 1
        }

        /// Add a face with full-white lighting samples
        pub fn lit_face(&mut self, points: &[Vec3], texinfo: i16) -> u32 {
            let face = self.face(points, texinfo);
            let f = &mut self.doc.faces[face as usize];
            f.light_offset = self.doc.lighting.len() as i32;
            let samples = (f.lightmap_size[0] + 1) * (f.lightmap_size[1] + 1);
            for _ in 0..samples {
                self.doc.lighting.extend_from_slice(&[255, 255, 255, 0]);
            }
            face
        }

        /// Displace `face`; `offset(x, y)` gives direction, distance, alpha
        pub fn displace(
            &mut self,
            face: u32,
            power: i32,
            offset: impl Fn(usize, usize) -> (Vec3, f32, f32),
        ) {
            let f = self.doc.faces[face as usize];
            let start = self.doc.vertices[self.doc.edges
                [self.doc.surfedges[f.first_edge as usize].unsigned_abs() as usize]
                .v[0] as usize];
            let n = (1usize << power) + 1;
            let disp_vert_start = self.doc.disp_verts.len() as i32;
            for x in 0..n {
                for y in 0..n {
                    let (vec, dist, alpha) = offset(x, y);
                    self.doc.disp_verts.push(DispVert { vec, dist, alpha });
                }
            }
            self.doc.disp_infos.push(DispInfo {
                start_position: start,
                disp_vert_start,
                disp_tri_start: 0,
                power,
                min_tess: 0,
                smoothing_angle: 0.0,
                contents: 1,
                map_face: face as u16,
                lightmap_alpha_start: 0,
                lightmap_sample_position_start: 0,
            });
            self.doc.faces[face as usize].dispinfo = self.doc.disp_infos.len() as i16 - 1;
        }

        /// Close the level with a world model spanning every face
        pub fn finish(mut self) -> LevelDocument {
            self.doc.models.push(Model {
                mins: Vec3::splat(-1024.0),
                maxs: Vec3::splat(1024.0),
                origin: Vec3::ZERO,
                head_node: 0,
                first_face: 0,
                num_faces: self.doc.faces.len() as i32,
            });
            self.doc
        }
    }
}
