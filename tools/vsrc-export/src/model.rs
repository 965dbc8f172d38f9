//! Model assembly: decoded studio model → skeleton, LOD meshes,
//! animations and collision in the target convention

use glam::Vec2;
use hashbrown::HashMap;
use vsrc_common::{
    Animation, Bone, BoneTrack, ConvexHull, CoordTransform, DecodeError, DecodeResult,
    Diagnostics, Material, Mesh, SkinWeights, Skeleton, Transform, Vertex, Warning,
};
use vsrc_mdl::{LodGeometry, LodMesh, ModelDocument, PhysicsData, StudioBone};

use crate::material::MaterialSet;

/// Contents flag given to model collision
const CONTENTS_SOLID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelOptions {
    pub transform: CoordTransform,
    /// Skin family used to pick materials
    pub skin_family: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledModel {
    pub name: String,
    pub skeleton: Skeleton,
    /// One mesh per LOD, LOD 0 first
    pub lods: Vec<Mesh>,
    pub animations: Vec<Animation>,
    pub collision: Vec<ConvexHull>,
    pub materials: Vec<Material>,
    /// Whether meshes carry skin weights
    pub skinned: bool,
}

/// Short model name: path and extension stripped
pub fn model_name(doc: &ModelDocument) -> String {
    let name = doc.name().replace('\\', "/").to_ascii_lowercase();
    let file = name.rsplit('/').next().unwrap_or(&name);
    file.strip_suffix(".mdl").unwrap_or(file).to_string()
}

/// Bind pose in the target convention
pub fn convert_skeleton(
    name: &str,
    bones: &[StudioBone],
    transform: &CoordTransform,
) -> DecodeResult<Skeleton> {
    let skeleton = Skeleton {
        name: name.to_string(),
        bones: bones
            .iter()
            .map(|bone| Bone {
                name: bone.name.clone(),
                parent: bone.parent_index(),
                local: Transform::new(
                    transform.position(bone.position),
                    transform.rotation(bone.rotation),
                ),
            })
            .collect(),
    };
    skeleton
        .validate()
        .map_err(|e| DecodeError::malformed(format!("skeleton of {}: {}", name, e)))?;
    Ok(skeleton)
}

/// Tracks converted the same way as the bind pose
pub fn convert_animation(animation: &Animation, transform: &CoordTransform) -> Animation {
    Animation {
        name: animation.name.clone(),
        fps: animation.fps,
        frame_count: animation.frame_count,
        looping: animation.looping,
        tracks: animation
            .tracks
            .iter()
            .map(|track| BoneTrack {
                bone: track.bone,
                translations: track
                    .translations
                    .iter()
                    .map(|&t| transform.position(t))
                    .collect(),
                rotations: track
                    .rotations
                    .iter()
                    .map(|&q| transform.rotation(q))
                    .collect(),
            })
            .collect(),
    }
}

/// One convex hull per physics ledge, bound to the solid's bone
pub fn convert_physics(
    physics: &PhysicsData,
    skeleton: &Skeleton,
    transform: &CoordTransform,
) -> Vec<ConvexHull> {
    physics
        .solids
        .iter()
        .flat_map(|solid| {
            let bone = physics
                .solid_info(solid.index)
                .and_then(|info| skeleton.find(&info.name))
                .map(|b| b as u32);
            solid.hulls.iter().map(move |hull| ConvexHull {
                points: hull.points.iter().map(|&p| transform.position(p)).collect(),
                bone,
                contents: CONTENTS_SOLID,
            })
        })
        .filter(|hull| hull.points.len() >= 4)
        .collect()
}

/// Material for a submesh: the LOD replacement, else the first candidate
/// path that exists, else the first candidate (which will warn)
pub fn submesh_material(
    doc: &ModelDocument,
    mesh: &LodMesh,
    family: usize,
    materials: &MaterialSet,
) -> String {
    if let Some(replacement) = &mesh.replacement {
        return replacement.replace('\\', "/").to_ascii_lowercase();
    }
    let Some(texture) = doc.skin_texture(family, mesh.material) else {
        return format!("missing_skin_{}", mesh.material);
    };
    let candidates = doc.material_candidates(texture);
    candidates
        .iter()
        .find(|c| materials.contains(c))
        .or(candidates.first())
        .cloned()
        .unwrap_or_else(|| texture.name.to_ascii_lowercase())
}

/// Build the mesh of one LOD. Only referenced vertices are kept.
pub fn build_lod_mesh(
    name: &str,
    geometry: &LodGeometry,
    material_names: &[String],
    transform: &CoordTransform,
    skinned: bool,
) -> Mesh {
    let mut mesh = Mesh::new(name);
    let mut skin = Vec::new();
    let mut remap: HashMap<u32, u32> = HashMap::new();

    for (lod_mesh, material) in geometry.meshes.iter().zip(material_names) {
        let slot = mesh.material_slot(material);
        for tri in &lod_mesh.triangles {
            let mut out = [0u32; 3];
            for (dst, &src) in out.iter_mut().zip(tri) {
                *dst = *remap.entry(src).or_insert_with(|| {
                    let v = &geometry.vertices[src as usize];
                    mesh.vertices.push(Vertex::new(
                        transform.position(v.position),
                        transform.direction(v.normal),
                        Vec2::new(v.uv.x, v.uv.y),
                    ));
                    if skinned {
                        let influences: Vec<(u32, f32)> = v
                            .influences
                            .iter()
                            .map(|&(bone, weight)| (u32::from(bone), weight))
                            .collect();
                        skin.push(SkinWeights::from_influences(&influences, 0));
                    }
                    (mesh.vertices.len() - 1) as u32
                });
            }
            mesh.push_triangle(transform.triangle(out), slot, lod_mesh.mesh as u32);
        }
    }
    if skinned {
        mesh.skin = Some(skin);
    }
    mesh
}

/// Assemble a decoded model. A broken LOD 0 fails the model; broken
/// higher LODs are skipped with a warning.
pub fn assemble_model(
    doc: &ModelDocument,
    options: &ModelOptions,
    materials: &MaterialSet,
    diag: &mut Diagnostics,
) -> DecodeResult<AssembledModel> {
    let name = model_name(doc);
    let transform = &options.transform;
    let skeleton = convert_skeleton(&name, &doc.bones, transform)?;
    let skinned = !doc.header.is_static_prop() && skeleton.bones.len() > 1;

    let mut lods = Vec::with_capacity(doc.lod_count());
    let mut used: Vec<String> = Vec::new();
    for lod in 0..doc.lod_count().max(1) {
        let geometry = match doc.lod_geometry(lod) {
            Ok(geometry) => geometry,
            Err(e) if lod == 0 => return Err(e),
            Err(e) => {
                diag.skipped(format!("{} lod {}", name, lod), e.to_string());
                continue;
            }
        };
        let names: Vec<String> = geometry
            .meshes
            .iter()
            .map(|m| submesh_material(doc, m, options.skin_family, materials))
            .collect();
        for n in &names {
            if !used.contains(n) {
                used.push(n.clone());
            }
        }
        let mesh = build_lod_mesh(
            &format!("{}_lod{}", name, lod),
            &geometry,
            &names,
            transform,
            skinned,
        );
        if let Err(e) = mesh.validate() {
            if lod == 0 {
                return Err(DecodeError::malformed(format!("{} lod 0: {}", name, e)));
            }
            diag.warn(Warning::Skipped {
                what: format!("{} lod {}", name, lod),
                reason: e,
            });
            continue;
        }
        lods.push(mesh);
    }

    let materials: Vec<Material> = used.iter().map(|m| materials.material(m, diag)).collect();
    let animations = doc
        .animations
        .iter()
        .map(|a| convert_animation(a, transform))
        .collect();
    for external in &doc.external_animations {
        diag.skipped(
            format!("animation {}", external),
            "stored in an external animation block",
        );
    }
    let collision = doc
        .physics
        .as_ref()
        .map(|p| convert_physics(p, &skeleton, transform))
        .unwrap_or_default();

    tracing::info!(
        "Assembled model '{}': {} bones, {} LODs, {} animations, {} hulls",
        name,
        skeleton.bones.len(),
        lods.len(),
        doc.animations.len(),
        collision.len()
    );
    Ok(AssembledModel {
        name,
        skeleton,
        lods,
        animations,
        collision,
        materials,
        skinned,
    })
}
