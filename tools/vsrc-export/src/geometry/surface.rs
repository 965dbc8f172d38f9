//! Surface classification and material name cleanup

use vsrc_bsp::lumps::{SURF_HINT, SURF_NODRAW, SURF_SKIP, SURF_SKY, SURF_SKY2D, SURF_TRIGGER};

/// Where a face ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Visible,
    /// Skybox surface; reported but never rendered
    Sky,
    /// Invisible blocker, only kept as collision
    CollisionOnly,
    /// Dropped entirely
    Hidden,
}

const COLLISION_TOOLS: [&str; 4] = [
    "tools/toolsclip",
    "tools/toolsplayerclip",
    "tools/toolsnpcclip",
    "tools/toolsinvisible",
];

const HIDDEN_TOOLS: [&str; 8] = [
    "tools/toolsnodraw",
    "tools/toolstrigger",
    "tools/toolshint",
    "tools/toolsskip",
    "tools/toolsareaportal",
    "tools/toolsoccluder",
    "tools/toolsfog",
    "tools/toolsblack",
];

/// Classify a face by its (cleaned) material name and texinfo flags
pub fn classify_surface(material: &str, flags: i32) -> SurfaceKind {
    if flags & (SURF_SKY | SURF_SKY2D) != 0 || material.starts_with("tools/toolsskybox") {
        return SurfaceKind::Sky;
    }
    // Clip brushes usually also carry nodraw, so names win over flags
    if COLLISION_TOOLS.contains(&material) {
        return SurfaceKind::CollisionOnly;
    }
    if HIDDEN_TOOLS.contains(&material)
        || flags & (SURF_TRIGGER | SURF_NODRAW | SURF_HINT | SURF_SKIP) != 0
    {
        return SurfaceKind::Hidden;
    }
    SurfaceKind::Visible
}

/// Normalise a level material reference back to the shared material.
///
/// The compiler rewrites materials that received a cubemap or blend patch
/// to `maps/<map>/<name>_<x>_<y>_<z>` or `maps/<map>/<name>_wvt_patch`.
pub fn clean_material_name(raw: &str) -> String {
    let name = raw.trim().replace('\\', "/").to_ascii_lowercase();
    let name = name.strip_prefix("materials/").unwrap_or(&name);

    let Some(rest) = name.strip_prefix("maps/") else {
        return name.to_string();
    };
    let Some((_map, inner)) = rest.split_once('/') else {
        return name.to_string();
    };

    let inner = inner.strip_suffix("_wvt_patch").unwrap_or(inner);
    strip_position_suffix(inner).to_string()
}

/// Remove a trailing `_x_y_z` integer triple
fn strip_position_suffix(name: &str) -> &str {
    let mut end = name.len();
    for _ in 0..3 {
        let Some(pos) = name[..end].rfind('_') else {
            return name;
        };
        let number = &name[pos + 1..end];
        let digits = number.strip_prefix('-').unwrap_or(number);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return name;
        }
        end = pos;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_cubemap_patch_name() {
        assert_eq!(
            clean_material_name("maps/de_dust2/Brick/Wall01_-128_256_64"),
            "brick/wall01"
        );
        assert_eq!(
            clean_material_name("MAPS\\test\\nature\\blend_grass_wvt_patch"),
            "nature/blend_grass"
        );
    }

    #[test]
    fn test_clean_leaves_plain_names() {
        assert_eq!(clean_material_name("Concrete\\Floor_01"), "concrete/floor_01");
        // Only two numbers, not a position
        assert_eq!(
            clean_material_name("maps/test/metal/plate_1_2"),
            "metal/plate_1_2"
        );
        assert_eq!(clean_material_name("maps/orphan"), "maps/orphan");
    }

    #[test]
    fn test_classify_tools() {
        assert_eq!(classify_surface("brick/wall01", 0), SurfaceKind::Visible);
        assert_eq!(classify_surface("tools/toolsskybox", 0), SurfaceKind::Sky);
        assert_eq!(classify_surface("anything", SURF_SKY2D), SurfaceKind::Sky);
        assert_eq!(
            classify_surface("tools/toolsplayerclip", SURF_NODRAW),
            SurfaceKind::CollisionOnly
        );
        assert_eq!(classify_surface("tools/toolstrigger", 0), SurfaceKind::Hidden);
        assert_eq!(classify_surface("glass/window", SURF_TRIGGER), SurfaceKind::Hidden);
        assert_eq!(classify_surface("tools/toolsnodraw", SURF_NODRAW), SurfaceKind::Hidden);
    }
}
