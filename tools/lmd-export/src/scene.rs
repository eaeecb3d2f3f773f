//! Engine-neutral scene description
//!
//! Turns a decoded [`SceneModel`] into an armature, meshes and materials that
//! any importer can rebuild. The document is serialized as JSON.

use std::f32::consts::FRAC_PI_2;
use std::path::PathBuf;

use hashbrown::HashMap;
use lmd_format::{Material, Mesh, SceneModel};
use serde::{Deserialize, Serialize};

use crate::texture::ResolveTexture;

/// Bind-pose bone head, relative to the bone's own space
pub const BONE_HEAD: [f32; 3] = [0.0, 0.0, 0.0];
/// Bind-pose bone tail, relative to the bone's own space
pub const BONE_TAIL: [f32; 3] = [0.0, 0.05, 0.0];
/// Rotation applied to the armature to stand the model upright
pub const ROOT_ROTATION: [f32; 3] = [FRAC_PI_2, 0.0, 0.0];
/// Normal smoothing angle in radians
pub const AUTO_SMOOTH_ANGLE: f32 = 1.2;
/// Multiply factor of the ambient occlusion layer
pub const AO_MIX_FACTOR: f32 = 0.3;
/// UV scale of the ambient occlusion layer on face materials
pub const FACE_AO_UV_SCALE: [f32; 3] = [4.0, 4.0, 1.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportScene {
    pub armature: ExportArmature,
    pub meshes: Vec<ExportMesh>,
    pub materials: Vec<ExportMaterial>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArmature {
    pub name: String,
    /// XYZ Euler rotation of the armature object
    pub rotation: [f32; 3],
    pub bones: Vec<ExportBone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBone {
    pub name: String,
    pub parent: Option<usize>,
    pub head: [f32; 3],
    pub tail: [f32; 3],
    /// XYZ Euler pose rotation
    pub rotation: [f32; 3],
    pub location: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMesh {
    pub name: String,
    pub material: String,
    /// Always the scene armature
    pub parent: String,
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<[f32; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphas: Option<Vec<[f32; 3]>>,
    pub vertex_groups: Vec<ExportVertexGroup>,
    pub smooth_shading: bool,
    pub auto_smooth_angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportVertexGroup {
    pub name: String,
    /// Armature bone with the same name, if any
    pub bone: Option<usize>,
    pub weights: Vec<(u32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMaterial {
    pub name: String,
    pub blend_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_texture: Option<ExportTexture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ao_texture: Option<ExportTexture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTexture {
    pub path: PathBuf,
    /// Sampled as non-color data
    pub non_color: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_scale: Option<[f32; 3]>,
}

/// Build the export scene for a decoded model
///
/// `source_name` names the armature (normally the input file name).
pub fn build_scene(
    model: &SceneModel,
    resolver: &dyn ResolveTexture,
    source_name: &str,
) -> ExportScene {
    let armature = ExportArmature {
        name: source_name.to_string(),
        rotation: ROOT_ROTATION,
        bones: model
            .skeleton
            .bones
            .iter()
            .map(|bone| ExportBone {
                name: bone.name.clone(),
                parent: bone.parent,
                head: BONE_HEAD,
                tail: BONE_TAIL,
                rotation: bone.pose_rotation,
                location: bone.pose_location,
            })
            .collect(),
    };

    let meshes = model
        .meshes
        .iter()
        .map(|mesh| export_mesh(model, mesh, source_name))
        .collect();

    let mut cache = TextureCache::new(resolver);
    let materials = model
        .materials
        .iter()
        .map(|material| export_material(material, &mut cache))
        .collect();

    ExportScene {
        armature,
        meshes,
        materials,
    }
}

fn export_mesh(model: &SceneModel, mesh: &Mesh, armature: &str) -> ExportMesh {
    let has_color = mesh.has_color();
    let vertex_groups = mesh
        .vertex_groups()
        .into_iter()
        .map(|group| ExportVertexGroup {
            bone: model.skeleton.index_of(&group.name),
            name: group.name,
            weights: group.weights,
        })
        .collect::<Vec<_>>();

    for group in vertex_groups.iter().filter(|g| g.bone.is_none()) {
        tracing::warn!(
            "Mesh '{}': vertex group '{}' has no matching bone",
            mesh.name,
            group.name
        );
    }

    ExportMesh {
        name: mesh.name.clone(),
        material: mesh.material_name.clone(),
        parent: armature.to_string(),
        positions: mesh.vertices.iter().map(|v| v.position).collect(),
        faces: mesh.faces.iter().map(|f| f.indices()).collect(),
        uvs: mesh.vertices.iter().map(|v| v.uv).collect(),
        colors: has_color.then(|| {
            mesh.vertices
                .iter()
                .map(|v| v.color.unwrap_or([1.0; 3]))
                .collect()
        }),
        alphas: has_color.then(|| {
            mesh.vertices
                .iter()
                .map(|v| v.alpha.unwrap_or([1.0; 3]))
                .collect()
        }),
        vertex_groups,
        smooth_shading: true,
        auto_smooth_angle: AUTO_SMOOTH_ANGLE,
    }
}

fn export_material(material: &Material, cache: &mut TextureCache<'_>) -> ExportMaterial {
    let mut export = ExportMaterial {
        name: material.name.clone(),
        blend_mode: "hashed".to_string(),
        color_texture: None,
        ao_texture: None,
    };

    let Some((file_name, path)) = material
        .texture_files
        .iter()
        .flatten()
        .find_map(|file| cache.resolve(file).map(|path| (file, path)))
    else {
        tracing::warn!("Material '{}': no texture found on disk", material.name);
        return export;
    };

    export.color_texture = Some(ExportTexture {
        path,
        non_color: false,
        mix_factor: None,
        uv_scale: None,
    });

    let ao_name = file_name.replace("_co.", "_ao.");
    if ao_name != *file_name {
        match cache.resolve(&ao_name) {
            Some(path) => {
                export.ao_texture = Some(ExportTexture {
                    path,
                    non_color: true,
                    mix_factor: Some(AO_MIX_FACTOR),
                    uv_scale: material.name.ends_with("face").then_some(FACE_AO_UV_SCALE),
                });
            }
            None => tracing::debug!("Material '{}': no AO texture {}", material.name, ao_name),
        }
    }

    export
}

/// Memoizes resolver lookups; many materials share texture files
struct TextureCache<'a> {
    resolver: &'a dyn ResolveTexture,
    resolved: HashMap<String, Option<PathBuf>>,
}

impl<'a> TextureCache<'a> {
    fn new(resolver: &'a dyn ResolveTexture) -> Self {
        Self {
            resolver,
            resolved: HashMap::new(),
        }
    }

    fn resolve(&mut self, file_name: &str) -> Option<PathBuf> {
        if let Some(found) = self.resolved.get(file_name) {
            return found.clone();
        }
        let found = self.resolver.resolve(file_name);
        self.resolved.insert(file_name.to_string(), found.clone());
        found
    }
}
