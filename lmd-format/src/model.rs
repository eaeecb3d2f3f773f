//! Decoded scene types
//!
//! Everything here is produced once by [`crate::decode_lmd`] and never mutated
//! afterwards. Name lookups mirror how the file cross-references records;
//! parent edges are also kept as dense indices for downstream traversal.

use core::fmt;
use core::str::FromStr;

use glam::Mat4;
use hashbrown::HashMap;

use crate::error::LmdError;

/// Record layout selector, chosen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatVersion {
    /// Legacy layout: optional per-vertex color, 16-bit normalized weights
    V1_0,
    /// No per-vertex color, 32-bit float weights
    #[default]
    V1_2Plus,
}

impl FormatVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::V1_0 => "1.0",
            FormatVersion::V1_2Plus => "1.2+",
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatVersion {
    type Err = LmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0" => Ok(FormatVersion::V1_0),
            "1.2+" => Ok(FormatVersion::V1_2Plus),
            other => Err(LmdError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Options for a single decode call
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub version: FormatVersion,
}

impl DecodeOptions {
    pub fn new(version: FormatVersion) -> Self {
        Self { version }
    }
}

/// One bone record
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Parent name as stored in the file, even for root bones
    pub parent_name: String,
    /// Bind matrix rows exactly as stored (4 rows of 4 floats)
    pub bind_matrix: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub magic: u32,
    /// Index of the parent bone; `None` for roots
    pub parent: Option<usize>,
    /// Negated XYZ Euler angles of the bind matrix rotation (radians)
    pub pose_rotation: [f32; 3],
    pub pose_location: [f32; 3],
}

impl Bone {
    /// Bind matrix as a glam matrix, reading the stored rows as rows
    pub fn bind_mat4(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.bind_matrix).transpose()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Bone hierarchy in file order (parents always precede children)
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    name_index: HashMap<String, usize>,
}

impl Skeleton {
    /// Register a bone; a later bone with the same name shadows the earlier
    /// one for name lookups.
    pub(crate) fn push(&mut self, bone: Bone) {
        self.name_index.insert(bone.name.clone(), self.bones.len());
        self.bones.push(bone);
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.index_of(name).map(|i| &self.bones[i])
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent)
    }

    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.parent == Some(index))
            .map(|(i, _)| i)
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_root())
            .map(|(i, _)| i)
    }
}

/// Texture table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    /// Key material slots use to reference this texture
    pub ref_key: String,
    pub file_name: String,
    pub map_name: String,
}

/// Material with its texture slots
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Slot keys in slot order; each indexes the texture table by `ref_key`
    pub texture_slot_keys: Vec<String>,
    /// Texture file name per slot, `None` when the key has no texture entry
    pub texture_files: Vec<Option<String>>,
    /// Record shape flag read at +0x38
    pub flag: u32,
}

/// Decoded vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    /// UV with V already flipped (`1 - v`)
    pub uv: [f32; 2],
    pub color: Option<[f32; 3]>,
    /// Alpha replicated into an RGB triple
    pub alpha: Option<[f32; 3]>,
    pub bone_indices: [u8; 4],
    pub bone_weights: [f32; 4],
}

/// Triangle referencing `Mesh::vertices`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub i0: u32,
    pub i1: u32,
    pub i2: u32,
}

impl Face {
    pub fn new(i0: u32, i1: u32, i2: u32) -> Self {
        Self { i0, i1, i2 }
    }

    pub fn indices(&self) -> [u32; 3] {
        [self.i0, self.i1, self.i2]
    }
}

/// Non-zero skin weights of one named bone
#[derive(Debug, Clone, PartialEq)]
pub struct VertexGroup {
    pub name: String,
    /// `(vertex index, weight)` in vertex order
    pub weights: Vec<(u32, f32)>,
}

/// One decoded mesh chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub material_name: String,
    /// Raw per-vertex record stride from the chunk header
    pub vertex_chunk_size: u8,
    /// Total index count from the chunk header (triangles = index_count / 3)
    pub index_count: u32,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    pub bone_weight_names: Vec<String>,
    /// Faces skipped because an index was out of range
    pub dropped_faces: usize,
}

impl Mesh {
    /// True when vertices carry the legacy color/alpha layers
    pub fn has_color(&self) -> bool {
        self.vertices.first().is_some_and(|v| v.color.is_some())
    }

    /// Group non-zero weights by bone-weight name, in first-use order.
    ///
    /// Repeated influences of the same bone on one vertex are summed.
    pub fn vertex_groups(&self) -> Vec<VertexGroup> {
        let mut groups: Vec<VertexGroup> = Vec::new();
        let mut by_name: HashMap<&str, usize> = HashMap::new();

        for (vertex, v) in self.vertices.iter().enumerate() {
            let vertex = vertex as u32;
            for (&slot, &weight) in v.bone_indices.iter().zip(&v.bone_weights) {
                if weight == 0.0 {
                    continue;
                }
                // Invariant checked at decode time
                let Some(name) = self.bone_weight_names.get(slot as usize) else {
                    continue;
                };
                let group = *by_name.entry(name.as_str()).or_insert_with(|| {
                    groups.push(VertexGroup {
                        name: name.clone(),
                        weights: Vec::new(),
                    });
                    groups.len() - 1
                });
                let weights = &mut groups[group].weights;
                match weights.last_mut() {
                    Some((last, w)) if *last == vertex => *w += weight,
                    _ => weights.push((vertex, weight)),
                }
            }
        }

        groups
    }
}

/// Complete decode result
#[derive(Debug, Clone, Default)]
pub struct SceneModel {
    pub skeleton: Skeleton,
    pub textures: Vec<TextureRef>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
}

impl SceneModel {
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Texture entry for a slot key (last entry wins, as in the lookup table)
    pub fn texture(&self, ref_key: &str) -> Option<&TextureRef> {
        self.textures.iter().rev().find(|t| t.ref_key == ref_key)
    }
}
