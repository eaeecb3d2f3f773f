//! lmd-format: decoder for LMD model containers
//!
//! LMD is the model container used by a mobile game's character assets. A
//! file holds a bone hierarchy, a texture/material graph and one or more
//! skinned meshes, linked together by relative pointers.
//!
//! # Format Overview
//!
//! - Fixed header: skeleton pointer at 0x34, material pointer at 0x38, mesh
//!   count and mesh pointer table at 0x48
//! - Every pointer is a signed 32-bit value added to the address just after
//!   the pointer field
//! - Strings are `{length: u32, bytes}` records, decoded lossily
//! - Size and index fields pick 1, 2 or 4 byte widths from record counts
//! - Vertex layout depends on a caller-supplied version (`"1.0"` or `"1.2+"`)
//!
//! # Usage
//!
//! ```ignore
//! use lmd_format::{DecodeOptions, FormatVersion, decode_lmd};
//!
//! let data = std::fs::read("pm0001_00.lmd")?;
//! let model = decode_lmd(&data, &DecodeOptions::new(FormatVersion::V1_0))?;
//!
//! for bone in &model.skeleton.bones {
//!     println!("{} -> {:?}", bone.name, bone.parent);
//! }
//! for mesh in &model.meshes {
//!     println!("{}: {} faces", mesh.name, mesh.faces.len());
//! }
//! ```
//!
//! Decoding is all-or-nothing: any fatal error discards everything decoded
//! so far. Faces referencing missing vertices are dropped and texture slots
//! without a texture entry stay unresolved; both are logged and decoding
//! continues.

mod error;
mod header;
mod material;
mod mesh;
mod model;
mod reader;
mod skeleton;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;


pub use error::{LmdError, RecordKind};
pub use header::{
    LmdHeader, MATERIAL_POINTER_OFFSET, MESH_TABLE_OFFSET, SKELETON_POINTER_OFFSET, parse_header,
};
pub use material::{EXTENDED_MATERIAL_FLAG, MaterialTables, decode_materials};
pub use mesh::{COLOR_CHUNK_SIZE, block_size_width, decode_mesh, face_size_width, index_width};
pub use model::{
    Bone, DecodeOptions, Face, FormatVersion, Material, Mesh, SceneModel, Skeleton, TextureRef,
    Vertex, VertexGroup,
};
pub use reader::{OffsetReader, width_for};
pub use skeleton::{ROOT_BONE_MAGIC_THRESHOLD, decode_skeleton, pose_rotation};

use error::RecordContext;

/// Decode a complete LMD buffer
///
/// Sections are decoded in file order: header, skeleton, materials, then
/// each mesh chunk.
pub fn decode_lmd(data: &[u8], options: &DecodeOptions) -> Result<SceneModel, LmdError> {
    let mut reader = OffsetReader::new(data);

    let header = parse_header(&mut reader).in_record(RecordKind::Header, 0, 0)?;
    let skeleton = decode_skeleton(&mut reader, header.skeleton_offset)?;
    let MaterialTables {
        textures,
        materials,
    } = decode_materials(&mut reader, header.material_offset)?;

    tracing::info!("Loading {} mesh(es)", header.mesh_offsets.len());
    let mut meshes = Vec::with_capacity(header.mesh_offsets.len());
    for (index, &start) in header.mesh_offsets.iter().enumerate() {
        let mesh = decode_mesh(&mut reader, start, options.version)
            .in_record(RecordKind::Mesh, index, start)?;
        meshes.push(mesh);
    }

    Ok(SceneModel {
        skeleton,
        textures,
        materials,
        meshes,
    })
}
