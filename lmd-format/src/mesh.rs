//! Mesh chunk decoder
//!
//! # Chunk header layout
//! ```text
//! 0x07: vertex chunk size u8 (raw vertex record stride)
//! 0x08: mesh name pointer
//! 0x14: pointer to material record (name string at +8)
//! 0x58: pointer to weight bone name table
//! 0x5C: pointer to weight bone table
//! 0x78: index count u32 (triangles = count / 3)
//! 0x84: vertex count u32
//! 0x90: vertex block size (width from vertex count × chunk size)
//! ```
//!
//! After the vertex block come opaque auxiliary records, the index stream
//! header and the index stream itself, whose element width depends on the
//! vertex count.

use crate::error::{LmdError, RecordContext, RecordKind};
use crate::model::{Face, FormatVersion, Mesh, Vertex};
use crate::reader::{OffsetReader, width_for};

#[cfg(test)]
mod tests;

/// Smallest vertex stride that carries the legacy RGBA color field
pub const COLOR_CHUNK_SIZE: u8 = 0x24;
/// Size of one opaque auxiliary record following the vertex block
const AUX_RECORD_SIZE: usize = 0x10;
/// Smallest vertex record (1.0 layout without color)
const MIN_VERTEX_SIZE: usize = 0x20;

/// Width of the vertex block size field
pub fn block_size_width(vertex_count: u32, vertex_chunk_size: u8) -> usize {
    width_for(u64::from(vertex_count) * u64::from(vertex_chunk_size))
}

/// Width of each element of the index stream
pub fn index_width(vertex_count: u32) -> usize {
    width_for(u64::from(vertex_count))
}

/// Width of the index stream size field
pub fn face_size_width(index_count: u32) -> usize {
    width_for(u64::from(index_count))
}

/// Decode one mesh chunk starting at `start`
pub fn decode_mesh(
    reader: &mut OffsetReader<'_>,
    start: usize,
    version: FormatVersion,
) -> Result<Mesh, LmdError> {
    reader.seek(start + 7)?;
    let vertex_chunk_size = reader.read_u8()?;

    let name = reader.string_via_pointer(start + 8)?;
    let material_record = reader.pointer_at(start + 0x14)?;
    let material_name = reader.string_at(material_record + 8)?;

    let weight_name_table = reader.pointer_at(start + 0x58)?;
    // Bone palette table; names are all downstream consumers need
    let _weight_table = reader.pointer_at(start + 0x5C)?;

    reader.seek(start + 0x78)?;
    let index_count = reader.read_u32()?;
    reader.seek(start + 0x84)?;
    let vertex_count = reader.read_u32()?;

    let block_width = block_size_width(vertex_count, vertex_chunk_size);
    reader.skip(8)?;
    let vertex_block_size = reader.read_uint(block_width)? as usize;
    let vertex_offset = reader.position();

    let mut vertices =
        Vec::with_capacity((vertex_count as usize).min(reader.remaining() / MIN_VERTEX_SIZE));
    for _ in 0..vertex_count {
        vertices.push(decode_vertex(reader, vertex_chunk_size, version)?);
    }

    // Auxiliary records sit after a gap whose width tracks the block size width
    let unknown_width = if block_width == 1 { 2 } else { 4 };
    reader.seek(vertex_offset + vertex_block_size + block_width + unknown_width)?;
    let aux_count = reader.read_u32()? as usize;
    reader.skip(AUX_RECORD_SIZE * aux_count)?;

    let _index_stream_header = reader.read_u32()?;
    let _index_stream_size = reader.read_uint(face_size_width(index_count))?;

    let (faces, dropped_faces) = decode_faces(reader, index_count, vertex_count)?;
    if dropped_faces > 0 {
        tracing::warn!(
            "Mesh '{}': dropped {} face(s) referencing vertices >= {}",
            name,
            dropped_faces,
            vertex_count
        );
    }

    let bone_weight_names = decode_weight_names(reader, weight_name_table)?;
    check_weights(&name, &vertices, &bone_weight_names)?;

    tracing::info!(
        "- {}: {} - {} vertices, {} faces",
        name,
        material_name,
        vertices.len(),
        faces.len()
    );

    Ok(Mesh {
        name,
        material_name,
        vertex_chunk_size,
        index_count,
        vertices,
        faces,
        bone_weight_names,
        dropped_faces,
    })
}

/// Decode one vertex record at the cursor
pub(crate) fn decode_vertex(
    reader: &mut OffsetReader<'_>,
    vertex_chunk_size: u8,
    version: FormatVersion,
) -> Result<Vertex, LmdError> {
    let position = reader.read_vec3()?;
    reader.skip(4)?;

    let has_color = vertex_chunk_size >= COLOR_CHUNK_SIZE && version == FormatVersion::V1_0;
    let (color, alpha) = if has_color {
        let [r, g, b, a] = [
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
        ]
        .map(|c| f32::from(c) / 255.0);
        (Some([r, g, b]), Some([a, a, a]))
    } else {
        (None, None)
    };

    let u = reader.read_f16()?;
    let v = 1.0 - reader.read_f16()?;

    if has_color {
        reader.skip(usize::from(vertex_chunk_size - COLOR_CHUNK_SIZE))?;
    }

    let mut bone_indices = [0u8; 4];
    for index in &mut bone_indices {
        *index = reader.read_u8()?;
    }

    let mut bone_weights = [0.0f32; 4];
    for weight in &mut bone_weights {
        *weight = match version {
            FormatVersion::V1_0 => f32::from(reader.read_u16()?) / 65535.0,
            FormatVersion::V1_2Plus => reader.read_f32()?,
        };
    }

    Ok(Vertex {
        position,
        uv: [u, v],
        color,
        alpha,
        bone_indices,
        bone_weights,
    })
}

/// Read `index_count` indices as triangles, dropping any that reference a
/// vertex past `vertex_count`. Returns the kept faces and the dropped count.
fn decode_faces(
    reader: &mut OffsetReader<'_>,
    index_count: u32,
    vertex_count: u32,
) -> Result<(Vec<Face>, usize), LmdError> {
    let width = index_width(vertex_count);
    let triangle_count = (index_count as usize).div_ceil(3);
    let mut faces = Vec::with_capacity(triangle_count.min(reader.remaining() / (3 * width)));
    let mut dropped = 0;

    for _ in (0..index_count).step_by(3) {
        let face = Face::new(
            reader.read_uint(width)?,
            reader.read_uint(width)?,
            reader.read_uint(width)?,
        );
        if face.indices().iter().any(|&i| i >= vertex_count) {
            tracing::debug!("Dropping face {:?}", face.indices());
            dropped += 1;
            continue;
        }
        faces.push(face);
    }

    Ok((faces, dropped))
}

fn decode_weight_names(
    reader: &mut OffsetReader<'_>,
    table: usize,
) -> Result<Vec<String>, LmdError> {
    reader.seek(table)?;
    let count = reader.read_u32()? as usize;

    let mut names = Vec::with_capacity(count.min(reader.remaining() / 4));
    for index in 0..count {
        let entry = table + index * 4 + 4;
        let name = reader
            .string_via_pointer(entry)
            .in_record(RecordKind::WeightBoneName, index, entry)?;
        tracing::debug!("Weight bone {}: {}", index, name);
        names.push(name);
    }

    Ok(names)
}

/// Every non-zero weight must reference an entry of the weight name table
fn check_weights(mesh: &str, vertices: &[Vertex], names: &[String]) -> Result<(), LmdError> {
    for (vertex, v) in vertices.iter().enumerate() {
        for (slot, (&bone_index, &weight)) in v.bone_indices.iter().zip(&v.bone_weights).enumerate()
        {
            if weight != 0.0 && usize::from(bone_index) >= names.len() {
                return Err(LmdError::UnresolvedBoneWeight {
                    mesh: mesh.to_string(),
                    vertex,
                    slot,
                    bone_index,
                    name_count: names.len(),
                });
            }
        }
    }
    Ok(())
}
