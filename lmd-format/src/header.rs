//! Top-level LMD header

use crate::error::LmdError;
use crate::reader::OffsetReader;

/// Absolute offset of the skeleton section pointer
pub const SKELETON_POINTER_OFFSET: usize = 0x34;
/// Absolute offset of the material section pointer
pub const MATERIAL_POINTER_OFFSET: usize = 0x38;
/// Absolute offset of the mesh count, followed by the mesh pointer table
pub const MESH_TABLE_OFFSET: usize = 0x48;

/// Section offsets resolved from the fixed header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmdHeader {
    pub skeleton_offset: usize,
    pub material_offset: usize,
    pub mesh_offsets: Vec<usize>,
}

/// Walk the fixed header and resolve every section pointer
pub fn parse_header(reader: &mut OffsetReader<'_>) -> Result<LmdHeader, LmdError> {
    let skeleton_offset = reader.pointer_at(SKELETON_POINTER_OFFSET)?;
    let material_offset = reader.pointer_at(MATERIAL_POINTER_OFFSET)?;

    reader.seek(MESH_TABLE_OFFSET)?;
    let mesh_count = reader.read_u32()?;
    let mesh_offsets = reader.read_pointer_table(mesh_count)?;

    tracing::debug!(
        "Header: skeleton at 0x{:X}, materials at 0x{:X}, {} mesh chunk(s)",
        skeleton_offset,
        material_offset,
        mesh_offsets.len()
    );

    Ok(LmdHeader {
        skeleton_offset,
        material_offset,
        mesh_offsets,
    })
}
