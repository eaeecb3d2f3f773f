//! Texture and material table decoder
//!
//! # Material section layout
//! ```text
//! +0x04: pointer to material name table { count u32, pointers... }
//! +0x0C: texture count u32, followed by texture record pointers
//! ```
//!
//! Texture records hold three string pointers at +4 (ref key), +8 (file
//! name) and +12 (map name). Material records hold a name pointer at +4 and
//! a shape flag at +0x38 that decides where the slot count lives.

use hashbrown::{HashMap, HashSet};

use crate::error::{LmdError, RecordContext, RecordKind};
use crate::model::{Material, TextureRef};
use crate::reader::OffsetReader;

/// Flag value selecting the material record shape with slots at +0x44
pub const EXTENDED_MATERIAL_FLAG: u32 = 0x4000_0000;
const SLOT_COUNT_OFFSET: usize = 0x40;
const EXTENDED_SLOT_COUNT_OFFSET: usize = 0x44;

/// Decoded material section
#[derive(Debug, Clone, Default)]
pub struct MaterialTables {
    pub textures: Vec<TextureRef>,
    pub materials: Vec<Material>,
}

/// Decode the texture table, then the material table
pub fn decode_materials(
    reader: &mut OffsetReader<'_>,
    section: usize,
) -> Result<MaterialTables, LmdError> {
    let textures = decode_textures(reader, section)?;

    // Later entries with the same key replace earlier ones
    let lookup: HashMap<&str, &str> = textures
        .iter()
        .map(|t| (t.ref_key.as_str(), t.file_name.as_str()))
        .collect();

    let name_table = reader
        .pointer_at(section + 4)
        .in_record(RecordKind::MaterialSection, 0, section)?;
    reader
        .seek(name_table)
        .in_record(RecordKind::MaterialSection, 0, section)?;
    let material_count = reader
        .read_u32()
        .in_record(RecordKind::MaterialSection, 0, section)?;
    let records = reader
        .read_pointer_table(material_count)
        .in_record(RecordKind::MaterialSection, 0, section)?;

    tracing::info!(
        "Loading {} material{}",
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    );

    let mut seen = HashSet::new();
    let mut materials = Vec::with_capacity(records.len());
    for (index, &record) in records.iter().enumerate() {
        let name = reader
            .string_via_pointer(record + 4)
            .in_record(RecordKind::Material, index, record)?;
        if seen.contains(&name) {
            tracing::debug!("Material '{}' already decoded, skipping duplicate", name);
            continue;
        }

        let material = decode_material(reader, record, name, &lookup)
            .in_record(RecordKind::Material, index, record)?;
        seen.insert(material.name.clone());
        materials.push(material);
    }
    drop(lookup);

    Ok(MaterialTables {
        textures,
        materials,
    })
}

fn decode_textures(
    reader: &mut OffsetReader<'_>,
    section: usize,
) -> Result<Vec<TextureRef>, LmdError> {
    reader
        .seek(section + 12)
        .in_record(RecordKind::MaterialSection, 0, section)?;
    let texture_count = reader
        .read_u32()
        .in_record(RecordKind::MaterialSection, 0, section)?;
    let records = reader
        .read_pointer_table(texture_count)
        .in_record(RecordKind::MaterialSection, 0, section)?;

    tracing::info!(
        "Loading {} texture{}",
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    );

    let mut textures = Vec::with_capacity(records.len());
    for (index, &record) in records.iter().enumerate() {
        let texture =
            decode_texture(reader, record).in_record(RecordKind::Texture, index, record)?;
        tracing::debug!(
            "Texture {}: {} / {}",
            texture.ref_key,
            texture.file_name,
            texture.map_name
        );
        textures.push(texture);
    }

    Ok(textures)
}

fn decode_texture(reader: &mut OffsetReader<'_>, record: usize) -> Result<TextureRef, LmdError> {
    Ok(TextureRef {
        ref_key: reader.string_via_pointer(record + 4)?,
        file_name: reader.string_via_pointer(record + 8)?,
        map_name: reader.string_via_pointer(record + 12)?,
    })
}

fn decode_material(
    reader: &mut OffsetReader<'_>,
    record: usize,
    name: String,
    lookup: &HashMap<&str, &str>,
) -> Result<Material, LmdError> {
    reader.seek(record + 0x38)?;
    let flag = reader.read_u32()?;
    let slot_field = if flag == EXTENDED_MATERIAL_FLAG {
        EXTENDED_SLOT_COUNT_OFFSET
    } else {
        SLOT_COUNT_OFFSET
    };

    reader.seek(record + slot_field)?;
    let slot_count = reader.read_u32()?;
    let slots = reader.read_pointer_table(slot_count)?;

    tracing::debug!("Material '{}' flag=0x{:08X}, {} slot(s)", name, flag, slots.len());

    let mut texture_slot_keys = Vec::with_capacity(slots.len());
    let mut texture_files = Vec::with_capacity(slots.len());
    for (index, &slot) in slots.iter().enumerate() {
        let key = reader
            .string_at(slot)
            .in_record(RecordKind::TextureSlot, index, slot)?;
        let file = lookup.get(key.as_str()).map(|f| f.to_string());
        match &file {
            Some(file) => tracing::debug!("  slot [{}] -> {}", key, file),
            None => tracing::warn!("Material '{}' slot [{}] has no texture entry", name, key),
        }
        texture_slot_keys.push(key);
        texture_files.push(file);
    }

    Ok(Material {
        name,
        texture_slot_keys,
        texture_files,
        flag,
    })
}
