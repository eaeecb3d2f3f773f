//! Single-file conversion

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lmd_format::{DecodeOptions, FormatVersion, SceneModel, decode_lmd};

use crate::scene::{ExportScene, build_scene};
use crate::texture::TextureResolver;

/// Read and decode an LMD file
pub fn load_model(input: &Path, version: FormatVersion) -> Result<SceneModel> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read LMD: {:?}", input))?;
    tracing::debug!("Decoding {:?} ({} bytes, format {})", input, data.len(), version);

    decode_lmd(&data, &DecodeOptions::new(version))
        .with_context(|| format!("Failed to decode LMD: {:?}", input))
}

/// Default output path: the input with a `.json` extension
pub fn default_output(input: &Path) -> PathBuf {
    input.with_extension("json")
}

/// Convert one LMD file into a scene document
///
/// Textures are searched under `textures`, or next to the input file.
pub fn convert_model(
    input: &Path,
    output: &Path,
    version: FormatVersion,
    textures: Option<&Path>,
) -> Result<ExportScene> {
    let model = load_model(input, version)?;

    let texture_root = match textures {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let resolver = TextureResolver::new(&texture_root);

    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lmd".to_string());
    let scene = build_scene(&model, &resolver, &source_name);

    write_scene(&scene, output)?;
    tracing::info!(
        "Converted {:?} -> {:?} ({} bones, {} meshes, {} materials)",
        input,
        output,
        scene.armature.bones.len(),
        scene.meshes.len(),
        scene.materials.len()
    );
    Ok(scene)
}

/// Write a scene document as pretty JSON
pub fn write_scene(scene: &ExportScene, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file = File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, scene)
        .with_context(|| format!("Failed to write {:?}", output))?;
    writer.flush()?;
    Ok(())
}

/// Log a summary of a decoded model
pub fn describe_model(name: &str, model: &SceneModel) {
    tracing::info!(
        "{}: {} bone(s), {} texture(s), {} material(s), {} mesh(es)",
        name,
        model.skeleton.len(),
        model.textures.len(),
        model.materials.len(),
        model.meshes.len()
    );

    for bone in &model.skeleton.bones {
        match bone.parent {
            Some(parent) => tracing::info!(
                "  bone {} (parent {})",
                bone.name,
                model.skeleton.bones[parent].name
            ),
            None => tracing::info!("  bone {} (root, magic 0x{:X})", bone.name, bone.magic),
        }
    }
    for texture in &model.textures {
        tracing::info!(
            "  texture {} = {} [{}]",
            texture.ref_key,
            texture.file_name,
            texture.map_name
        );
    }
    for material in &model.materials {
        tracing::info!(
            "  material {} ({} slot(s), flag 0x{:08X})",
            material.name,
            material.texture_slot_keys.len(),
            material.flag
        );
    }
    for mesh in &model.meshes {
        tracing::info!(
            "  mesh {} [{}]: {} vertices, {} faces ({} dropped), {} weight name(s){}",
            mesh.name,
            mesh.material_name,
            mesh.vertices.len(),
            mesh.faces.len(),
            mesh.dropped_faces,
            mesh.bone_weight_names.len(),
            if mesh.has_color() { ", vertex color" } else { "" }
        );
    }
}
