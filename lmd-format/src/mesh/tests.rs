//! Tests for the mesh decoder

use half::f16;

use super::*;
use crate::fixture::{LmdBuilder, MeshSpec, VertexSpec};
use crate::header::parse_header;

fn decode_first_mesh(data: &[u8], version: FormatVersion) -> Result<Mesh, LmdError> {
    let mut reader = OffsetReader::new(data);
    let header = parse_header(&mut reader)?;
    decode_mesh(&mut reader, header.mesh_offsets[0], version)
}

fn quad(count: usize) -> Vec<VertexSpec> {
    (0..count)
        .map(|i| VertexSpec::new([i as f32, 0.0, 0.0]))
        .collect()
}

/// One 0x24-byte vertex record in the 1.0 color layout, padded so the 1.2+
/// layout (0x28 bytes) can read it too.
fn raw_color_vertex() -> Vec<u8> {
    let mut bytes = Vec::new();
    for value in [1.0f32, 2.0, 3.0] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&[0; 4]);
    bytes.extend_from_slice(&[255, 0, 51, 102]);
    bytes.extend_from_slice(&f16::from_f32(0.5).to_bits().to_le_bytes());
    bytes.extend_from_slice(&f16::from_f32(0.25).to_bits().to_le_bytes());
    bytes.extend_from_slice(&[2, 1, 0, 0]);
    bytes.extend_from_slice(&65535u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&[0; 4]);
    bytes
}

#[test]
fn test_width_selections_are_independent() {
    // Block size width follows vertex_count × chunk size
    assert_eq!(block_size_width(255, 1), 1);
    assert_eq!(block_size_width(256, 1), 2);
    assert_eq!(block_size_width(7, 0x28), 2);
    assert_eq!(block_size_width(65535, 1), 2);
    assert_eq!(block_size_width(65536, 1), 4);
    assert_eq!(block_size_width(0x1000, 0x28), 4);

    // Index width follows the vertex count alone
    assert_eq!(index_width(255), 1);
    assert_eq!(index_width(256), 2);
    assert_eq!(index_width(65535), 2);
    assert_eq!(index_width(65536), 4);

    // Face size field width follows the index count
    assert_eq!(face_size_width(255), 1);
    assert_eq!(face_size_width(256), 2);
    assert_eq!(face_size_width(65535), 2);
    assert_eq!(face_size_width(65536), 4);

    // Same vertex count, different widths
    assert_eq!(index_width(7), 1);
    assert_eq!(block_size_width(7, 0x28), 2);
}

#[test]
fn test_vertex_layout_by_version() {
    let bytes = raw_color_vertex();

    let legacy = decode_vertex(&mut OffsetReader::new(&bytes), 0x24, FormatVersion::V1_0).unwrap();
    assert_eq!(legacy.position, [1.0, 2.0, 3.0]);
    assert_eq!(legacy.color, Some([1.0, 0.0, 0.2]));
    assert_eq!(legacy.alpha, Some([0.4, 0.4, 0.4]));
    assert_eq!(legacy.uv, [0.5, 0.75]);
    assert_eq!(legacy.bone_indices, [2, 1, 0, 0]);
    assert_eq!(legacy.bone_weights, [1.0, 0.0, 0.0, 0.0]);

    let modern =
        decode_vertex(&mut OffsetReader::new(&bytes), 0x24, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(modern.position, [1.0, 2.0, 3.0]);
    assert_eq!(modern.color, None);
    assert_eq!(modern.alpha, None);
    assert_ne!(modern.uv, legacy.uv);
}

#[test]
fn test_legacy_small_stride_has_no_color() {
    let bytes = raw_color_vertex();
    let vertex = decode_vertex(&mut OffsetReader::new(&bytes), 0x20, FormatVersion::V1_0).unwrap();
    assert_eq!(vertex.color, None);
}

#[test]
fn test_uv_flip() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(vec![VertexSpec::new([0.0; 3]).with_uv(0.125, 0.25)])
                .with_weight_names(&["root"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.vertices[0].uv, [0.125, 0.75]);
}

#[test]
fn test_weight_decoding() {
    let vertices = vec![
        VertexSpec::new([0.0; 3]).with_bones([0, 1, 0, 0], [1.0, 0.0, 0.0, 0.0]),
        VertexSpec::new([0.0; 3]).with_bones([0, 1, 0, 0], [0.3, 0.7, 0.0, 0.0]),
    ];

    let legacy = LmdBuilder::new()
        .with_version(FormatVersion::V1_0)
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(vertices.clone())
                .with_weight_names(&["a", "b"]),
        )
        .build();
    let mesh = decode_first_mesh(&legacy, FormatVersion::V1_0).unwrap();
    assert_eq!(mesh.vertices[0].bone_weights[0], 1.0);
    let expected = (0.3f32 * 65535.0).round() / 65535.0;
    assert_eq!(mesh.vertices[1].bone_weights[0], expected);

    let modern = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(vertices)
                .with_weight_names(&["a", "b"]),
        )
        .build();
    let mesh = decode_first_mesh(&modern, FormatVersion::V1_2Plus).unwrap();
    // Passed through unchanged, no renormalization
    assert_eq!(mesh.vertices[1].bone_weights, [0.3, 0.7, 0.0, 0.0]);
}

#[test]
fn test_weights_not_normalized() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(vec![
                    VertexSpec::new([0.0; 3]).with_bones([0, 0, 0, 0], [0.2, 0.0, 0.0, 0.0]),
                ])
                .with_weight_names(&["a"]),
        )
        .build();
    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.vertices[0].bone_weights, [0.2, 0.0, 0.0, 0.0]);
}

#[test]
fn test_out_of_range_face_dropped() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(quad(5))
                .with_indices(&[0, 1, 2, 0, 1, 7, 2, 3, 4])
                .with_weight_names(&["root"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.index_count, 9);
    assert_eq!(mesh.faces, vec![Face::new(0, 1, 2), Face::new(2, 3, 4)]);
    assert_eq!(mesh.dropped_faces, 1);
}

#[test]
fn test_legacy_color_mesh() {
    let data = LmdBuilder::new()
        .with_version(FormatVersion::V1_0)
        .mesh(
            MeshSpec::new("hair", "mat")
                .with_chunk_size(0x2C)
                .with_vertices(vec![
                    VertexSpec::new([0.0; 3]).with_rgba([0, 255, 0, 51]),
                    VertexSpec::new([1.0, 0.0, 0.0]).with_rgba([255, 0, 0, 255]),
                    VertexSpec::new([0.0, 1.0, 0.0]),
                ])
                .with_indices(&[0, 1, 2])
                .with_weight_names(&["root"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_0).unwrap();
    assert!(mesh.has_color());
    assert_eq!(mesh.vertex_chunk_size, 0x2C);
    assert_eq!(mesh.vertices[0].color, Some([0.0, 1.0, 0.0]));
    assert_eq!(mesh.vertices[0].alpha, Some([0.2, 0.2, 0.2]));
    // Padding after the UV keeps later records aligned
    assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
    assert_eq!(mesh.vertices[2].position, [0.0, 1.0, 0.0]);
    assert_eq!(mesh.faces, vec![Face::new(0, 1, 2)]);
}

#[test]
fn test_wide_indices_and_block_size() {
    // 256 vertices: 2-byte indices, 2-byte block size (256 × 0x28 < 0x10000)
    let vertices = quad(256);
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("dense", "mat")
                .with_vertices(vertices)
                .with_indices(&[0, 255, 128, 255, 256, 1, 10, 11, 12])
                .with_weight_names(&["root"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.vertices.len(), 256);
    assert_eq!(mesh.vertices[255].position, [255.0, 0.0, 0.0]);
    assert_eq!(mesh.faces, vec![Face::new(0, 255, 128), Face::new(10, 11, 12)]);
}

#[test]
fn test_four_byte_block_size() {
    // 2000 × 0x28 = 80000 bytes: 4-byte block size, 2-byte indices
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("big", "mat")
                .with_vertices(quad(2000))
                .with_indices(&[1999, 0, 1])
                .with_weight_names(&["root"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.vertices.len(), 2000);
    assert_eq!(mesh.faces, vec![Face::new(1999, 0, 1)]);
}

#[test]
fn test_aux_records_skipped() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(quad(3))
                .with_indices(&[2, 1, 0])
                .with_aux_records(3)
                .with_weight_names(&["root"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.faces, vec![Face::new(2, 1, 0)]);
}

#[test]
fn test_names_and_weight_table() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("pm0001_body", "pm0001_mat")
                .with_vertices(quad(3))
                .with_indices(&[0, 1, 2])
                .with_weight_names(&["hips", "spine", "neck"]),
        )
        .build();

    let mesh = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap();
    assert_eq!(mesh.name, "pm0001_body");
    assert_eq!(mesh.material_name, "pm0001_mat");
    assert_eq!(mesh.bone_weight_names, vec!["hips", "spine", "neck"]);
}

#[test]
fn test_unresolved_bone_weight() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(vec![
                    VertexSpec::new([0.0; 3]),
                    VertexSpec::new([0.0; 3]).with_bones([0, 3, 0, 0], [0.5, 0.5, 0.0, 0.0]),
                ])
                .with_weight_names(&["a", "b"]),
        )
        .build();

    let err = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap_err();
    assert_eq!(
        err,
        LmdError::UnresolvedBoneWeight {
            mesh: "m".into(),
            vertex: 1,
            slot: 1,
            bone_index: 3,
            name_count: 2
        }
    );
}

#[test]
fn test_zero_weight_ignores_bad_index() {
    let data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(vec![
                    VertexSpec::new([0.0; 3]).with_bones([0, 9, 9, 9], [1.0, 0.0, 0.0, 0.0]),
                ])
                .with_weight_names(&["a"]),
        )
        .build();

    assert!(decode_first_mesh(&data, FormatVersion::V1_2Plus).is_ok());
}

#[test]
fn test_truncated_vertex_block() {
    let mut data = LmdBuilder::new()
        .mesh(
            MeshSpec::new("m", "mat")
                .with_vertices(quad(4))
                .with_weight_names(&["a"]),
        )
        .build();

    // Vertex count far beyond what the buffer holds
    let mut reader = OffsetReader::new(&data);
    let chunk = parse_header(&mut reader).unwrap().mesh_offsets[0];
    data[chunk + 0x84..chunk + 0x88].copy_from_slice(&100_000u32.to_le_bytes());

    let err = decode_first_mesh(&data, FormatVersion::V1_2Plus).unwrap_err();
    assert!(matches!(err, LmdError::TruncatedRead { .. }));
}
