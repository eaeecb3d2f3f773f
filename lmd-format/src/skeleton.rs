//! Skeleton section decoder
//!
//! # Bone record layout
//! ```text
//! 0x00: magic u32        (< 0x5000 marks a root bone)
//! 0x04: name pointer
//! 0x08: bind matrix      (4 rows × 4 f32)
//! 0x38: position         (3 × f32, overlaps the last matrix row)
//! 0x48: parent name pointer
//! ```

use glam::{EulerRot, Mat3, Mat4, Quat};

use crate::error::{LmdError, RecordContext, RecordKind};
use crate::model::{Bone, Skeleton};
use crate::reader::OffsetReader;

/// Bones whose magic is below this value never get a parent edge
pub const ROOT_BONE_MAGIC_THRESHOLD: u32 = 0x5000;

/// Decode every bone record referenced by the skeleton section
pub fn decode_skeleton(
    reader: &mut OffsetReader<'_>,
    section: usize,
) -> Result<Skeleton, LmdError> {
    reader
        .seek(section + 8)
        .in_record(RecordKind::Skeleton, 0, section)?;
    let bone_count = reader
        .read_u32()
        .in_record(RecordKind::Skeleton, 0, section)?;
    let records = reader
        .read_pointer_table(bone_count)
        .in_record(RecordKind::Skeleton, 0, section)?;

    tracing::info!(
        "Loading {} bone{}",
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    );

    let mut skeleton = Skeleton::default();
    for (index, &record) in records.iter().enumerate() {
        let bone =
            decode_bone(reader, record, &skeleton).in_record(RecordKind::Bone, index, record)?;
        skeleton.push(bone);
    }

    Ok(skeleton)
}

fn decode_bone(
    reader: &mut OffsetReader<'_>,
    record: usize,
    skeleton: &Skeleton,
) -> Result<Bone, LmdError> {
    reader.seek(record)?;
    let magic = reader.read_u32()?;
    let name = reader.string_via_pointer(record + 4)?;

    reader.seek(record + 8)?;
    let mut bind_matrix = [[0.0f32; 4]; 4];
    for row in &mut bind_matrix {
        for value in row.iter_mut() {
            *value = reader.read_f32()?;
        }
    }

    reader.seek(record + 0x38)?;
    let position = reader.read_vec3()?;
    let parent_name = reader.string_via_pointer(record + 0x48)?;

    let parent = if magic < ROOT_BONE_MAGIC_THRESHOLD {
        None
    } else {
        // Parents precede children in file order; forward references are fatal
        let index = skeleton
            .index_of(&parent_name)
            .ok_or_else(|| LmdError::UnresolvedParent {
                bone: name.clone(),
                parent: parent_name.clone(),
            })?;
        Some(index)
    };

    tracing::debug!(
        "Bone '{}' magic=0x{:X} parent={:?}",
        name,
        magic,
        parent.map(|_| parent_name.as_str())
    );

    Ok(Bone {
        pose_rotation: pose_rotation(&bind_matrix),
        pose_location: position,
        name,
        parent_name,
        bind_matrix,
        position,
        magic,
        parent,
    })
}

/// Negated XYZ Euler decomposition of a bind matrix's rotation part.
///
/// `rows` are read as matrix rows. Each basis column is normalized before
/// extracting the rotation, so uniform or per-axis scale does not leak into
/// the angles. XYZ order means R = Rz · Ry · Rx.
///
/// Of the two Euler triples describing a rotation, this always returns the
/// one with the Y angle in [-π/2, π/2]. Blender picks the triple with the
/// smaller absolute sum, so the numbers can differ for the same rotation.
pub fn pose_rotation(rows: &[[f32; 4]; 4]) -> [f32; 3] {
    let matrix = Mat4::from_cols_array_2d(rows).transpose();
    let basis = Mat3::from_mat4(matrix);
    let normalized = Mat3::from_cols(
        basis.x_axis.normalize_or_zero(),
        basis.y_axis.normalize_or_zero(),
        basis.z_axis.normalize_or_zero(),
    );
    let (z, y, x) = Quat::from_mat3(&normalized).to_euler(EulerRot::ZYX);
    [-x, -y, -z]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{BoneSpec, LmdBuilder};
    use crate::header::parse_header;

    fn decode(data: &[u8]) -> Result<Skeleton, LmdError> {
        let mut reader = OffsetReader::new(data);
        let header = parse_header(&mut reader)?;
        decode_skeleton(&mut reader, header.skeleton_offset)
    }

    fn rows_of(matrix: Mat4) -> [[f32; 4]; 4] {
        matrix.transpose().to_cols_array_2d()
    }

    fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_root_rule() {
        let data = LmdBuilder::new()
            .bone(BoneSpec::root("root").with_parent_name("ghost"))
            .bone(BoneSpec::child("spine", "root"))
            .build();

        let skeleton = decode(&data).unwrap();
        assert_eq!(skeleton.len(), 2);

        // magic 0x4000: parent name kept, no edge
        assert_eq!(skeleton.bones[0].magic, 0x4000);
        assert_eq!(skeleton.bones[0].parent_name, "ghost");
        assert_eq!(skeleton.bones[0].parent, None);

        assert_eq!(skeleton.bones[1].magic, 0x6000);
        assert_eq!(skeleton.bones[1].parent, Some(0));
        assert_eq!(skeleton.bones[1].parent_name, "root");
    }

    #[test]
    fn test_threshold_is_exact() {
        let data = LmdBuilder::new()
            .bone(BoneSpec::root("a"))
            .bone(BoneSpec::root("b").with_magic(0x4FFF).with_parent_name("a"))
            .bone(BoneSpec::child("c", "a").with_magic(0x5000))
            .build();

        let skeleton = decode(&data).unwrap();
        assert_eq!(skeleton.bones[1].parent, None);
        assert_eq!(skeleton.bones[2].parent, Some(0));
    }

    #[test]
    fn test_forward_parent_reference_is_fatal() {
        let data = LmdBuilder::new()
            .bone(BoneSpec::child("arm", "shoulder"))
            .bone(BoneSpec::root("shoulder"))
            .build();

        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            LmdError::Record {
                kind: RecordKind::Bone,
                index: 0,
                ..
            }
        ));
        assert_eq!(
            err.root_cause(),
            &LmdError::UnresolvedParent {
                bone: "arm".into(),
                parent: "shoulder".into()
            }
        );
    }

    #[test]
    fn test_bind_matrix_and_position() {
        let rotation = Mat4::from_rotation_x(0.5);
        let data = LmdBuilder::new()
            .bone(
                BoneSpec::root("root")
                    .with_rows(rows_of(rotation))
                    .with_position([1.0, 2.0, 3.0]),
            )
            .build();

        let skeleton = decode(&data).unwrap();
        let bone = &skeleton.bones[0];
        assert_eq!(bone.position, [1.0, 2.0, 3.0]);
        assert_eq!(bone.pose_location, [1.0, 2.0, 3.0]);
        // Position overlaps the fourth matrix row
        assert_eq!(bone.bind_matrix[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(bone.bind_matrix[1], rows_of(rotation)[1]);
        // Stored rows stay rows in the glam matrix
        let matrix = bone.bind_mat4();
        assert_eq!(matrix.row(1), rotation.row(1));
        assert_eq!(matrix.row(3), glam::Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_close(bone.pose_rotation, [-0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_pose_rotation_identity() {
        assert_close(pose_rotation(&rows_of(Mat4::IDENTITY)), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pose_rotation_xyz_order() {
        let (a, b, c) = (0.3, -0.2, 0.7);
        let matrix =
            Mat4::from_rotation_z(c) * Mat4::from_rotation_y(b) * Mat4::from_rotation_x(a);
        assert_close(pose_rotation(&rows_of(matrix)), [-a, -b, -c]);
    }

    #[test]
    fn test_pose_rotation_keeps_pitch_in_half_range() {
        // Y past π/2 comes back as the equivalent triple with |y| <= π/2
        let matrix =
            Mat4::from_rotation_z(0.1) * Mat4::from_rotation_y(2.0) * Mat4::from_rotation_x(0.3);
        let [x, y, z] = pose_rotation(&rows_of(matrix));
        assert!(y.abs() <= core::f32::consts::FRAC_PI_2 + 1e-5);

        let rebuilt = Quat::from_euler(EulerRot::ZYX, -z, -y, -x);
        let expected = Quat::from_mat4(&matrix);
        assert!(rebuilt.dot(expected).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_pose_rotation_ignores_scale() {
        let matrix = Mat4::from_scale(glam::Vec3::splat(2.5)) * Mat4::from_rotation_y(0.4);
        assert_close(pose_rotation(&rows_of(matrix)), [0.0, -0.4, 0.0]);
    }
}
