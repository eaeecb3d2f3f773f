//! LMD decoding error types

use core::fmt;

/// Kind of record being decoded when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Header,
    Skeleton,
    Bone,
    MaterialSection,
    Texture,
    Material,
    TextureSlot,
    Mesh,
    WeightBoneName,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Header => "header",
            RecordKind::Skeleton => "skeleton section",
            RecordKind::Bone => "bone",
            RecordKind::MaterialSection => "material section",
            RecordKind::Texture => "texture",
            RecordKind::Material => "material",
            RecordKind::TextureSlot => "texture slot",
            RecordKind::Mesh => "mesh",
            RecordKind::WeightBoneName => "weight bone name",
        };
        f.write_str(name)
    }
}

/// LMD decoding error types
///
/// Every variant is fatal: a decode either produces a whole `SceneModel` or
/// one of these. Recoverable conditions (out-of-range faces, unknown texture
/// keys) are logged and never surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LmdError {
    /// Fewer bytes remain than a read requested
    #[error("truncated read at 0x{offset:08X}: needed {needed} bytes, {available} available")]
    TruncatedRead {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A pointer or seek target lies outside the buffer
    #[error("offset from 0x{origin:08X} resolves to {target} outside buffer of {len} bytes")]
    OutOfRangeOffset { origin: usize, target: i64, len: usize },

    /// A non-root bone names a parent that was not registered before it
    #[error("bone '{bone}' references unknown parent '{parent}'")]
    UnresolvedParent { bone: String, parent: String },

    /// A non-zero skin weight points past the mesh's bone-weight name table
    #[error(
        "mesh '{mesh}' vertex {vertex} influence {slot} uses bone slot {bone_index}, \
         but only {name_count} weight bone names exist"
    )]
    UnresolvedBoneWeight {
        mesh: String,
        vertex: usize,
        slot: usize,
        bone_index: u8,
        name_count: usize,
    },

    /// Integer width other than 1, 2 or 4 bytes
    #[error("invalid integer width {0} (expected 1, 2 or 4)")]
    InvalidWidth(usize),

    /// Unknown format version string
    #[error("unsupported format version '{0}' (expected \"1.0\" or \"1.2+\")")]
    UnsupportedVersion(String),

    /// Context wrapper naming the record at fault
    #[error("{kind} {index} at 0x{offset:08X}")]
    Record {
        kind: RecordKind,
        index: usize,
        offset: usize,
        #[source]
        source: Box<LmdError>,
    },
}

impl LmdError {
    /// Innermost error, skipping record context wrappers
    pub fn root_cause(&self) -> &LmdError {
        let mut current = self;
        while let LmdError::Record { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Attach record context to a decode result
pub(crate) trait RecordContext<T> {
    fn in_record(self, kind: RecordKind, index: usize, offset: usize) -> Result<T, LmdError>;
}

impl<T> RecordContext<T> for Result<T, LmdError> {
    fn in_record(self, kind: RecordKind, index: usize, offset: usize) -> Result<T, LmdError> {
        self.map_err(|e| LmdError::Record {
            kind,
            index,
            offset,
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LmdError::TruncatedRead {
                offset: 0x10,
                needed: 4,
                available: 2
            }
            .to_string(),
            "truncated read at 0x00000010: needed 4 bytes, 2 available"
        );
        assert_eq!(
            LmdError::InvalidWidth(3).to_string(),
            "invalid integer width 3 (expected 1, 2 or 4)"
        );
        assert_eq!(
            LmdError::UnresolvedParent {
                bone: "arm".into(),
                parent: "spine".into()
            }
            .to_string(),
            "bone 'arm' references unknown parent 'spine'"
        );
    }

    #[test]
    fn test_record_context_chain() {
        let inner = LmdError::InvalidWidth(8);
        let wrapped: Result<(), LmdError> = Err(inner.clone());
        let err = wrapped
            .in_record(RecordKind::Bone, 2, 0x120)
            .in_record(RecordKind::Skeleton, 0, 0x100)
            .unwrap_err();

        assert_eq!(err.to_string(), "skeleton section 0 at 0x00000100");
        assert_eq!(err.root_cause(), &inner);

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "bone 2 at 0x00000120");
    }
}
