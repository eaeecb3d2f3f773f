//! Synthetic LMD buffer builder
//!
//! Lays out a complete file (header, skeleton, texture/material tables and
//! mesh chunks) from plain descriptions, so tests can exercise the decoder
//! without shipping game assets. Records are appended in section order and
//! every relative pointer is patched once its target exists.
//!
//! ```ignore
//! let data = LmdBuilder::new()
//!     .bone(BoneSpec::root("root"))
//!     .bone(BoneSpec::child("spine", "root"))
//!     .build();
//! ```

use half::f16;

use crate::model::FormatVersion;

const EXTENDED_MATERIAL_FLAG: u32 = 0x4000_0000;

/// Narrowest width for a count-driven field (independent of the decoder's copy)
fn field_width(count: u64) -> usize {
    match count {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        _ => 4,
    }
}

#[derive(Default)]
struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn pos(&self) -> usize {
        self.buf.len()
    }

    /// Append `count` zero bytes and return where they start
    fn zeros(&mut self, count: usize) -> usize {
        let start = self.pos();
        self.buf.resize(start + count, 0);
        start
    }

    fn push_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn push_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn push_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn push_f16(&mut self, value: f32) {
        self.push_u16(f16::from_f32(value).to_bits());
    }

    fn push_uint(&mut self, value: u64, width: usize) {
        self.buf.extend_from_slice(&value.to_le_bytes()[..width]);
    }

    fn set_u8(&mut self, at: usize, value: u8) {
        self.buf[at] = value;
    }

    fn set_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn set_f32(&mut self, at: usize, value: f32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn set_uint(&mut self, at: usize, value: u64, width: usize) {
        self.buf[at..at + width].copy_from_slice(&value.to_le_bytes()[..width]);
    }

    /// Store a pointer at `field` so that it resolves to `target`
    fn set_ptr(&mut self, field: usize, target: usize) {
        let relative = target as i64 - (field as i64 + 4);
        self.buf[field..field + 4].copy_from_slice(&(relative as i32).to_le_bytes());
    }

    /// Append a `{length, bytes}` string record, padded to 4 bytes
    fn string(&mut self, bytes: &[u8]) -> usize {
        let start = self.pos();
        self.push_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self.align4();
        start
    }

    /// Append a string record and point `field` at it
    fn string_ptr(&mut self, field: usize, bytes: &[u8]) {
        let target = self.string(bytes);
        self.set_ptr(field, target);
    }

    fn align4(&mut self) {
        let padded = self.pos().next_multiple_of(4);
        self.buf.resize(padded, 0);
    }
}

/// Bone record description
#[derive(Debug, Clone)]
pub struct BoneSpec {
    pub name: Vec<u8>,
    pub parent_name: Vec<u8>,
    pub magic: u32,
    /// Matrix rows; the last row holds the position
    pub rows: [[f32; 4]; 4],
}

impl BoneSpec {
    /// Root bone (magic 0x4000) with an identity bind matrix
    pub fn root(name: &str) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            parent_name: Vec::new(),
            magic: 0x4000,
            rows: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Child bone (magic 0x6000) naming its parent
    pub fn child(name: &str, parent: &str) -> Self {
        Self {
            parent_name: parent.as_bytes().to_vec(),
            magic: 0x6000,
            ..Self::root(name)
        }
    }

    pub fn with_magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn with_parent_name(mut self, parent: &str) -> Self {
        self.parent_name = parent.as_bytes().to_vec();
        self
    }

    pub fn with_raw_name(mut self, name: &[u8]) -> Self {
        self.name = name.to_vec();
        self
    }

    pub fn with_rows(mut self, rows: [[f32; 4]; 4]) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_position(mut self, position: [f32; 3]) -> Self {
        self.rows[3] = [position[0], position[1], position[2], 1.0];
        self
    }
}

/// Texture record description
#[derive(Debug, Clone)]
pub struct TextureSpec {
    pub ref_key: String,
    pub file_name: String,
    pub map_name: String,
}

impl TextureSpec {
    pub fn new(ref_key: &str, file_name: &str, map_name: &str) -> Self {
        Self {
            ref_key: ref_key.to_string(),
            file_name: file_name.to_string(),
            map_name: map_name.to_string(),
        }
    }
}

/// Material record description
#[derive(Debug, Clone)]
pub struct MaterialSpec {
    pub name: String,
    pub flag: u32,
    pub slots: Vec<String>,
    /// Extra u32 words written into the record before the real fields
    pub fillers: Vec<(usize, u32)>,
}

impl MaterialSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flag: 0,
            slots: Vec::new(),
            fillers: Vec::new(),
        }
    }

    pub fn with_flag(mut self, flag: u32) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_slots(mut self, slots: &[&str]) -> Self {
        self.slots = slots.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_filler(mut self, offset: usize, value: u32) -> Self {
        self.fillers.push((offset, value));
        self
    }
}

/// Vertex description using raw stored values
#[derive(Debug, Clone, Copy)]
pub struct VertexSpec {
    pub position: [f32; 3],
    /// UV as stored in the file (V is flipped on decode)
    pub raw_uv: [f32; 2],
    pub rgba: [u8; 4],
    pub bone_indices: [u8; 4],
    pub bone_weights: [f32; 4],
}

impl VertexSpec {
    /// Vertex fully weighted to bone slot 0
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            raw_uv: [0.0, 0.0],
            rgba: [255, 255, 255, 255],
            bone_indices: [0; 4],
            bone_weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.raw_uv = [u, v];
        self
    }

    pub fn with_rgba(mut self, rgba: [u8; 4]) -> Self {
        self.rgba = rgba;
        self
    }

    pub fn with_bones(mut self, indices: [u8; 4], weights: [f32; 4]) -> Self {
        self.bone_indices = indices;
        self.bone_weights = weights;
        self
    }
}

/// Mesh chunk description
#[derive(Debug, Clone)]
pub struct MeshSpec {
    pub name: String,
    pub material_name: String,
    /// Stride written to the chunk header; `None` uses the natural record size
    pub vertex_chunk_size: Option<u8>,
    pub vertices: Vec<VertexSpec>,
    pub indices: Vec<u32>,
    pub weight_names: Vec<String>,
    pub aux_records: u32,
}

impl MeshSpec {
    pub fn new(name: &str, material_name: &str) -> Self {
        Self {
            name: name.to_string(),
            material_name: material_name.to_string(),
            vertex_chunk_size: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            weight_names: Vec::new(),
            aux_records: 0,
        }
    }

    pub fn with_vertices(mut self, vertices: Vec<VertexSpec>) -> Self {
        self.vertices = vertices;
        self
    }

    pub fn with_indices(mut self, indices: &[u32]) -> Self {
        self.indices = indices.to_vec();
        self
    }

    pub fn with_weight_names(mut self, names: &[&str]) -> Self {
        self.weight_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Vertex stride; under 1.0 a stride of 0x24 or more adds the color field
    pub fn with_chunk_size(mut self, size: u8) -> Self {
        self.vertex_chunk_size = Some(size);
        self
    }

    pub fn with_aux_records(mut self, count: u32) -> Self {
        self.aux_records = count;
        self
    }
}

/// Builds a complete LMD buffer
#[derive(Debug, Clone, Default)]
pub struct LmdBuilder {
    pub version: FormatVersion,
    pub bones: Vec<BoneSpec>,
    pub textures: Vec<TextureSpec>,
    pub materials: Vec<MaterialSpec>,
    pub meshes: Vec<MeshSpec>,
}

impl LmdBuilder {
    /// Empty builder using the 1.2+ vertex layout
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    pub fn bone(mut self, bone: BoneSpec) -> Self {
        self.bones.push(bone);
        self
    }

    pub fn texture(mut self, texture: TextureSpec) -> Self {
        self.textures.push(texture);
        self
    }

    pub fn material(mut self, material: MaterialSpec) -> Self {
        self.materials.push(material);
        self
    }

    pub fn mesh(mut self, mesh: MeshSpec) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Two bones, one texture, one single-slot material and a four-vertex
    /// mesh whose second triangle references vertex 9.
    pub fn sample_scene() -> Self {
        Self::new()
            .bone(BoneSpec::root("root"))
            .bone(BoneSpec::child("child", "root").with_position([0.0, 1.0, 0.0]))
            .texture(TextureSpec::new("tex0", "pm0001_00_body_co.tga", "ColorMap"))
            .material(MaterialSpec::new("pm0001_00_body").with_slots(&["tex0"]))
            .mesh(
                MeshSpec::new("body", "pm0001_00_body")
                    .with_vertices(vec![
                        VertexSpec::new([0.0, 0.0, 0.0]).with_uv(0.0, 0.0),
                        VertexSpec::new([1.0, 0.0, 0.0]).with_uv(1.0, 0.0),
                        VertexSpec::new([1.0, 1.0, 0.0])
                            .with_uv(1.0, 1.0)
                            .with_bones([0, 1, 0, 0], [0.5, 0.5, 0.0, 0.0]),
                        VertexSpec::new([0.0, 1.0, 0.0])
                            .with_uv(0.0, 1.0)
                            .with_bones([1, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]),
                    ])
                    .with_indices(&[0, 1, 2, 2, 3, 9])
                    .with_weight_names(&["root", "child"]),
            )
    }

    /// Natural vertex record size for this builder's version
    fn natural_chunk_size(&self) -> u8 {
        match self.version {
            FormatVersion::V1_0 => 0x20,
            FormatVersion::V1_2Plus => 0x28,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        let header = w.zeros(0x4C + 4 * self.meshes.len());
        w.set_u32(header + 0x48, self.meshes.len() as u32);

        let skeleton = self.write_skeleton(&mut w);
        w.set_ptr(header + 0x34, skeleton);

        let materials = self.write_materials(&mut w);
        w.set_ptr(header + 0x38, materials);

        for (i, mesh) in self.meshes.iter().enumerate() {
            let chunk = self.write_mesh(&mut w, mesh);
            w.set_ptr(header + 0x4C + 4 * i, chunk);
        }

        w.buf
    }

    fn write_skeleton(&self, w: &mut ByteWriter) -> usize {
        let section = w.zeros(12 + 4 * self.bones.len());
        w.set_u32(section + 8, self.bones.len() as u32);

        for (i, bone) in self.bones.iter().enumerate() {
            let record = w.zeros(0x4C);
            w.set_ptr(section + 12 + 4 * i, record);
            w.set_u32(record, bone.magic);
            for (r, row) in bone.rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    w.set_f32(record + 8 + (r * 4 + c) * 4, *value);
                }
            }
            w.string_ptr(record + 4, &bone.name);
            w.string_ptr(record + 0x48, &bone.parent_name);
        }

        section
    }

    fn write_materials(&self, w: &mut ByteWriter) -> usize {
        let section = w.zeros(16 + 4 * self.textures.len());
        w.set_u32(section + 12, self.textures.len() as u32);

        for (i, texture) in self.textures.iter().enumerate() {
            let record = w.zeros(16);
            w.set_ptr(section + 16 + 4 * i, record);
            w.string_ptr(record + 4, texture.ref_key.as_bytes());
            w.string_ptr(record + 8, texture.file_name.as_bytes());
            w.string_ptr(record + 12, texture.map_name.as_bytes());
        }

        let name_table = w.zeros(4 + 4 * self.materials.len());
        w.set_ptr(section + 4, name_table);
        w.set_u32(name_table, self.materials.len() as u32);

        for (i, material) in self.materials.iter().enumerate() {
            let slot_field = if material.flag == EXTENDED_MATERIAL_FLAG {
                0x44
            } else {
                0x40
            };
            let filler_end = material
                .fillers
                .iter()
                .map(|(offset, _)| offset + 4)
                .max()
                .unwrap_or(0);
            let size = (slot_field + 4 + 4 * material.slots.len()).max(filler_end);

            let record = w.zeros(size);
            w.set_ptr(name_table + 4 + 4 * i, record);
            for &(offset, value) in &material.fillers {
                w.set_u32(record + offset, value);
            }
            w.set_u32(record + 0x38, material.flag);
            w.set_u32(record + slot_field, material.slots.len() as u32);
            w.string_ptr(record + 4, material.name.as_bytes());
            for (s, slot) in material.slots.iter().enumerate() {
                w.string_ptr(record + slot_field + 4 + 4 * s, slot.as_bytes());
            }
        }

        section
    }

    fn write_mesh(&self, w: &mut ByteWriter, mesh: &MeshSpec) -> usize {
        let chunk_size = mesh
            .vertex_chunk_size
            .unwrap_or_else(|| self.natural_chunk_size());
        let has_color = self.version == FormatVersion::V1_0 && chunk_size >= 0x24;
        let vertex_count = mesh.vertices.len() as u64;
        let index_count = mesh.indices.len() as u64;

        let chunk = w.zeros(0x90);
        w.set_u8(chunk + 7, chunk_size);
        w.set_u32(chunk + 0x78, index_count as u32);
        w.set_u32(chunk + 0x84, vertex_count as u32);

        // Vertex block
        let block_width = field_width(vertex_count * u64::from(chunk_size));
        let block_size_field = w.zeros(block_width);
        let vertex_start = w.pos();
        for vertex in &mesh.vertices {
            for value in vertex.position {
                w.push_f32(value);
            }
            w.zeros(4);
            if has_color {
                for channel in vertex.rgba {
                    w.push_u8(channel);
                }
            }
            w.push_f16(vertex.raw_uv[0]);
            w.push_f16(vertex.raw_uv[1]);
            if has_color {
                w.zeros(usize::from(chunk_size) - 0x24);
            }
            for index in vertex.bone_indices {
                w.push_u8(index);
            }
            for weight in vertex.bone_weights {
                match self.version {
                    FormatVersion::V1_0 => w.push_u16((weight * 65535.0).round() as u16),
                    FormatVersion::V1_2Plus => w.push_f32(weight),
                }
            }
        }
        let block_size = (w.pos() - vertex_start) as u64;
        w.set_uint(block_size_field, block_size, block_width);

        // Gap, auxiliary records, index stream
        let gap = if block_width == 1 { 2 } else { 4 };
        w.zeros(block_width + gap);
        w.push_u32(mesh.aux_records);
        w.zeros(0x10 * mesh.aux_records as usize);

        let index_width = field_width(vertex_count);
        let stream_size = index_count * index_width as u64;
        w.push_u32(stream_size as u32);
        let size_width = field_width(index_count);
        let size_mask = if size_width == 4 {
            u64::from(u32::MAX)
        } else {
            (1u64 << (8 * size_width)) - 1
        };
        w.push_uint(stream_size & size_mask, size_width);
        for &index in &mesh.indices {
            w.push_uint(u64::from(index), index_width);
        }
        w.align4();

        // Referenced records
        w.string_ptr(chunk + 8, mesh.name.as_bytes());

        let material_record = w.zeros(8);
        w.string(mesh.material_name.as_bytes());
        w.set_ptr(chunk + 0x14, material_record);

        let name_table = w.zeros(4 + 4 * mesh.weight_names.len());
        w.set_u32(name_table, mesh.weight_names.len() as u32);
        for (i, name) in mesh.weight_names.iter().enumerate() {
            w.string_ptr(name_table + 4 + 4 * i, name.as_bytes());
        }
        w.set_ptr(chunk + 0x58, name_table);

        let weight_table = w.zeros(4);
        w.set_ptr(chunk + 0x5C, weight_table);

        chunk
    }
}
