//! Bounds-checked cursor over an LMD buffer

use half::f16;

use crate::error::LmdError;

/// Pick the byte width of a count-driven integer field.
///
/// LMD stores some size and index fields in the narrowest width that can hold
/// values up to `count`: 1 byte below 0x100, 2 bytes below 0x10000, else 4.
pub fn width_for(count: u64) -> usize {
    if count < 0x100 {
        1
    } else if count < 0x1_0000 {
        2
    } else {
        4
    }
}

/// Cursor over an immutable LMD buffer
///
/// All multi-byte reads are little-endian. A pointer is a signed 32-bit value
/// relative to the address immediately after the pointer field.
#[derive(Debug, Clone)]
pub struct OffsetReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> OffsetReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move to an absolute offset (the end of the buffer is a valid target)
    pub fn seek(&mut self, offset: usize) -> Result<(), LmdError> {
        if offset > self.data.len() {
            return Err(LmdError::OutOfRangeOffset {
                origin: self.pos,
                target: offset as i64,
                len: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Advance the cursor without reading
    pub fn skip(&mut self, count: usize) -> Result<(), LmdError> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], LmdError> {
        let available = self.remaining();
        if count > available {
            return Err(LmdError::TruncatedRead {
                offset: self.pos,
                needed: count,
                available,
            });
        }
        let data = self.data;
        let bytes = &data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], LmdError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, LmdError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, LmdError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, LmdError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, LmdError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Read an unsigned integer of `width` bytes (1, 2 or 4)
    pub fn read_uint(&mut self, width: usize) -> Result<u32, LmdError> {
        match width {
            1 => self.read_u8().map(u32::from),
            2 => self.read_u16().map(u32::from),
            4 => self.read_u32(),
            other => Err(LmdError::InvalidWidth(other)),
        }
    }

    pub fn read_f32(&mut self) -> Result<f32, LmdError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Read an IEEE half-precision float, widened to f32
    pub fn read_f16(&mut self) -> Result<f32, LmdError> {
        Ok(f16::from_bits(self.read_u16()?).to_f32())
    }

    pub fn read_vec3(&mut self) -> Result<[f32; 3], LmdError> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Read a relative pointer at the cursor and return the absolute address
    /// it refers to: the address just after the field plus the stored value.
    pub fn resolve_pointer(&mut self) -> Result<usize, LmdError> {
        let origin = self.pos;
        let relative = self.read_i32()?;
        let target = self.pos as i64 + i64::from(relative);
        if target < 0 || target >= self.data.len() as i64 {
            return Err(LmdError::OutOfRangeOffset {
                origin,
                target,
                len: self.data.len(),
            });
        }
        Ok(target as usize)
    }

    /// Resolve the pointer stored at `field`
    pub fn pointer_at(&mut self, field: usize) -> Result<usize, LmdError> {
        self.seek(field)?;
        self.resolve_pointer()
    }

    /// Read `count` consecutive pointers starting at the cursor
    pub fn read_pointer_table(&mut self, count: u32) -> Result<Vec<usize>, LmdError> {
        // Cap the pre-allocation by what the buffer could actually hold
        let mut table = Vec::with_capacity((count as usize).min(self.remaining() / 4));
        for _ in 0..count {
            table.push(self.resolve_pointer()?);
        }
        Ok(table)
    }

    /// Read a `{length: u32, bytes}` string record at the cursor.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_string(&mut self) -> Result<String, LmdError> {
        let length = self.read_u32()? as usize;
        let bytes = self.take(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read the string record at an absolute offset
    pub fn string_at(&mut self, offset: usize) -> Result<String, LmdError> {
        self.seek(offset)?;
        self.read_string()
    }

    /// Read the string record referenced by the pointer stored at `field`
    pub fn string_via_pointer(&mut self, field: usize) -> Result<String, LmdError> {
        let target = self.pointer_at(field)?;
        self.string_at(target)
    }
}
