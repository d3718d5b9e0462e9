use crate::error::{DtsError, DtsResult};
use crate::math::{Box3, Quat16, glm};

/// In-memory body of a shape file.
///
/// Values are appended to the buffer matching their width and read back in
/// the same order through a cursor per buffer.
#[derive(Debug, Clone, Default)]
pub struct DtsStream {
    pub(crate) buffer32: Vec<u32>,
    pub(crate) buffer16: Vec<u16>,
    pub(crate) buffer8: Vec<u8>,
    cursor32: usize,
    cursor16: usize,
    cursor8: usize,
    checkpoint: u32,
}

impl DtsStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_buffers(buffer32: Vec<u32>, buffer16: Vec<u16>, buffer8: Vec<u8>) -> Self {
        Self {
            buffer32,
            buffer16,
            buffer8,
            ..Self::default()
        }
    }

    pub fn buffer32(&self) -> &[u32] {
        &self.buffer32
    }

    pub fn buffer16(&self) -> &[u16] {
        &self.buffer16
    }

    pub fn buffer8(&self) -> &[u8] {
        &self.buffer8
    }

    /// Number of checkpoints stored or verified so far.
    pub fn checkpoint_count(&self) -> u32 {
        self.checkpoint
    }

    /// `(32-bit, 16-bit, 8-bit)` elements not consumed yet.
    pub fn remaining(&self) -> (usize, usize, usize) {
        (
            self.buffer32.len() - self.cursor32,
            self.buffer16.len() - self.cursor16,
            self.buffer8.len() - self.cursor8,
        )
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buffer32.push(v);
    }

    pub fn write_s32(&mut self, v: i32) {
        self.buffer32.push(v as u32);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buffer32.push(v.to_bits());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buffer16.push(v);
    }

    pub fn write_s16(&mut self, v: i16) {
        self.buffer16.push(v as u16);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buffer8.push(v);
    }

    pub fn read_u32(&mut self) -> DtsResult<u32> {
        let v = *self.buffer32.get(self.cursor32).ok_or(DtsError::UnexpectedEnd {
            buffer: "32-bit",
            wanted: 1,
            available: 0,
        })?;
        self.cursor32 += 1;
        Ok(v)
    }

    pub fn read_s32(&mut self) -> DtsResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> DtsResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_u16(&mut self) -> DtsResult<u16> {
        let v = *self.buffer16.get(self.cursor16).ok_or(DtsError::UnexpectedEnd {
            buffer: "16-bit",
            wanted: 1,
            available: 0,
        })?;
        self.cursor16 += 1;
        Ok(v)
    }

    pub fn read_s16(&mut self) -> DtsResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u8(&mut self) -> DtsResult<u8> {
        let v = *self.buffer8.get(self.cursor8).ok_or(DtsError::UnexpectedEnd {
            buffer: "8-bit",
            wanted: 1,
            available: 0,
        })?;
        self.cursor8 += 1;
        Ok(v)
    }

    /// Generic append, dispatching on the value's width.
    pub fn write<T: StreamValue>(&mut self, value: T) {
        value.store(self);
    }

    pub fn read<T: StreamValue>(&mut self) -> DtsResult<T> {
        T::load(self)
    }

    pub fn write_all<T: StreamValue + Copy>(&mut self, values: &[T]) {
        for v in values {
            v.store(self);
        }
    }

    /// Read `count` values, failing early when the count is negative or
    /// larger than what is left in the stream.
    pub fn read_many<T: StreamValue>(&mut self, count: i32) -> DtsResult<Vec<T>> {
        let count = self.checked_count(count, T::WORDS32, T::WORDS16, T::WORDS8)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(T::load(self)?);
        }
        Ok(out)
    }

    /// Writes `len` as s32 followed by the values.
    pub fn write_counted<T: StreamValue + Copy>(&mut self, values: &[T]) {
        self.write_s32(values.len() as i32);
        self.write_all(values);
    }

    pub fn read_counted<T: StreamValue>(&mut self) -> DtsResult<Vec<T>> {
        let count = self.read_s32()?;
        self.read_many(count)
    }

    fn checked_count(&self, count: i32, w32: usize, w16: usize, w8: usize) -> DtsResult<usize> {
        if count < 0 {
            return Err(DtsError::InvalidHeader(format!("negative element count {count}")));
        }
        let count = count as usize;
        let (r32, r16, r8) = self.remaining();
        for (buffer, width, left) in [("32-bit", w32, r32), ("16-bit", w16, r16), ("8-bit", w8, r8)] {
            if width * count > left {
                return Err(DtsError::UnexpectedEnd {
                    buffer,
                    wanted: width * count,
                    available: left,
                });
            }
        }
        Ok(count)
    }

    /// Null-terminated string in the 8-bit buffer. An empty value still
    /// emits its terminator.
    pub fn write_cstring(&mut self, value: &str) {
        self.buffer8.extend(value.bytes().take_while(|&b| b != 0));
        self.buffer8.push(0);
    }

    pub fn read_cstring(&mut self) -> DtsResult<String> {
        let rest = &self.buffer8[self.cursor8..];
        let end = rest.iter().position(|&b| b == 0).ok_or(DtsError::UnexpectedEnd {
            buffer: "8-bit",
            wanted: rest.len() + 1,
            available: rest.len(),
        })?;
        let s = String::from_utf8(rest[..end].to_vec())?;
        self.cursor8 += end + 1;
        Ok(s)
    }

    pub fn store_checkpoint(&mut self) {
        let n = self.checkpoint;
        self.write_u8(n as u8);
        self.write_u16(n as u16);
        self.write_u32(n);
        self.checkpoint += 1;
    }

    pub fn read_checkpoint(&mut self) -> DtsResult<()> {
        let expected = self.checkpoint;
        let found8 = self.read_u8()?;
        let found16 = self.read_u16()?;
        let found32 = self.read_u32()?;
        self.checkpoint += 1;
        if found8 as u32 != expected & 0xFF
            || found16 as u32 != expected & 0xFFFF
            || found32 != expected
        {
            return Err(DtsError::CheckpointMismatch {
                expected,
                found8,
                found16,
                found32,
            });
        }
        Ok(())
    }

    /// Pad the narrow buffers so each ends on a 32-bit boundary.
    pub(crate) fn pad(&mut self) {
        if self.buffer16.len() % 2 != 0 {
            self.buffer16.push(0);
        }
        while self.buffer8.len() % 4 != 0 {
            self.buffer8.push(0);
        }
    }
}

/// A value with a fixed layout in the segregated buffers.
pub trait StreamValue: Sized {
    const WORDS32: usize = 0;
    const WORDS16: usize = 0;
    const WORDS8: usize = 0;

    fn store(&self, stream: &mut DtsStream);
    fn load(stream: &mut DtsStream) -> DtsResult<Self>;
}

macro_rules! scalar_value {
    ($ty:ty, $w32:expr, $w16:expr, $w8:expr, $write:ident, $read:ident) => {
        impl StreamValue for $ty {
            const WORDS32: usize = $w32;
            const WORDS16: usize = $w16;
            const WORDS8: usize = $w8;

            fn store(&self, stream: &mut DtsStream) {
                stream.$write(*self);
            }

            fn load(stream: &mut DtsStream) -> DtsResult<Self> {
                stream.$read()
            }
        }
    };
}

scalar_value!(u32, 1, 0, 0, write_u32, read_u32);
scalar_value!(i32, 1, 0, 0, write_s32, read_s32);
scalar_value!(f32, 1, 0, 0, write_f32, read_f32);
scalar_value!(u16, 0, 1, 0, write_u16, read_u16);
scalar_value!(i16, 0, 1, 0, write_s16, read_s16);
scalar_value!(u8, 0, 0, 1, write_u8, read_u8);

impl StreamValue for glm::Vec2 {
    const WORDS32: usize = 2;

    fn store(&self, stream: &mut DtsStream) {
        stream.write_f32(self.x);
        stream.write_f32(self.y);
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        Ok(glm::vec2(stream.read_f32()?, stream.read_f32()?))
    }
}

impl StreamValue for glm::Vec3 {
    const WORDS32: usize = 3;

    fn store(&self, stream: &mut DtsStream) {
        stream.write_f32(self.x);
        stream.write_f32(self.y);
        stream.write_f32(self.z);
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        Ok(glm::vec3(
            stream.read_f32()?,
            stream.read_f32()?,
            stream.read_f32()?,
        ))
    }
}

impl StreamValue for glm::Vec4 {
    const WORDS32: usize = 4;

    fn store(&self, stream: &mut DtsStream) {
        for i in 0..4 {
            stream.write_f32(self[i]);
        }
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        Ok(glm::vec4(
            stream.read_f32()?,
            stream.read_f32()?,
            stream.read_f32()?,
            stream.read_f32()?,
        ))
    }
}

// Matrices go out row by row.
impl StreamValue for glm::Mat4 {
    const WORDS32: usize = 16;

    fn store(&self, stream: &mut DtsStream) {
        for r in 0..4 {
            for c in 0..4 {
                stream.write_f32(self[(r, c)]);
            }
        }
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        let mut m = glm::Mat4::zeros();
        for r in 0..4 {
            for c in 0..4 {
                m[(r, c)] = stream.read_f32()?;
            }
        }
        Ok(m)
    }
}

impl StreamValue for Box3 {
    const WORDS32: usize = 6;

    fn store(&self, stream: &mut DtsStream) {
        self.min.store(stream);
        self.max.store(stream);
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        let min = glm::Vec3::load(stream)?;
        let max = glm::Vec3::load(stream)?;
        Ok(Box3::new(min, max))
    }
}

impl StreamValue for Quat16 {
    const WORDS16: usize = 4;

    fn store(&self, stream: &mut DtsStream) {
        for c in self.components() {
            stream.write_s16(c);
        }
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        Ok(Quat16::from_components([
            stream.read_s16()?,
            stream.read_s16()?,
            stream.read_s16()?,
            stream.read_s16()?,
        ]))
    }
}

/// Full-precision rotations are packed on the way out.
impl StreamValue for glm::Quat {
    const WORDS16: usize = 4;

    fn store(&self, stream: &mut DtsStream) {
        Quat16::from_quat(self).store(stream);
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        Ok(Quat16::load(stream)?.to_quat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_land_in_their_width_buffer() {
        let mut s = DtsStream::new();
        s.write_s32(-2);
        s.write_f32(1.5);
        s.write_s16(-3);
        s.write_u8(7);
        assert_eq!(s.buffer32(), &[(-2i32) as u32, 1.5f32.to_bits()]);
        assert_eq!(s.buffer16(), &[(-3i16) as u16]);
        assert_eq!(s.buffer8(), &[7]);

        assert_eq!(s.read_s16().unwrap(), -3);
        assert_eq!(s.read_s32().unwrap(), -2);
        assert_eq!(s.read_f32().unwrap(), 1.5);
        assert_eq!(s.read_u8().unwrap(), 7);
        assert!(matches!(s.read_u8(), Err(DtsError::UnexpectedEnd { .. })));
    }

    #[test]
    fn checkpoints_count_up() {
        let mut s = DtsStream::new();
        for _ in 0..3 {
            s.store_checkpoint();
        }
        assert_eq!(s.buffer32(), &[0, 1, 2]);
        let mut r = DtsStream::from_buffers(s.buffer32.clone(), s.buffer16.clone(), s.buffer8.clone());
        for n in 0..3 {
            assert_eq!(r.checkpoint_count(), n);
            r.read_checkpoint().unwrap();
        }
    }

    #[test]
    fn corrupt_checkpoint_is_fatal() {
        let mut s = DtsStream::new();
        s.store_checkpoint();
        s.store_checkpoint();
        s.buffer8[1] = 9;
        s.read_checkpoint().unwrap();
        match s.read_checkpoint() {
            Err(DtsError::CheckpointMismatch {
                expected, found8, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(found8, 9);
            }
            other => panic!("expected checkpoint mismatch, got {other:?}"),
        }
    }

    #[test]
    fn cstrings_and_empty_values() {
        let mut s = DtsStream::new();
        s.write_cstring("node");
        s.write_cstring("");
        assert_eq!(s.buffer8(), b"node\0\0");
        assert_eq!(s.read_cstring().unwrap(), "node");
        assert_eq!(s.read_cstring().unwrap(), "");
    }

    #[test]
    fn cstrings_must_be_utf8() {
        let mut s = DtsStream::new();
        s.write_u8(0xFF);
        s.write_u8(0);
        assert!(matches!(s.read_cstring(), Err(DtsError::InvalidText(_))));
    }

    #[test]
    fn counted_reads_reject_oversized_counts() {
        let mut s = DtsStream::new();
        s.write_s32(1000);
        s.write_f32(1.0);
        assert!(matches!(
            s.read_counted::<glm::Vec3>(),
            Err(DtsError::UnexpectedEnd { wanted: 3000, .. })
        ));
    }

    #[test]
    fn pad_aligns_narrow_buffers() {
        let mut s = DtsStream::new();
        s.write_u16(1);
        s.write_u8(1);
        s.pad();
        assert_eq!(s.buffer16().len(), 2);
        assert_eq!(s.buffer8().len(), 4);
    }
}
