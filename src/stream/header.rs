use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use super::DtsStream;
use crate::error::{DtsError, DtsResult};

/// The only shape version this crate reads and writes.
pub const DTS_VERSION: u32 = 24;

/// Four-word header in front of the segregated buffers. Offsets and sizes
/// are counted in 32-bit words from the end of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub version: u32,
    pub exporter_version: u32,
    pub total_size: u32,
    pub offset16: u32,
    pub offset8: u32,
}

impl StreamHeader {
    fn for_stream(stream: &DtsStream, version: u32, exporter_version: u32) -> Self {
        let offset16 = stream.buffer32.len() as u32;
        let offset8 = offset16 + stream.buffer16.len() as u32 / 2;
        let total_size = offset8 + stream.buffer8.len() as u32 / 4;
        Self {
            version,
            exporter_version,
            total_size,
            offset16,
            offset8,
        }
    }

    pub fn len32(&self) -> usize {
        self.offset16 as usize
    }

    pub fn len16(&self) -> usize {
        (self.offset8 - self.offset16) as usize * 2
    }

    pub fn len8(&self) -> usize {
        (self.total_size - self.offset8) as usize * 4
    }

    fn write_to<W: Write>(&self, w: &mut W) -> DtsResult<()> {
        w.write_u32::<LittleEndian>(self.version | (self.exporter_version << 16))?;
        w.write_u32::<LittleEndian>(self.total_size)?;
        w.write_u32::<LittleEndian>(self.offset16)?;
        w.write_u32::<LittleEndian>(self.offset8)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> DtsResult<Self> {
        let word = r.read_u32::<LittleEndian>()?;
        let total_size = r.read_u32::<LittleEndian>()?;
        let offset16 = r.read_u32::<LittleEndian>()?;
        let offset8 = r.read_u32::<LittleEndian>()?;

        let version = word & 0xFF;
        if version != DTS_VERSION {
            return Err(DtsError::VersionMismatch {
                found: version,
                expected: DTS_VERSION,
            });
        }
        if offset16 > offset8 || offset8 > total_size {
            return Err(DtsError::InvalidHeader(format!(
                "offsets out of order: offset16 {offset16}, offset8 {offset8}, total {total_size}"
            )));
        }

        Ok(Self {
            version,
            exporter_version: word >> 16,
            total_size,
            offset16,
            offset8,
        })
    }
}

impl DtsStream {
    /// Pad, then write header and buffers. The checkpoint counter and
    /// buffers are left as they are so the stream can be inspected after.
    pub fn flush<W: Write>(&mut self, w: &mut W, exporter_version: u32) -> DtsResult<StreamHeader> {
        self.pad();
        let header = StreamHeader::for_stream(self, DTS_VERSION, exporter_version);
        header.write_to(w)?;

        if cfg!(target_endian = "little") {
            w.write_all(bytemuck::cast_slice(&self.buffer32))?;
            w.write_all(bytemuck::cast_slice(&self.buffer16))?;
        } else {
            for &v in &self.buffer32 {
                w.write_u32::<LittleEndian>(v)?;
            }
            for &v in &self.buffer16 {
                w.write_u16::<LittleEndian>(v)?;
            }
        }
        w.write_all(&self.buffer8)?;

        debug!(
            "flushed shape body: {} words32, {} words16, {} bytes8, {} checkpoints",
            self.buffer32.len(),
            self.buffer16.len(),
            self.buffer8.len(),
            self.checkpoint_count()
        );
        Ok(header)
    }

    /// Read header and body. The reader is left positioned at the trailer.
    pub fn read_body<R: Read>(r: &mut R) -> DtsResult<(Self, StreamHeader)> {
        let header = StreamHeader::read_from(r)?;

        let mut buffer32 = vec![0u32; header.len32()];
        r.read_u32_into::<LittleEndian>(&mut buffer32)?;
        let mut buffer16 = vec![0u16; header.len16()];
        r.read_u16_into::<LittleEndian>(&mut buffer16)?;
        let mut buffer8 = vec![0u8; header.len8()];
        r.read_exact(&mut buffer8)?;

        Ok((Self::from_buffers(buffer32, buffer16, buffer8), header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_offsets_follow_buffer_lengths() {
        let mut s = DtsStream::new();
        s.write_u32(5);
        s.write_u32(6);
        s.write_u16(1);
        s.write_u8(3);
        let mut out = Vec::new();
        let h = s.flush(&mut out, 3).unwrap();
        assert_eq!(h.offset16, 2);
        assert_eq!(h.offset8, 3);
        assert_eq!(h.total_size, 4);
        assert_eq!(out.len(), 16 + 4 * 4);
        assert_eq!(&out[0..4], &(24u32 | 3 << 16).to_le_bytes());

        let (mut back, h2) = DtsStream::read_body(&mut Cursor::new(out)).unwrap();
        assert_eq!(h2.exporter_version, 3);
        assert_eq!(back.read_u32().unwrap(), 5);
        assert_eq!(back.read_u16().unwrap(), 1);
        assert_eq!(back.read_u8().unwrap(), 3);
    }

    #[test]
    fn rejects_other_versions() {
        let mut bytes = Vec::new();
        for w in [23u32, 0, 0, 0] {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let err = DtsStream::read_body(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            DtsError::VersionMismatch {
                found: 23,
                expected: 24
            }
        ));
    }

    #[test]
    fn truncated_body_is_corrupt() {
        let mut bytes = Vec::new();
        for w in [24u32, 8, 8, 8] {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let err = DtsStream::read_body(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.is_corrupt_file());
    }
}
