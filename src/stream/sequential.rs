// Plain little-endian helpers for the parts of a file that live outside the
// segregated buffers: the trailer and DSQ sequence files.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{DtsError, DtsResult};
use crate::math::{Quat16, glm};

/// u8 length then bytes.
pub fn write_string8<W: Write>(w: &mut W, s: &str) -> DtsResult<()> {
    let len = u8::try_from(s.len()).map_err(|_| DtsError::NameTooLong {
        len: s.len(),
        max: u8::MAX as usize,
    })?;
    w.write_u8(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub fn read_string8<R: Read>(r: &mut R) -> DtsResult<String> {
    let len = r.read_u8()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// i32 length then bytes.
pub fn write_string32<W: Write>(w: &mut W, s: &str) -> DtsResult<()> {
    w.write_i32::<LittleEndian>(s.len() as i32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub fn read_string32<R: Read>(r: &mut R) -> DtsResult<String> {
    let len = r.read_i32::<LittleEndian>()?;
    if !(0..=1 << 20).contains(&len) {
        return Err(DtsError::InvalidHeader(format!("string length {len}")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Bit set as `s32 numInts, s32 numWords, numWords x u32`. At least one
/// word is always written.
pub fn write_integer_set<W: Write>(w: &mut W, bits: &[bool]) -> DtsResult<()> {
    let words_len = bits.len().div_ceil(32).max(1);
    let mut words = vec![0u32; words_len];
    for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
        words[i >> 5] |= 1 << (i & 31);
    }
    w.write_i32::<LittleEndian>(words_len as i32)?;
    w.write_i32::<LittleEndian>(words_len as i32)?;
    for word in words {
        w.write_u32::<LittleEndian>(word)?;
    }
    Ok(())
}

/// Decodes to `numWords * 32` entries; callers truncate to the length
/// they know.
pub fn read_integer_set<R: Read>(r: &mut R) -> DtsResult<Vec<bool>> {
    let _num_ints = r.read_i32::<LittleEndian>()?;
    let num_words = r.read_i32::<LittleEndian>()?;
    if !(0..=1 << 16).contains(&num_words) {
        return Err(DtsError::InvalidHeader(format!(
            "integer set with {num_words} words"
        )));
    }
    let mut words = vec![0u32; num_words as usize];
    r.read_u32_into::<LittleEndian>(&mut words)?;
    Ok((0..words.len() * 32)
        .map(|i| words[i >> 5] & (1 << (i & 31)) != 0)
        .collect())
}

pub fn write_point3<W: Write>(w: &mut W, p: &glm::Vec3) -> DtsResult<()> {
    w.write_f32::<LittleEndian>(p.x)?;
    w.write_f32::<LittleEndian>(p.y)?;
    w.write_f32::<LittleEndian>(p.z)?;
    Ok(())
}

pub fn read_point3<R: Read>(r: &mut R) -> DtsResult<glm::Vec3> {
    Ok(glm::vec3(
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
    ))
}

pub fn write_quat16<W: Write>(w: &mut W, q: &glm::Quat) -> DtsResult<()> {
    for c in Quat16::from_quat(q).components() {
        w.write_i16::<LittleEndian>(c)?;
    }
    Ok(())
}

pub fn read_quat16<R: Read>(r: &mut R) -> DtsResult<glm::Quat> {
    let mut c = [0i16; 4];
    r.read_i16_into::<LittleEndian>(&mut c)?;
    Ok(Quat16::from_components(c).to_quat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integer_set_pads_to_whole_words() {
        let mut bits = vec![false; 40];
        bits[0] = true;
        bits[33] = true;
        bits[39] = true;

        let mut out = Vec::new();
        write_integer_set(&mut out, &bits).unwrap();
        assert_eq!(out.len(), 4 + 4 + 2 * 4);

        let back = read_integer_set(&mut Cursor::new(out)).unwrap();
        assert_eq!(back.len(), 64);
        assert_eq!(&back[..40], &bits[..]);
        assert!(back[40..].iter().all(|b| !b));
    }

    #[test]
    fn empty_integer_set_still_has_a_word() {
        let mut out = Vec::new();
        write_integer_set(&mut out, &[]).unwrap();
        assert_eq!(out, [1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn string8_empty_and_plain() {
        let mut out = Vec::new();
        write_string8(&mut out, "").unwrap();
        write_string8(&mut out, "skin").unwrap();
        let mut r = Cursor::new(out);
        assert_eq!(read_string8(&mut r).unwrap(), "");
        assert_eq!(read_string8(&mut r).unwrap(), "skin");
    }

    #[test]
    fn string8_refuses_long_names() {
        let mut out = Vec::new();
        let err = write_string8(&mut out, &"a".repeat(256)).unwrap_err();
        assert!(matches!(err, DtsError::NameTooLong { len: 256, max: 255 }));
        assert!(out.is_empty());
        write_string8(&mut out, &"a".repeat(255)).unwrap();
        assert_eq!(out.len(), 256);
    }

    #[test]
    fn broken_text_is_a_corrupt_file() {
        let err = read_string8(&mut Cursor::new(vec![2, 0xC3, 0x28])).unwrap_err();
        assert!(matches!(err, DtsError::InvalidText(_)));
        assert!(err.is_corrupt_file());

        let mut out = Vec::new();
        out.extend_from_slice(&2i32.to_le_bytes());
        out.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(read_string32(&mut Cursor::new(out)), Err(DtsError::InvalidText(_))));
    }
}
