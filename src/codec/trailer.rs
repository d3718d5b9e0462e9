// Sequences and the material list follow the segregated body as plain
// little-endian data.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{DtsError, DtsResult};
use crate::model::{Material, MaterialList, Sequence};
use crate::stream::{read_integer_set, write_integer_set};

/// Sequence record. DSQ files carry the name separately and leave out the
/// name index.
pub(crate) fn write_sequence<W: Write>(w: &mut W, seq: &Sequence, with_name_index: bool) -> DtsResult<()> {
    if with_name_index {
        w.write_i32::<LittleEndian>(seq.name_index)?;
    }
    w.write_u32::<LittleEndian>(seq.flags)?;
    w.write_i32::<LittleEndian>(seq.num_key_frames)?;
    w.write_f32::<LittleEndian>(seq.duration)?;
    w.write_i32::<LittleEndian>(seq.priority)?;
    w.write_i32::<LittleEndian>(seq.first_ground_frame)?;
    w.write_i32::<LittleEndian>(seq.num_ground_frames)?;
    w.write_i32::<LittleEndian>(seq.base_rotation)?;
    w.write_i32::<LittleEndian>(seq.base_translation)?;
    w.write_i32::<LittleEndian>(seq.base_scale)?;
    w.write_i32::<LittleEndian>(seq.base_object_state)?;
    w.write_i32::<LittleEndian>(seq.base_decal_state)?;
    w.write_i32::<LittleEndian>(seq.first_trigger)?;
    w.write_i32::<LittleEndian>(seq.num_triggers)?;
    w.write_f32::<LittleEndian>(seq.tool_begin)?;
    for set in seq.matters.sets() {
        write_integer_set(w, set)?;
    }
    Ok(())
}

pub(crate) fn read_sequence<R: Read>(r: &mut R, with_name_index: bool) -> DtsResult<Sequence> {
    let mut seq = Sequence {
        name_index: if with_name_index { r.read_i32::<LittleEndian>()? } else { -1 },
        flags: r.read_u32::<LittleEndian>()?,
        num_key_frames: r.read_i32::<LittleEndian>()?,
        duration: r.read_f32::<LittleEndian>()?,
        priority: r.read_i32::<LittleEndian>()?,
        first_ground_frame: r.read_i32::<LittleEndian>()?,
        num_ground_frames: r.read_i32::<LittleEndian>()?,
        base_rotation: r.read_i32::<LittleEndian>()?,
        base_translation: r.read_i32::<LittleEndian>()?,
        base_scale: r.read_i32::<LittleEndian>()?,
        base_object_state: r.read_i32::<LittleEndian>()?,
        base_decal_state: r.read_i32::<LittleEndian>()?,
        first_trigger: r.read_i32::<LittleEndian>()?,
        num_triggers: r.read_i32::<LittleEndian>()?,
        tool_begin: r.read_f32::<LittleEndian>()?,
        ..Sequence::default()
    };
    for set in seq.matters.sets_mut() {
        *set = read_integer_set(r)?;
    }
    Ok(seq)
}

/// Names first, then each property as its own column.
pub(crate) fn write_material_list<W: Write>(w: &mut W, list: &MaterialList) -> DtsResult<()> {
    w.write_u8(MaterialList::VERSION)?;
    w.write_i32::<LittleEndian>(list.len() as i32)?;
    for m in list.iter() {
        crate::stream::write_string8(w, &m.name)?;
    }
    for m in list.iter() {
        w.write_u32::<LittleEndian>(m.flags)?;
    }
    for m in list.iter() {
        w.write_i32::<LittleEndian>(m.reflectance)?;
    }
    for m in list.iter() {
        w.write_i32::<LittleEndian>(m.bump)?;
    }
    for m in list.iter() {
        w.write_i32::<LittleEndian>(m.detail)?;
    }
    for m in list.iter() {
        w.write_f32::<LittleEndian>(m.detail_scale)?;
    }
    for m in list.iter() {
        w.write_f32::<LittleEndian>(m.reflection)?;
    }
    Ok(())
}

pub(crate) fn read_material_list<R: Read>(r: &mut R) -> DtsResult<MaterialList> {
    let version = r.read_u8()?;
    if version != MaterialList::VERSION {
        return Err(DtsError::InvalidHeader(format!(
            "material list version {version}, expected {}",
            MaterialList::VERSION
        )));
    }
    let count = r.read_i32::<LittleEndian>()?;
    if !(0..=1 << 16).contains(&count) {
        return Err(DtsError::InvalidHeader(format!("{count} materials")));
    }
    let mut materials = Vec::with_capacity(count as usize);
    for _ in 0..count {
        materials.push(Material::new(crate::stream::read_string8(r)?, 0));
    }
    for m in &mut materials {
        m.flags = r.read_u32::<LittleEndian>()?;
    }
    for m in &mut materials {
        m.reflectance = r.read_i32::<LittleEndian>()?;
    }
    for m in &mut materials {
        m.bump = r.read_i32::<LittleEndian>()?;
    }
    for m in &mut materials {
        m.detail = r.read_i32::<LittleEndian>()?;
    }
    for m in &mut materials {
        m.detail_scale = r.read_f32::<LittleEndian>()?;
    }
    for m in &mut materials {
        m.reflection = r.read_f32::<LittleEndian>()?;
    }
    Ok(MaterialList { materials })
}

pub(crate) fn write_trailer<W: Write>(w: &mut W, sequences: &[Sequence], materials: &MaterialList) -> DtsResult<()> {
    w.write_i32::<LittleEndian>(sequences.len() as i32)?;
    for seq in sequences {
        write_sequence(w, seq, true)?;
    }
    write_material_list(w, materials)
}

pub(crate) fn read_trailer<R: Read>(r: &mut R) -> DtsResult<(Vec<Sequence>, MaterialList)> {
    let count = r.read_i32::<LittleEndian>()?;
    if !(0..=1 << 16).contains(&count) {
        return Err(DtsError::InvalidHeader(format!("{count} sequences")));
    }
    let sequences = (0..count)
        .map(|_| read_sequence(r, true))
        .collect::<DtsResult<Vec<_>>>()?;
    Ok((sequences, read_material_list(r)?))
}
