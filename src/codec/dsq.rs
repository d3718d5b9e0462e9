// Standalone sequence files. A DSQ carries one sequence plus the keyframes
// it uses, keyed by node name so it can be applied to another shape.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::trailer::{read_sequence, write_sequence};
use crate::error::{DtsError, DtsResult};
use crate::math::glm;
use crate::model::{NodeChannel, ObjectState, Sequence, SequenceFlags, Shape, Trigger};
use crate::stream::{
    DTS_VERSION, read_point3, read_quat16, read_string32, write_point3, write_quat16, write_string32,
};

/// Marks the legacy object section as empty.
const NO_OBJECT_NAMES: i32 = 1337;

/// Everything stored in a DSQ file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DsqFile {
    pub version: i32,
    pub node_names: Vec<String>,
    pub num_objects: i32,
    pub rotations: Vec<glm::Quat>,
    pub translations: Vec<glm::Vec3>,
    pub uniform_scales: Vec<f32>,
    pub aligned_scales: Vec<glm::Vec3>,
    pub arbitrary_scale_rots: Vec<glm::Quat>,
    pub arbitrary_scale_factors: Vec<glm::Vec3>,
    pub ground_translations: Vec<glm::Vec3>,
    pub ground_rotations: Vec<glm::Quat>,
    pub object_states: Vec<ObjectState>,
    pub sequences: Vec<(String, Sequence)>,
    pub triggers: Vec<Trigger>,
}

/// `count` entries of `pool` starting at `base`; a negative base reads
/// from the start.
fn window<'a, T>(pool: &'a [T], base: i32, count: usize, what: &'static str) -> DtsResult<&'a [T]> {
    let start = base.max(0) as usize;
    pool.get(start..start + count)
        .ok_or_else(|| DtsError::out_of_range(what, (start + count) as i64 - 1, pool.len()))
}

fn read_count<R: Read>(r: &mut R, what: &str) -> DtsResult<usize> {
    let n = r.read_i32::<LittleEndian>()?;
    if !(0..=1 << 24).contains(&n) {
        return Err(DtsError::InvalidHeader(format!("{n} {what}")));
    }
    Ok(n as usize)
}

/// Write sequence `index` of `shape` as a DSQ. Only nodes the sequence
/// animates are listed; the sequence's node matters sets are narrowed to
/// that list and its keyframe bases are rebased to zero.
pub fn write_dsq<W: Write>(w: &mut W, shape: &Shape, index: usize) -> DtsResult<()> {
    let source = shape
        .sequences
        .get(index)
        .ok_or_else(|| DtsError::out_of_range("sequence", index as i64, shape.sequences.len()))?;
    let frames = source.num_key_frames.max(0) as usize;
    let nodes_used = source.nodes_used(None);
    let node_rots = source.count_nodes(Some(NodeChannel::Rotation)) * frames;
    let node_locs = source.count_nodes(Some(NodeChannel::Translation)) * frames;
    let node_scales = source.count_nodes(Some(NodeChannel::Scale)) * frames;

    w.write_i32::<LittleEndian>(DTS_VERSION as i32)?;

    w.write_i32::<LittleEndian>(nodes_used.len() as i32)?;
    for &n in &nodes_used {
        let name = shape.nodes.get(n).map_or("", |node| shape.names.get(node.name));
        write_string32(w, name)?;
    }
    if nodes_used.len() != source.count_nodes(None) {
        warn!(
            "node list size mismatch: expected {} nodes, got {}",
            source.count_nodes(None),
            nodes_used.len()
        );
    }

    w.write_i32::<LittleEndian>(NO_OBJECT_NAMES)?;
    w.write_i32::<LittleEndian>(shape.objects.len() as i32)?;

    w.write_i32::<LittleEndian>(node_rots as i32)?;
    for q in window(&shape.node_rotations, source.base_rotation, node_rots, "node rotation")? {
        write_quat16(w, q)?;
    }
    w.write_i32::<LittleEndian>(node_locs as i32)?;
    for p in window(&shape.node_translations, source.base_translation, node_locs, "node translation")? {
        write_point3(w, p)?;
    }

    if source.has_flag(SequenceFlags::UniformScale) {
        w.write_i32::<LittleEndian>(node_scales as i32)?;
        for s in window(&shape.node_uniform_scales, source.base_scale, node_scales, "uniform scale")? {
            w.write_f32::<LittleEndian>(*s)?;
        }
    } else {
        w.write_i32::<LittleEndian>(0)?;
    }
    if source.has_flag(SequenceFlags::AlignedScale) {
        w.write_i32::<LittleEndian>(node_scales as i32)?;
        for s in window(&shape.node_aligned_scales, source.base_scale, node_scales, "aligned scale")? {
            write_point3(w, s)?;
        }
    } else {
        w.write_i32::<LittleEndian>(0)?;
    }
    if source.has_flag(SequenceFlags::ArbitraryScale) {
        w.write_i32::<LittleEndian>(node_scales as i32)?;
        let rots = window(&shape.node_arbitrary_scale_rots, source.base_scale, node_scales, "arbitrary scale")?;
        let factors = window(&shape.node_arbitrary_scale_factors, source.base_scale, node_scales, "arbitrary scale")?;
        for q in rots {
            write_quat16(w, q)?;
        }
        for s in factors {
            write_point3(w, s)?;
        }
    } else {
        w.write_i32::<LittleEndian>(0)?;
    }

    let ground = source.num_ground_frames.max(0) as usize;
    w.write_i32::<LittleEndian>(ground as i32)?;
    for p in window(&shape.ground_translations, source.first_ground_frame, ground, "ground frame")? {
        write_point3(w, p)?;
    }
    for q in window(&shape.ground_rotations, source.first_ground_frame, ground, "ground frame")? {
        write_quat16(w, q)?;
    }

    // No object states
    w.write_i32::<LittleEndian>(0)?;

    let mut seq = source.clone();
    let narrow = |set: &[bool]| -> Vec<bool> {
        nodes_used.iter().map(|&n| set.get(n).copied().unwrap_or(false)).collect()
    };
    seq.matters.rotation = narrow(&source.matters.rotation);
    seq.matters.translation = narrow(&source.matters.translation);
    seq.matters.scale = narrow(&source.matters.scale);
    for base in [
        &mut seq.base_rotation,
        &mut seq.base_translation,
        &mut seq.base_scale,
        &mut seq.first_ground_frame,
        &mut seq.first_trigger,
    ] {
        *base = (*base).min(0);
    }

    w.write_i32::<LittleEndian>(1)?;
    write_string32(w, shape.names.get(source.name_index))?;
    write_sequence(w, &seq, false)?;

    if source.first_trigger > -1 {
        let count = source.num_triggers.max(0) as usize;
        w.write_i32::<LittleEndian>(count as i32)?;
        for t in window(&shape.triggers, source.first_trigger, count, "trigger")? {
            w.write_u32::<LittleEndian>(t.state)?;
            w.write_f32::<LittleEndian>(t.pos)?;
        }
    } else {
        w.write_i32::<LittleEndian>(0)?;
    }

    debug!(
        "wrote DSQ for {}: {} nodes, {} rotations, {} translations",
        shape.names.get(source.name_index),
        nodes_used.len(),
        node_rots,
        node_locs
    );
    Ok(())
}

pub fn read_dsq<R: Read>(r: &mut R) -> DtsResult<DsqFile> {
    let version = r.read_i32::<LittleEndian>()?;
    if version != DTS_VERSION as i32 {
        return Err(DtsError::VersionMismatch {
            found: version as u32,
            expected: DTS_VERSION,
        });
    }
    let mut dsq = DsqFile {
        version,
        ..DsqFile::default()
    };

    let num_nodes = read_count(r, "node names")?;
    for _ in 0..num_nodes {
        dsq.node_names.push(read_string32(r)?);
    }
    let marker = r.read_i32::<LittleEndian>()?;
    if marker != NO_OBJECT_NAMES {
        return Err(DtsError::InvalidHeader(format!("legacy object marker {marker}")));
    }
    dsq.num_objects = r.read_i32::<LittleEndian>()?;

    for _ in 0..read_count(r, "rotations")? {
        dsq.rotations.push(read_quat16(r)?);
    }
    for _ in 0..read_count(r, "translations")? {
        dsq.translations.push(read_point3(r)?);
    }
    for _ in 0..read_count(r, "uniform scales")? {
        dsq.uniform_scales.push(r.read_f32::<LittleEndian>()?);
    }
    for _ in 0..read_count(r, "aligned scales")? {
        dsq.aligned_scales.push(read_point3(r)?);
    }
    let arbitrary = read_count(r, "arbitrary scales")?;
    for _ in 0..arbitrary {
        dsq.arbitrary_scale_rots.push(read_quat16(r)?);
    }
    for _ in 0..arbitrary {
        dsq.arbitrary_scale_factors.push(read_point3(r)?);
    }
    let ground = read_count(r, "ground frames")?;
    for _ in 0..ground {
        dsq.ground_translations.push(read_point3(r)?);
    }
    for _ in 0..ground {
        dsq.ground_rotations.push(read_quat16(r)?);
    }
    for _ in 0..read_count(r, "object states")? {
        dsq.object_states.push(ObjectState {
            vis: r.read_f32::<LittleEndian>()?,
            frame: r.read_i32::<LittleEndian>()?,
            mat_frame: r.read_i32::<LittleEndian>()?,
        });
    }

    for _ in 0..read_count(r, "sequences")? {
        let name = read_string32(r)?;
        let mut seq = read_sequence(r, false)?;
        let m = &mut seq.matters;
        for set in [&mut m.rotation, &mut m.translation, &mut m.scale] {
            set.truncate(num_nodes);
        }
        for set in [&mut m.vis, &mut m.frame, &mut m.mat_frame] {
            set.truncate(dsq.num_objects.max(0) as usize);
        }
        dsq.sequences.push((name, seq));
    }

    for _ in 0..read_count(r, "triggers")? {
        dsq.triggers.push(Trigger {
            state: r.read_u32::<LittleEndian>()?,
            pos: r.read_f32::<LittleEndian>()?,
        });
    }
    Ok(dsq)
}
