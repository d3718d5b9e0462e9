use std::fmt;

use crate::model::{Mesh, Sequence, Shape};

/// Human-readable overview of a shape: node tree, objects, materials,
/// detail levels and sequences.
pub struct ShapeSummary<'a>(pub &'a Shape);

impl ShapeSummary<'_> {
    fn node(&self, f: &mut fmt::Formatter<'_>, node: usize, depth: usize) -> fmt::Result {
        let shape = self.0;
        let n = &shape.nodes[node];
        writeln!(
            f,
            "{:indent$}{} (parent {})",
            "",
            shape.name_of(n.name),
            n.parent,
            indent = 4 + depth * 2
        )?;
        // Guard against malformed parent chains
        if depth > shape.nodes.len() {
            return Ok(());
        }
        for (child, c) in shape.nodes.iter().enumerate() {
            if c.parent == node as i32 {
                self.node(f, child, depth + 1)?;
            }
        }
        Ok(())
    }
}

fn mesh_label(mesh: &Mesh) -> String {
    let kind = mesh.kind().name();
    match mesh.sorted() {
        Some(s) => format!("{kind}[{}]", s.clusters.len()),
        None => kind.to_string(),
    }
}

fn channels(seq: &Sequence) -> Vec<&'static str> {
    let m = &seq.matters;
    let any = |set: &[bool]| set.iter().any(|b| *b);
    let mut out = Vec::new();
    if any(&m.ifl) {
        out.push("ifl");
    }
    if any(&m.vis) {
        out.push("vis");
    }
    if any(&m.translation) {
        out.push("loc");
    }
    if any(&m.rotation) {
        out.push("rot");
    }
    if any(&m.scale) {
        out.push("scale");
    }
    if seq.num_ground_frames > 0 {
        out.push("ground");
    }
    out
}

impl fmt::Display for ShapeSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.0;

        writeln!(f, "  > Nodes ({})", shape.nodes.len())?;
        for (i, n) in shape.nodes.iter().enumerate() {
            if n.parent < 0 {
                self.node(f, i, 0)?;
            }
        }

        writeln!(f, "  > Objects ({})", shape.objects.len())?;
        for o in &shape.objects {
            let kinds: Vec<String> = o
                .mesh_range()
                .filter_map(|m| shape.meshes.get(m))
                .map(mesh_label)
                .collect();
            writeln!(f, "    '{}' : {}", shape.name_of(o.name), kinds.join(" "))?;
        }

        writeln!(f, "  > Materials ({})", shape.materials.len())?;
        for m in shape.materials.iter() {
            let flags: Vec<&str> = crate::model::MaterialFlags::from_bits(m.flags)
                .iter()
                .map(|fl| fl.name())
                .collect();
            writeln!(f, "    {} [{}]", m.name, flags.join(", "))?;
        }

        writeln!(f, "  > Detail levels ({})", shape.detail_levels.len())?;
        for d in &shape.detail_levels {
            writeln!(
                f,
                "    {} (size: {}, polys: {})",
                shape.name_of(d.name),
                d.size as i32,
                d.poly_count
            )?;
        }
        if let Some(d) = shape.detail_levels.get(shape.smallest_visible_dl.max(0) as usize) {
            writeln!(
                f,
                "    smallest: {} (size: {})",
                shape.name_of(d.name),
                shape.smallest_visible_size
            )?;
        }

        writeln!(f, "  > Sequences ({})", shape.sequences.len())?;
        for seq in &shape.sequences {
            writeln!(f, "    - {}", shape.name_of(seq.name_index))?;
            writeln!(f, "      animates: {}", channels(seq).join(" "))?;
            writeln!(
                f,
                "      frames: {}, ground frames: {}, triggers: {}",
                seq.num_key_frames, seq.num_ground_frames, seq.num_triggers
            )?;
        }

        writeln!(
            f,
            "  radius {:.3}, tube radius {:.3}, center ({:.3}, {:.3}, {:.3})",
            shape.radius, shape.tube_radius, shape.center.x, shape.center.y, shape.center.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Material, MaterialFlags, Node};

    #[test]
    fn tree_and_channels_are_listed() {
        let mut shape = Shape::new();
        let root = shape.names.add("root");
        let arm = shape.names.add("arm");
        shape.nodes.push(Node::new(root, -1));
        shape.nodes.push(Node::new(arm, 0));
        shape
            .materials
            .add(Material::new("glass", MaterialFlags::Translucent as u32));

        let mut seq = Sequence::default();
        seq.name_index = shape.names.add("wave");
        seq.matters.rotation = vec![false, true];
        seq.num_key_frames = 8;
        shape.sequences.push(seq);

        let text = ShapeSummary(&shape).to_string();
        assert!(text.contains("    root (parent -1)\n      arm (parent 0)"));
        assert!(text.contains("glass [Translucent]"));
        assert!(text.contains("animates: rot\n"));
        assert!(text.contains("frames: 8"));
    }
}
