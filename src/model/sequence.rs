use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceFlags {
    UniformScale = 0x0001,
    AlignedScale = 0x0002,
    ArbitraryScale = 0x0004,
    Blend = 0x0008,
    Cyclic = 0x0010,
    MakePath = 0x0020,
    IflInit = 0x0040,
    HasTranslucency = 0x0080,
}

impl SequenceFlags {
    const ALL: [Self; 8] = [
        Self::UniformScale,
        Self::AlignedScale,
        Self::ArbitraryScale,
        Self::Blend,
        Self::Cyclic,
        Self::MakePath,
        Self::IflInit,
        Self::HasTranslucency,
    ];

    pub fn from_bits(bits: u32) -> Vec<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|f| bits & *f as u32 != 0)
            .collect()
    }

    pub fn to_bits(flags: &[Self]) -> u32 {
        flags.iter().fold(0, |bits, f| bits | *f as u32)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UniformScale => "UniformScale",
            Self::AlignedScale => "AlignedScale",
            Self::ArbitraryScale => "ArbitraryScale",
            Self::Blend => "Blend",
            Self::Cyclic => "Cyclic",
            Self::MakePath => "MakePath",
            Self::IflInit => "IFLInit",
            Self::HasTranslucency => "HasTranslucency",
        }
    }
}

/// Node animation channel selector for `count_nodes` / `nodes_used`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeChannel {
    Rotation,
    Translation,
    Scale,
}

/// Which entities a sequence animates. Each set is positional: entry `i`
/// refers to node, decal, IFL material or object `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matters {
    pub rotation: Vec<bool>,
    pub translation: Vec<bool>,
    pub scale: Vec<bool>,
    pub decal: Vec<bool>,
    pub ifl: Vec<bool>,
    pub vis: Vec<bool>,
    pub frame: Vec<bool>,
    pub mat_frame: Vec<bool>,
}

impl Matters {
    /// All eight sets in wire order.
    pub fn sets(&self) -> [&Vec<bool>; 8] {
        [
            &self.rotation,
            &self.translation,
            &self.scale,
            &self.decal,
            &self.ifl,
            &self.vis,
            &self.frame,
            &self.mat_frame,
        ]
    }

    pub fn sets_mut(&mut self) -> [&mut Vec<bool>; 8] {
        [
            &mut self.rotation,
            &mut self.translation,
            &mut self.scale,
            &mut self.decal,
            &mut self.ifl,
            &mut self.vis,
            &mut self.frame,
            &mut self.mat_frame,
        ]
    }

    pub fn channel(&self, channel: NodeChannel) -> &[bool] {
        match channel {
            NodeChannel::Rotation => &self.rotation,
            NodeChannel::Translation => &self.translation,
            NodeChannel::Scale => &self.scale,
        }
    }

    /// Cut the node sets to `num_nodes`, the object sets to `num_objects`
    /// and so on. Loading yields whole 32-bit words of entries.
    pub fn truncate(&mut self, num_nodes: usize, num_decals: usize, num_ifls: usize, num_objects: usize) {
        self.rotation.resize(num_nodes, false);
        self.translation.resize(num_nodes, false);
        self.scale.resize(num_nodes, false);
        self.decal.resize(num_decals, false);
        self.ifl.resize(num_ifls, false);
        self.vis.resize(num_objects, false);
        self.frame.resize(num_objects, false);
        self.mat_frame.resize(num_objects, false);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name_index: i32,
    pub flags: u32,
    pub num_key_frames: i32,
    pub duration: f32,
    pub priority: i32,
    pub first_ground_frame: i32, // -1 means none
    pub num_ground_frames: i32,
    pub base_rotation: i32,
    pub base_translation: i32,
    pub base_scale: i32,
    pub base_object_state: i32,
    pub base_decal_state: i32,
    pub first_trigger: i32, // -1 means none
    pub num_triggers: i32,
    pub tool_begin: f32,
    pub matters: Matters,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            name_index: -1,
            flags: 0,
            num_key_frames: 0,
            duration: 0.0,
            priority: 0,
            first_ground_frame: -1,
            num_ground_frames: 0,
            base_rotation: -1,
            base_translation: -1,
            base_scale: -1,
            base_object_state: -1,
            base_decal_state: -1,
            first_trigger: -1,
            num_triggers: 0,
            tool_begin: 0.0,
            matters: Matters::default(),
        }
    }
}

impl Sequence {
    pub fn has_flag(&self, flag: SequenceFlags) -> bool {
        self.flags & flag as u32 != 0
    }

    pub fn is_cyclic(&self) -> bool {
        self.has_flag(SequenceFlags::Cyclic)
    }

    pub fn is_blend(&self) -> bool {
        self.has_flag(SequenceFlags::Blend)
    }

    pub fn animates_scale(&self) -> bool {
        self.flags
            & (SequenceFlags::UniformScale as u32
                | SequenceFlags::AlignedScale as u32
                | SequenceFlags::ArbitraryScale as u32)
            != 0
    }

    /// Nodes animated on one channel, or on any channel for `None`.
    pub fn count_nodes(&self, channel: Option<NodeChannel>) -> usize {
        match channel {
            Some(c) => self.matters.channel(c).iter().filter(|m| **m).count(),
            None => {
                let m = &self.matters;
                (0..m.rotation.len())
                    .filter(|&n| {
                        m.rotation[n]
                            || m.translation.get(n).copied().unwrap_or(false)
                            || m.scale.get(n).copied().unwrap_or(false)
                    })
                    .count()
            }
        }
    }

    /// Indices of animated nodes. For `None` this is the union in
    /// rotation, translation, scale order, each index listed once.
    pub fn nodes_used(&self, channel: Option<NodeChannel>) -> Vec<usize> {
        let collect = |set: &[bool], out: &mut Vec<usize>| {
            for (n, _) in set.iter().enumerate().filter(|(_, m)| **m) {
                if !out.contains(&n) {
                    out.push(n);
                }
            }
        };
        let mut nodes = Vec::new();
        match channel {
            Some(c) => collect(self.matters.channel(c), &mut nodes),
            None => {
                collect(&self.matters.rotation, &mut nodes);
                collect(&self.matters.translation, &mut nodes);
                collect(&self.matters.scale, &mut nodes);
            }
        }
        nodes
    }

    /// Reduce a matters set to one `true` per animated entry.
    pub fn clear_matters(set: &mut Vec<bool>) {
        let used = set.iter().filter(|m| **m).count();
        set.clear();
        set.resize(used, true);
    }
}
