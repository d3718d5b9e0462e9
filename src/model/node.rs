use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: i32,
    pub parent: i32, // -1 means root
    // Link fields are rebuilt by `Shape::init`
    pub first_object: i32,
    pub first_child: i32,
    pub next_sibling: i32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: -1,
            parent: -1,
            first_object: -1,
            first_child: -1,
            next_sibling: -1,
        }
    }
}

impl Node {
    pub fn new(name: i32, parent: i32) -> Self {
        Self {
            name,
            parent,
            ..Self::default()
        }
    }
}

/// A renderable thing attached to a node, with one mesh per detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub name: i32,
    pub num_meshes: i32,
    pub first_mesh: i32,
    pub node: i32, // -1 means unattached
    pub sibling: i32,
    pub first_decal: i32,
}

impl Default for Object {
    fn default() -> Self {
        Self {
            name: -1,
            num_meshes: 0,
            first_mesh: 0,
            node: -1,
            sibling: -1,
            first_decal: -1,
        }
    }
}

impl Object {
    pub fn new(name: i32, num_meshes: i32, first_mesh: i32, node: i32) -> Self {
        Self {
            name,
            num_meshes,
            first_mesh,
            node,
            ..Self::default()
        }
    }

    pub fn mesh_range(&self) -> std::ops::Range<usize> {
        let start = self.first_mesh.max(0) as usize;
        start..start + self.num_meshes.max(0) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decal {
    pub name: i32,
    pub num_meshes: i32,
    pub first_mesh: i32,
    pub object: i32,
    pub sibling: i32,
}

impl Default for Decal {
    fn default() -> Self {
        Self {
            name: -1,
            num_meshes: 0,
            first_mesh: 0,
            object: -1,
            sibling: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubShape {
    pub first_node: i32,
    pub first_object: i32,
    pub first_decal: i32,
    pub num_nodes: i32,
    pub num_objects: i32,
    pub num_decals: i32,
}

impl SubShape {
    pub fn objects(&self) -> std::ops::Range<usize> {
        let start = self.first_object.max(0) as usize;
        start..start + self.num_objects.max(0) as usize
    }

    pub fn nodes(&self) -> std::ops::Range<usize> {
        let start = self.first_node.max(0) as usize;
        start..start + self.num_nodes.max(0) as usize
    }
}

/// Animated texture slot driven by an image file list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IflMaterial {
    pub name: i32,
    pub slot: i32, // material list index
    pub first_frame: i32,
    pub time: i32,
    pub num_frames: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub vis: f32,
    pub frame: i32,
    pub mat_frame: i32,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            vis: 1.0,
            frame: 0,
            mat_frame: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecalState {
    pub frame: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub state: u32,
    pub pos: f32,
}

impl Trigger {
    pub const STATE_ON: u32 = 1 << 31;
    pub const INVERT_ON_REVERSE: u32 = 1 << 30;
    pub const STATE_MASK: u32 = (1 << 30) - 1;

    /// Trigger numbers run 1..=32; anything else is kept but logged.
    pub fn new(number: u32, on: bool, pos: f32, invert_on_reverse: bool) -> Self {
        if !(1..=32).contains(&number) {
            warn!("invalid trigger state {number}, expected 1..=32");
        }
        let mut state = number;
        if on {
            state |= Self::STATE_ON;
        }
        if invert_on_reverse {
            state |= Self::INVERT_ON_REVERSE;
        }
        Self { state, pos }
    }

    pub fn number(&self) -> u32 {
        self.state & Self::STATE_MASK
    }

    pub fn is_on(&self) -> bool {
        self.state & Self::STATE_ON != 0
    }

    pub fn inverts_on_reverse(&self) -> bool {
        self.state & Self::INVERT_ON_REVERSE != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailLevel {
    pub name: i32,
    pub subshape: i32, // -1 means billboard
    pub object_detail: i32,
    pub size: f32, // negative means collision only
    pub avg_error: f32,
    pub max_error: f32,
    pub poly_count: i32,
}

impl Default for DetailLevel {
    fn default() -> Self {
        Self {
            name: -1,
            subshape: 0,
            object_detail: 0,
            size: 0.0,
            avg_error: -1.0,
            max_error: -1.0,
            poly_count: 0,
        }
    }
}

impl DetailLevel {
    pub fn is_billboard(&self) -> bool {
        self.subshape < 0
    }

    pub fn is_collision(&self) -> bool {
        self.size < 0.0
    }
}
