mod material;
mod mesh;
mod node;
mod primitive;
mod sequence;
mod shape;
mod string_table;

pub use material::*;
pub use mesh::*;
pub use node::*;
pub use primitive::*;
pub use sequence::*;
pub use shape::*;
pub use string_table::*;
