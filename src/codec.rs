// Maps the shape model onto the stream format and back. All field order
// lives here.

mod dsq;
mod mesh;
mod shape;
mod trailer;

pub use dsq::{DsqFile, read_dsq, write_dsq};
pub use shape::{read_shape, read_shape_file, write_shape, write_shape_file};
