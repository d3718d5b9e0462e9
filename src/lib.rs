//! Reader, writer and geometry tools for the DTS "Shape" model format.
//!
//! The file body is three width-segregated word buffers guarded by
//! checkpoints ([`stream`]); [`codec`] replays the fixed field order of the
//! [`model::Shape`] aggregate through them. [`strip`] and [`sort`] rework
//! mesh primitives before export, and [`builder`] is the entry point used by
//! exporters that assemble a shape from scratch.

pub mod builder;
pub mod codec;
pub mod error;
pub mod math;
pub mod model;
pub mod settings;
pub mod sort;
pub mod stream;
pub mod strip;
pub mod summary;

pub use builder::ShapeBuilder;
pub use codec::{read_shape, write_shape};
pub use error::{DtsError, DtsResult, ErrorClass};
pub use model::Shape;

pub const CONFY_APP_NAME: &str = "dts-rs";
