// The shape container format: three word-size segregated buffers behind a
// small header, followed by a sequential trailer.

mod buffers;
mod header;
mod sequential;

pub use buffers::{DtsStream, StreamValue};
pub use header::{DTS_VERSION, StreamHeader};
pub use sequential::{
    read_integer_set, read_point3, read_quat16, read_string8, read_string32, write_integer_set,
    write_point3, write_quat16, write_string8, write_string32,
};
