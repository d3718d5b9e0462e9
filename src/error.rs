use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

pub type DtsResult<T> = Result<T, DtsError>;

/// Which side of the fence a failure sits on.
///
/// A corrupt or incompatible file is fixed by re-exporting it with a
/// compatible tool. A model invariant violation means the in-memory shape
/// (or the code that built it) is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    CorruptFile,
    ModelInvariant,
    Io,
}

#[derive(Debug, Error)]
pub enum DtsError {
    #[error("unsupported shape version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error(
        "checkpoint mismatch: expected {expected}, found {found8}/{found16}/{found32} (8/16/32-bit)"
    )]
    CheckpointMismatch {
        expected: u32,
        found8: u8,
        found16: u16,
        found32: u32,
    },

    #[error("malformed mesh type {0}")]
    MalformedMeshType(u32),

    #[error("{buffer} buffer exhausted: wanted {wanted}, {available} left")]
    UnexpectedEnd {
        buffer: &'static str,
        wanted: usize,
        available: usize,
    },

    #[error("invalid stream header: {0}")]
    InvalidHeader(String),

    #[error("name is not valid UTF-8: {0}")]
    InvalidText(#[from] FromUtf8Error),

    #[error("name of {len} bytes does not fit in {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("{what} index {index} out of range (len {len})")]
    ReferenceOutOfRange {
        what: &'static str,
        index: i64,
        len: usize,
    },

    #[error("node {0} is part of a parent cycle")]
    CyclicNode(usize),

    #[error("material {0} has a cyclic auxiliary map reference")]
    CyclicMaterial(usize),

    #[error("invalid mesh {index}: {reason}")]
    InvalidMesh { index: usize, reason: String },

    #[error("{0} vertices do not fit 16-bit indices")]
    TooManyVertices(usize),

    #[error("cannot sort a {0} mesh")]
    UnsortableMesh(&'static str),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("settings error: {0}")]
    Config(#[from] confy::ConfyError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DtsError {
    pub fn out_of_range(what: &'static str, index: impl Into<i64>, len: usize) -> Self {
        DtsError::ReferenceOutOfRange {
            what,
            index: index.into(),
            len,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DtsError::VersionMismatch { .. }
            | DtsError::CheckpointMismatch { .. }
            | DtsError::MalformedMeshType(_)
            | DtsError::UnexpectedEnd { .. }
            | DtsError::InvalidHeader(_)
            | DtsError::InvalidText(_) => ErrorClass::CorruptFile,
            DtsError::ReferenceOutOfRange { .. }
            | DtsError::CyclicNode(_)
            | DtsError::CyclicMaterial(_)
            | DtsError::InvalidMesh { .. }
            | DtsError::NameTooLong { .. }
            | DtsError::TooManyVertices(_)
            | DtsError::UnsortableMesh(_) => ErrorClass::ModelInvariant,
            DtsError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                ErrorClass::CorruptFile
            }
            DtsError::Io(_) | DtsError::Config(_) | DtsError::Json(_) => ErrorClass::Io,
        }
    }

    pub fn is_corrupt_file(&self) -> bool {
        self.class() == ErrorClass::CorruptFile
    }
}
