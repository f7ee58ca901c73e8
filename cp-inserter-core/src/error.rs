use std::path::PathBuf;

/// Per-file failure. Each variant aborts the file it occurred in and
/// nothing else.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{action} {}: {source}", path.display())]
    Io {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error in {}: {source}", path.display())]
    OutOfRangeEdit {
        path: PathBuf,
        #[source]
        source: EditOutOfRange,
    },
}

impl InstrumentError {
    pub fn io(path: impl Into<PathBuf>, action: &'static str, source: std::io::Error) -> Self {
        InstrumentError::Io {
            path: path.into(),
            action,
            source,
        }
    }

    /// The file the error belongs to
    pub fn path(&self) -> &std::path::Path {
        match self {
            InstrumentError::Parse { path, .. }
            | InstrumentError::Io { path, .. }
            | InstrumentError::OutOfRangeEdit { path, .. } => path,
        }
    }
}

/// An edit offset outside the part of the buffer still open for insertion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("edit offset {offset} outside [{lower}, {upper}]")]
pub struct EditOutOfRange {
    pub offset: usize,
    pub lower: usize,
    pub upper: usize,
}
