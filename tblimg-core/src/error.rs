use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("unsupported object file format (expected ELF or Mach-O)")]
    UnsupportedFormat,

    #[error("failed to parse {format} object: {source}")]
    Parse {
        format: &'static str,
        #[source]
        source: goblin::error::Error,
    },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no owning section for symbol {symbol}: {reason}")]
    SectionNotFound { symbol: String, reason: String },

    #[error("truncated table descriptor in {section} at offset {offset:#x}: {reason}")]
    TruncatedDescriptor {
        section: String,
        offset: u64,
        reason: String,
    },

    #[error(
        "payload range {start:#x}..{end:#x} for {symbol} is outside section {section} ({len} bytes)"
    )]
    PayloadOutOfRange {
        symbol: String,
        section: String,
        start: u64,
        end: u64,
        len: usize,
    },

    #[error("{field} is {len} bytes, does not fit its {width}-byte header field")]
    FieldOverflow {
        field: &'static str,
        len: usize,
        width: usize,
    },

    #[error("not a table image: {0}")]
    InvalidImage(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TableError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TableError> = std::result::Result<T, E>;
