//! Error types for the carousel COS layer.

use std::io;
use thiserror::Error;

/// Primary error type for COS parsing and decryption.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("syntax error at offset {pos}: {msg}")]
    Syntax { pos: u64, msg: String },

    #[error("unexpected character {found:?} at offset {pos}, expected {expected:?}")]
    UnexpectedChar {
        pos: u64,
        expected: char,
        found: char,
    },

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("unexpected object at offset {pos}: expected {expected}, got {got}")]
    UnexpectedType {
        pos: u64,
        expected: &'static str,
        got: &'static str,
    },

    #[error("object {objid} {genno} not found in offset table")]
    ObjectNotFound { objid: u32, genno: u16 },

    #[error("reference cycle through offset {offset}")]
    ReferenceCycle { offset: u64 },

    #[error("indirect reference chain deeper than {depth}")]
    ReferenceDepth { depth: usize },

    #[error("stream handle is closed")]
    StreamClosed,

    #[error("security error: {0}")]
    Security(String),

    #[error("io error: {0}")]
    Io(#[source] io::Error),
}

impl PdfError {
    /// Malformed byte layout where a specific token was required.
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            Self::Syntax { .. } | Self::UnexpectedChar { .. } | Self::UnexpectedType { .. }
        )
    }

    /// Cryptographic failure, as opposed to a read or syntax failure.
    pub fn is_security_error(&self) -> bool {
        matches!(self, Self::Security(_))
    }

    pub(crate) fn syntax(pos: u64, msg: impl Into<String>) -> Self {
        Self::Syntax {
            pos,
            msg: msg.into(),
        }
    }

    /// Wrap into an `io::Error` so it can travel through `Read` adapters.
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Self::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

impl From<io::Error> for PdfError {
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<PdfError>()) {
            return Self::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<PdfError>()) {
            Some(Ok(inner)) => *inner,
            _ => Self::Security("decryption filter failed".into()),
        }
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
