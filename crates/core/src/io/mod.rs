//! Byte sources shared by every parser.

pub mod seekable;

pub use seekable::SeekableStream;
