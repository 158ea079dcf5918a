//! COS data model.
//!
//! - `objects` - object sum type, strings, streams and object keys
//! - `operator` - content-stream operators and inline images

pub mod objects;
pub mod operator;

pub use objects::{CosObject, CosStream, CosString, Dict, Name, ObjectKey, RawReader, StreamData};
pub use operator::{InlineImage, Keyword, Operator};
