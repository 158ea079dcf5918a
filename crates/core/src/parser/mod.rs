//! COS parsing modules.
//!
//! - `lexer`: elementary tokens (numbers, strings, names, keywords)
//! - `object_reader`: one full COS object at the current position
//! - `content`: content-stream tokenizer with inline-image support
//! - `offsets`: indirect-object offset lookup
//! - `signature`: signature byte-range extraction

pub mod content;
pub mod lexer;
pub mod object_reader;
pub mod offsets;
pub mod signature;

pub use content::{ContentTokenizer, ParseStep, TokenIter};
pub use lexer::{Lexer, Token};
pub use object_reader::ObjectReader;
pub use offsets::{ObjectOffsets, OffsetTable};
pub use signature::{ByteRange, SignatureRangeExtractor};
