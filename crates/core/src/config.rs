//! Reader tuning parameters.

/// Default size below which forward-only input is buffered in memory.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 10240;

/// Default size of bounded reads used when draining filters.
pub const DEFAULT_READ_CHUNK: usize = 2048;

/// Default limit on nested arrays and dictionaries.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;

/// Options shared by stream construction, signature extraction and decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Forward-only input shorter than this many bytes stays in memory;
    /// anything longer is spilled to an anonymous temporary file.
    pub buffer_threshold: usize,

    /// Size of each bounded read when copying input or draining a
    /// decryption filter.
    pub read_chunk: usize,

    /// Maximum number of indirect hops followed while resolving a
    /// signature's `/Contents` value.
    pub max_reference_depth: usize,

    /// Maximum number of arrays and dictionaries open at once while
    /// reading a single object.
    pub max_nesting_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
            read_chunk: DEFAULT_READ_CHUNK,
            max_reference_depth: 32,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ReaderOptions {
    pub fn with_buffer_threshold(mut self, threshold: usize) -> Self {
        self.buffer_threshold = threshold;
        self
    }

    /// A zero chunk size is bumped to one byte.
    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = chunk.max(1);
        self
    }

    pub fn with_max_reference_depth(mut self, depth: usize) -> Self {
        self.max_reference_depth = depth;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}
