//! Reference-counted seekable byte streams.
//!
//! A [`SeekableStream`] is a cursor over a window of a shared physical
//! resource (an in-memory buffer or a file). Every handle owns its own
//! cursor; handles created with [`SeekableStream::substream`] or
//! [`SeekableStream::share`] add one unit to the resource's use count, and
//! [`SeekableStream::close`] (or dropping the handle) removes it. The
//! resource is released exactly once, when the last unit goes away.

use crate::config::ReaderOptions;
use crate::error::{PdfError, Result};
use bytes::Bytes;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

/// Read-ahead window size for file-backed handles.
const FILE_WINDOW: usize = 4096;

enum Backing {
    Memory(Bytes),
    File(RefCell<File>),
}

/// The physical resource behind one or more handles.
struct Resource {
    backing: RefCell<Option<Backing>>,
    users: Cell<usize>,
    len: u64,
}

impl Resource {
    fn new(backing: Backing, len: u64) -> Rc<Self> {
        Rc::new(Self {
            backing: RefCell::new(Some(backing)),
            users: Cell::new(1),
            len,
        })
    }

    fn acquire(&self) -> Result<()> {
        let users = self.users.get();
        if users == 0 {
            return Err(PdfError::StreamClosed);
        }
        self.users.set(users + 1);
        Ok(())
    }

    fn release(&self) {
        let users = self.users.get();
        if users == 0 {
            return;
        }
        self.users.set(users - 1);
        if users == 1 {
            self.backing.borrow_mut().take();
            tracing::trace!(len = self.len, "released stream resource");
        }
    }

    fn is_file(&self) -> bool {
        matches!(self.backing.borrow().as_ref(), Some(Backing::File(_)))
    }

    /// Fill `buf` from absolute position `pos`, returning the bytes copied.
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let backing = self.backing.borrow();
        match backing.as_ref() {
            None => Err(PdfError::StreamClosed),
            Some(Backing::Memory(data)) => {
                let start = (pos as usize).min(data.len());
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                Ok(n)
            }
            Some(Backing::File(file)) => {
                let mut file = file.borrow_mut();
                file.seek(SeekFrom::Start(pos))?;
                let mut filled = 0;
                while filled < buf.len() {
                    match file.read(&mut buf[filled..]) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                Ok(filled)
            }
        }
    }
}

/// Per-handle read-ahead for file-backed resources.
#[derive(Default)]
struct Window {
    start: u64,
    data: Vec<u8>,
}

impl Window {
    fn get(&self, abs: u64) -> Option<&[u8]> {
        let rel = abs.checked_sub(self.start)? as usize;
        (rel < self.data.len()).then(|| &self.data[rel..])
    }
}

/// A seekable, peekable cursor over a shared byte resource.
pub struct SeekableStream {
    resource: Rc<Resource>,
    start: u64,
    len: u64,
    pos: u64,
    closed: bool,
    window: Window,
}

impl SeekableStream {
    fn from_resource(resource: Rc<Resource>, start: u64, len: u64) -> Self {
        Self {
            resource,
            start,
            len,
            pos: 0,
            closed: false,
            window: Window::default(),
        }
    }

    /// Memory-backed stream over `data`.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self::from_resource(Resource::new(Backing::Memory(data), len), 0, len)
    }

    /// File-backed stream over an open file.
    pub fn from_file(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self::from_resource(
            Resource::new(Backing::File(RefCell::new(file)), len),
            0,
            len,
        ))
    }

    /// Open `path` as a file-backed stream.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Turn forward-only input into a seekable stream.
    ///
    /// Input is buffered in memory while fewer than
    /// `options.buffer_threshold` bytes have been read. Once the threshold is
    /// reached the buffered prefix and the rest of the input are copied into
    /// an anonymous temporary file.
    pub fn from_reader<R: Read>(mut reader: R, options: &ReaderOptions) -> Result<Self> {
        let mut buffer = Vec::new();
        let mut chunk = vec![0u8; options.read_chunk.max(1)];
        while buffer.len() < options.buffer_threshold {
            let n = match reader.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if n == 0 {
                return Ok(Self::from_bytes(buffer));
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        let mut spill = tempfile::tempfile()?;
        spill.write_all(&buffer)?;
        let copied = io::copy(&mut reader, &mut spill)?;
        tracing::debug!(
            buffered = buffer.len(),
            copied,
            "input exceeded buffer threshold, spilled to temporary file"
        );
        spill.flush()?;
        Self::from_file(spill)
    }

    /// Current offset relative to the start of this handle's window.
    pub fn offset(&self) -> u64 {
        self.pos
    }

    /// Length of this handle's window.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.len
    }

    /// Move the cursor to `offset`. Offsets past the end are a caller error;
    /// reads from there report end of input.
    pub fn seek(&mut self, offset: u64) {
        self.pos = offset;
    }

    /// Move the cursor by `delta` bytes, clamping at zero.
    pub fn seek_relative(&mut self, delta: i64) {
        self.pos = self.pos.saturating_add_signed(delta);
    }

    /// Position the cursor `back` bytes before the end.
    pub fn seek_from_end(&mut self, back: u64) {
        self.pos = self.len.saturating_sub(back);
    }

    /// Rewind by one byte.
    pub fn unread(&mut self) {
        self.unread_by(1);
    }

    pub fn unread_by(&mut self, n: u64) {
        self.pos = self.pos.saturating_sub(n);
    }

    /// Advance by up to `n` bytes, returning how far the cursor moved.
    pub fn skip(&mut self, n: u64) -> u64 {
        let moved = n.min(self.len.saturating_sub(self.pos));
        self.pos += moved;
        moved
    }

    /// Next byte without advancing, `None` at end of input.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if self.pos >= self.len {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        let n = self.fetch(self.start + self.pos, &mut byte)?;
        Ok((n == 1).then_some(byte[0]))
    }

    /// Next byte, `None` at end of input.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Next byte, failing with [`PdfError::UnexpectedEof`] at end of input.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.next_byte()?.ok_or(PdfError::UnexpectedEof)
    }

    /// Read up to `buf.len()` bytes; returns 0 at end of input.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let n = self.fetch(self.start + self.pos, &mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Everything from the cursor to the end of the window.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len.saturating_sub(self.pos) as usize);
        let mut chunk = [0u8; FILE_WINDOW];
        loop {
            let n = self.read_into(&mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Independent reader over `[start, start + len)` of this handle's
    /// window. The request is clamped to the window.
    pub fn substream(&self, start: u64, len: u64) -> Result<SeekableStream> {
        if self.closed {
            return Err(PdfError::StreamClosed);
        }
        self.resource.acquire()?;
        let start = start.min(self.len);
        let len = len.min(self.len - start);
        Ok(Self::from_resource(
            Rc::clone(&self.resource),
            self.start + start,
            len,
        ))
    }

    /// New handle over the same window with its own cursor at the same
    /// position.
    pub fn share(&self) -> Result<SeekableStream> {
        let mut shared = self.substream(0, self.len)?;
        shared.pos = self.pos;
        Ok(shared)
    }

    /// Give this handle's unit of the use count back. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.window = Window::default();
        self.resource.release();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of open handles on the underlying resource.
    pub fn resource_users(&self) -> usize {
        self.resource.users.get()
    }

    /// Whether the underlying resource has been released.
    pub fn is_released(&self) -> bool {
        self.resource.backing.borrow().is_none()
    }

    pub fn is_file_backed(&self) -> bool {
        self.resource.is_file()
    }

    /// Whether both handles read the same bytes of the same resource.
    pub fn same_window(&self, other: &SeekableStream) -> bool {
        Rc::ptr_eq(&self.resource, &other.resource)
            && self.start == other.start
            && self.len == other.len
    }

    fn fetch(&mut self, abs: u64, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(PdfError::StreamClosed);
        }
        if !self.resource.is_file() {
            return self.resource.read_at(abs, buf);
        }
        if self.window.get(abs).is_none() {
            let end = (self.start + self.len).min(self.resource.len);
            let size = FILE_WINDOW.max(buf.len()).min(end.saturating_sub(abs) as usize);
            let mut data = vec![0u8; size];
            let n = self.resource.read_at(abs, &mut data)?;
            data.truncate(n);
            self.window = Window { start: abs, data };
        }
        let Some(cached) = self.window.get(abs) else {
            return Ok(0);
        };
        let n = buf.len().min(cached.len());
        buf[..n].copy_from_slice(&cached[..n]);
        Ok(n)
    }
}

impl Clone for SeekableStream {
    /// Shares the resource. Cloning a closed handle yields another closed
    /// handle.
    fn clone(&self) -> Self {
        match self.share() {
            Ok(shared) => shared,
            Err(_) => Self {
                resource: Rc::clone(&self.resource),
                start: self.start,
                len: self.len,
                pos: self.pos,
                closed: true,
                window: Window::default(),
            },
        }
    }
}

impl Drop for SeekableStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl PartialEq for SeekableStream {
    fn eq(&self, other: &Self) -> bool {
        self.same_window(other)
    }
}

impl fmt::Debug for SeekableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekableStream")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("closed", &self.closed)
            .field("users", &self.resource.users.get())
            .finish()
    }
}

impl Read for SeekableStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(PdfError::into_io)
    }
}

impl Seek for SeekableStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        self.pos = target;
        Ok(target)
    }
}
