//! Byte-range inputs over a stream of encoded records.
//!
//! [`IndexInput`] is the sequential seek-then-read interface every scorer
//! can use. [`SegmentAccess`] additionally exposes zero-copy views of
//! contiguous ranges; an input answers `None` when the range is not backed
//! by a single contiguous mapping and the caller falls back to reading.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

pub trait IndexInput {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor position.
    fn position(&self) -> u64;

    fn seek(&mut self, pos: u64) -> io::Result<()>;

    /// Fills `buf` completely from the cursor and advances it.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()>;

    fn read_f32_le(&mut self) -> io::Result<f32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
}

pub trait SegmentAccess: IndexInput {
    /// Zero-copy view of `[offset, offset + len)`, if one contiguous mapping covers it.
    fn segment_slice(&self, offset: u64, len: u64) -> Option<&[u8]>;
}

fn seek_past_end(pos: u64, len: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("seek to {pos} past end of input ({len} bytes)"),
    )
}

// ── Memory ────────────────────────────────────────────────────────────────────

/// Fully resident records, shared read-only between scorers.
#[derive(Clone, Debug)]
pub struct MemoryInput {
    data: Arc<[u8]>,
    pos: u64,
}

impl MemoryInput {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }
}

impl IndexInput for MemoryInput {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.len() {
            return Err(seek_past_end(pos, self.len()));
        }
        self.pos = pos;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let start = self.pos as usize;
        let src = self
            .data
            .get(start..start + buf.len())
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        buf.copy_from_slice(src);
        self.pos += buf.len() as u64;
        Ok(())
    }
}

impl SegmentAccess for MemoryInput {
    fn segment_slice(&self, offset: u64, len: u64) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.data.get(offset as usize..end as usize)
    }
}

// ── File ──────────────────────────────────────────────────────────────────────

/// Buffered reads from a file. Never offers segments.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    len: u64,
    pos: u64,
}

impl FileInput {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            len,
            pos: 0,
        })
    }
}

impl IndexInput for FileInput {
    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.len {
            return Err(seek_past_end(pos, self.len));
        }
        // Relative seeks keep the buffer when the target is already loaded.
        self.reader.seek_relative(pos as i64 - self.pos as i64)?;
        self.pos = pos;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if let Err(e) = self.reader.read_exact(buf) {
            // The cursor is unknown after a short read; the read error wins.
            if let Ok(pos) = self.reader.stream_position() {
                self.pos = pos;
            }
            return Err(e);
        }
        self.pos += buf.len() as u64;
        Ok(())
    }
}

impl SegmentAccess for FileInput {
    fn segment_slice(&self, _offset: u64, _len: u64) -> Option<&[u8]> {
        None
    }
}

// ── Paged ─────────────────────────────────────────────────────────────────────

/// Memory split into fixed-size pages, like a file mapped in several chunks.
///
/// A segment is only available when it lies within one page. Segments can
/// also be disabled outright, which forces every caller onto its read path.
#[derive(Clone, Debug)]
pub struct PagedInput {
    inner: MemoryInput,
    page_size: u64,
    segments_enabled: bool,
}

impl PagedInput {
    pub fn new(data: impl Into<Arc<[u8]>>, page_size: u64) -> Self {
        Self {
            inner: MemoryInput::new(data),
            page_size: page_size.max(1),
            segments_enabled: true,
        }
    }

    pub fn without_segments(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            inner: MemoryInput::new(data),
            page_size: u64::MAX,
            segments_enabled: false,
        }
    }

    pub fn set_segments_enabled(&mut self, enabled: bool) {
        self.segments_enabled = enabled;
    }
}

impl IndexInput for PagedInput {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(pos)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_bytes(buf)
    }
}

impl SegmentAccess for PagedInput {
    fn segment_slice(&self, offset: u64, len: u64) -> Option<&[u8]> {
        if !self.segments_enabled {
            return None;
        }
        if len > 0 && offset / self.page_size != (offset + len - 1) / self.page_size {
            return None;
        }
        self.inner.segment_slice(offset, len)
    }
}
