//! Line boundary search over a seekable byte source.
//!
//! The scanner never loads a whole file: boundary search reads one
//! direction-appropriate chunk at a time, and materializing a line reads its
//! span in refills of at most `max_line_chunk` bytes.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::model::ReadOrder;

const LINE_FEED: u8 = b'\n';

pub const BOUNDARY_SCAN_CHUNK_BYTES: usize = 8 * 1024;
pub const MAX_LINE_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Byte range `[start, end)` of one line, terminator included when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: u64,
    pub end: u64,
}

impl LineSpan {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Position a scan in `order` continues from once this line is consumed.
    pub fn resume(&self, order: ReadOrder) -> u64 {
        match order {
            ReadOrder::Ascending => self.end,
            ReadOrder::Descending => self.start,
        }
    }
}

pub struct ByteLineScanner<R> {
    source: R,
    size: u64,
    scan_chunk: usize,
    max_line_chunk: usize,
    chunk: Vec<u8>,
    line_buffer: Vec<u8>,
}

impl ByteLineScanner<File> {
    /// Opens `path` and snapshots its size. Anything that is not a regular
    /// file is refused here, so no half-built scanner escapes.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self::new(file, meta.len()))
    }
}

impl<R: Read + Seek> ByteLineScanner<R> {
    pub fn new(source: R, size: u64) -> Self {
        Self {
            source,
            size,
            scan_chunk: BOUNDARY_SCAN_CHUNK_BYTES,
            max_line_chunk: MAX_LINE_CHUNK_BYTES,
            chunk: Vec::new(),
            line_buffer: Vec::new(),
        }
    }

    pub fn with_limits(mut self, scan_chunk: usize, max_line_chunk: usize) -> Self {
        self.scan_chunk = scan_chunk.max(1);
        self.max_line_chunk = max_line_chunk.max(1);
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The line adjacent to `position` in `order`, or `None` at the terminal
    /// boundary (EOF ascending, BOF descending).
    pub fn find(&mut self, order: ReadOrder, position: u64) -> io::Result<Option<LineSpan>> {
        match order {
            ReadOrder::Ascending => self.next_line(position),
            ReadOrder::Descending => self.prev_line(position),
        }
    }

    /// Line starting at `position`. It ends just past the first line feed at
    /// or after `position`; a final line without a terminator ends at EOF.
    pub fn next_line(&mut self, position: u64) -> io::Result<Option<LineSpan>> {
        if position >= self.size {
            return Ok(None);
        }

        let mut offset = position;
        while offset < self.size {
            let want = (self.size - offset).min(self.scan_chunk as u64) as usize;
            self.fill_chunk(offset, want)?;
            if let Some(idx) = self.chunk.iter().position(|b| *b == LINE_FEED) {
                return Ok(Some(LineSpan {
                    start: position,
                    end: offset + idx as u64 + 1,
                }));
            }
            offset += want as u64;
        }

        Ok(Some(LineSpan {
            start: position,
            end: self.size,
        }))
    }

    /// Line ending at `position`. The byte just before `position` is the
    /// separator of that line (or its last byte when the file has no final
    /// terminator), so the search for the preceding line feed starts one byte
    /// further back. Reaching byte 0 means this is the first line of the file.
    pub fn prev_line(&mut self, position: u64) -> io::Result<Option<LineSpan>> {
        if position == 0 {
            return Ok(None);
        }
        let end = position.min(self.size);
        if end == 0 {
            return Ok(None);
        }

        let mut upper = end - 1;
        while upper > 0 {
            let want = upper.min(self.scan_chunk as u64) as usize;
            let offset = upper - want as u64;
            self.fill_chunk(offset, want)?;
            if let Some(idx) = self.chunk.iter().rposition(|b| *b == LINE_FEED) {
                return Ok(Some(LineSpan {
                    start: offset + idx as u64 + 1,
                    end,
                }));
            }
            upper = offset;
        }

        Ok(Some(LineSpan { start: 0, end }))
    }

    /// True when `position` sits at file start, file end, or just after a
    /// line feed.
    pub fn is_boundary(&mut self, position: u64) -> io::Result<bool> {
        if position == 0 || position == self.size {
            return Ok(true);
        }
        if position > self.size {
            return Ok(false);
        }
        self.fill_chunk(position - 1, 1)?;
        Ok(self.chunk.first() == Some(&LINE_FEED))
    }

    /// Streams the bytes of `span` to `sink`. Spans longer than the buffer cap
    /// arrive in several calls.
    pub fn read_span<F>(&mut self, span: LineSpan, mut sink: F) -> io::Result<()>
    where
        F: FnMut(&[u8]),
    {
        let mut offset = span.start;
        while offset < span.end {
            let want = (span.end - offset).min(self.max_line_chunk as u64) as usize;
            self.line_buffer.resize(want, 0);
            self.source.seek(SeekFrom::Start(offset))?;
            self.source.read_exact(&mut self.line_buffer)?;
            sink(&self.line_buffer);
            offset += want as u64;
        }
        Ok(())
    }

    /// Reads `span` into an owned buffer, terminator included.
    pub fn read_span_bytes(&mut self, span: LineSpan) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(span.len().min(self.max_line_chunk as u64) as usize);
        self.read_span(span, |bytes| out.extend_from_slice(bytes))?;
        Ok(out)
    }

    fn fill_chunk(&mut self, offset: u64, len: usize) -> io::Result<()> {
        self.chunk.resize(len, 0);
        self.source.seek(SeekFrom::Start(offset))?;
        self.source.read_exact(&mut self.chunk)
    }
}
