use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::TailCache;
use crate::error::{classify_io_error, LogFilesError, Result};
use crate::model::{FileHandle, FileRead, LineWindow, ReadOrder};
use crate::reader::{KeywordFilter, LineReader, ScannedLine};
use crate::scanner::{ByteLineScanner, BOUNDARY_SCAN_CHUNK_BYTES, MAX_LINE_CHUNK_BYTES};

/// Shape of a single-file read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Byte cursor to start from. `None` starts at the order's natural end.
    pub start: Option<u64>,
    /// `None` reads to the terminal boundary.
    pub max_lines: Option<usize>,
    pub order: ReadOrder,
    pub filter: KeywordFilter,
}

impl ReadRequest {
    pub fn whole_file(order: ReadOrder, filter: KeywordFilter) -> Self {
        Self {
            start: None,
            max_lines: None,
            order,
            filter,
        }
    }

    pub fn lines(max_lines: usize, order: ReadOrder, filter: KeywordFilter) -> Self {
        Self {
            start: None,
            max_lines: Some(max_lines),
            order,
            filter,
        }
    }

    pub fn lines_from(
        start: u64,
        max_lines: usize,
        order: ReadOrder,
        filter: KeywordFilter,
    ) -> Self {
        Self {
            start: Some(start),
            max_lines: Some(max_lines),
            order,
            filter,
        }
    }

    /// Only descending reads that begin at EOF go through the tail cache.
    fn is_tail_read(&self, start: u64, size: u64) -> bool {
        self.order == ReadOrder::Descending && start == size
    }
}

pub struct FileReadEngine {
    cache: Arc<TailCache>,
    host: String,
    scan_chunk: usize,
    max_line_chunk: usize,
}

impl FileReadEngine {
    pub fn new(cache: Arc<TailCache>, host: impl Into<String>) -> Self {
        Self {
            cache,
            host: host.into(),
            scan_chunk: BOUNDARY_SCAN_CHUNK_BYTES,
            max_line_chunk: MAX_LINE_CHUNK_BYTES,
        }
    }

    pub fn with_max_line_chunk(mut self, bytes: usize) -> Self {
        self.max_line_chunk = bytes.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<TailCache> {
        &self.cache
    }

    /// Reads one file. I/O failures are classified against the containing
    /// directory; a cursor past EOF or inside a line is an invalid parameter.
    pub fn read_file(&self, path: &Path, request: &ReadRequest) -> Result<FileRead> {
        let directory = containing_directory(path);
        let io_err = |err: std::io::Error| classify_io_error(&directory, path, &err);

        let mut scanner = self.open(path).map_err(io_err)?;
        let size = scanner.size();
        let start = request.start.unwrap_or_else(|| request.order.default_start(size));
        check_cursor(&mut scanner, path, start).map_err(|err| match err {
            CursorError::Invalid(err) => err,
            CursorError::Io(err) => io_err(err),
        })?;

        let window = if request.is_tail_read(start, size) {
            self.read_tail(path, &mut scanner, request).map_err(io_err)?
        } else {
            LineReader::new(request.order)
                .read(&mut scanner, start, request.max_lines, &request.filter)
                .map_err(io_err)?
                .into_window()
        };

        Ok(FileRead {
            file: FileHandle {
                host: self.host.clone(),
                path: absolute_display(path),
                size,
            },
            window,
        })
    }

    /// Checks that `start` is a usable cursor for `path` without reading any
    /// lines. Only a bad cursor is an error; a file that cannot be opened is
    /// left for the read itself to report.
    pub fn validate_cursor(&self, path: &Path, start: u64) -> Result<()> {
        let Ok(mut scanner) = self.open(path) else {
            return Ok(());
        };
        match check_cursor(&mut scanner, path, start) {
            Err(CursorError::Invalid(err)) => Err(err),
            Ok(()) | Err(CursorError::Io(_)) => Ok(()),
        }
    }

    fn open(&self, path: &Path) -> std::io::Result<ByteLineScanner<File>> {
        Ok(ByteLineScanner::open(path)?.with_limits(self.scan_chunk, self.max_line_chunk))
    }

    /// Serves a descending read from EOF: cached tail first, then disk from
    /// the entry's cursor for whatever the cache could not cover. The cache
    /// only grows from reads in which no line was filtered out, so every
    /// entry stays a contiguous unfiltered tail.
    fn read_tail(
        &self,
        path: &Path,
        scanner: &mut ByteLineScanner<File>,
        request: &ReadRequest,
    ) -> std::io::Result<LineWindow> {
        let size = scanner.size();
        self.cache.with_file(path, |slot| -> std::io::Result<LineWindow> {
            let cached = slot.take_front(request.max_lines, &request.filter);
            let resume = cached.resume.unwrap_or(size);
            let mut taken = cached.lines;

            if request.max_lines.is_some_and(|max| taken.len() >= max) {
                let cursor = taken.last().map_or(resume, |line| line.span.start);
                tracing::debug!(
                    path = %path.display(),
                    lines = taken.len(),
                    "tail read served from cache"
                );
                return Ok(window_of(taken, cursor));
            }

            let remaining = request.max_lines.map(|max| max - taken.len());
            let disk = LineReader::new(ReadOrder::Descending).read(
                scanner,
                resume,
                remaining,
                &request.filter,
            )?;
            tracing::debug!(
                path = %path.display(),
                cached = taken.len(),
                from_disk = disk.lines.len(),
                "tail read extended past cache"
            );

            if cached.filtered == 0 && disk.skipped == 0 {
                slot.extend(disk.lines.clone(), disk.cursor);
            }

            let cursor = disk.cursor;
            taken.extend(disk.lines);
            Ok(window_of(taken, cursor))
        })
    }
}

fn window_of(lines: Vec<ScannedLine>, cursor: u64) -> LineWindow {
    LineWindow {
        cursor,
        lines: lines.into_iter().map(|line| line.text).collect(),
    }
}

enum CursorError {
    Invalid(LogFilesError),
    Io(std::io::Error),
}

fn check_cursor(
    scanner: &mut ByteLineScanner<File>,
    path: &Path,
    start: u64,
) -> std::result::Result<(), CursorError> {
    let size = scanner.size();
    if start > size {
        return Err(CursorError::Invalid(LogFilesError::invalid(format!(
            "start_pos {start} is beyond the end of {} ({size} bytes)",
            path.display()
        ))));
    }
    if !scanner.is_boundary(start).map_err(CursorError::Io)? {
        return Err(CursorError::Invalid(LogFilesError::invalid(format!(
            "start_pos {start} is not on a line boundary"
        ))));
    }
    Ok(())
}

pub(crate) fn containing_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn absolute_display(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
