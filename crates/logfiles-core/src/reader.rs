use std::io::{self, Read, Seek};

use crate::model::{LineWindow, ReadOrder};
use crate::scanner::{ByteLineScanner, LineSpan};

/// Substring predicate applied to every decoded line. An empty keyword
/// matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    keyword: String,
}

impl KeywordFilter {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keyword.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.keyword
    }

    pub fn matches(&self, line: &str) -> bool {
        self.keyword.is_empty() || line.contains(self.keyword.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    pub text: String,
    pub span: LineSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub lines: Vec<ScannedLine>,
    pub cursor: u64,
    /// Lines the filter rejected on the way.
    pub skipped: usize,
}

impl ScanOutcome {
    pub fn into_window(self) -> LineWindow {
        LineWindow {
            cursor: self.cursor,
            lines: self.lines.into_iter().map(|line| line.text).collect(),
        }
    }
}

/// Drives a [`ByteLineScanner`] in one direction, collecting matching lines.
#[derive(Debug, Clone, Copy)]
pub struct LineReader {
    order: ReadOrder,
}

impl LineReader {
    pub fn new(order: ReadOrder) -> Self {
        Self { order }
    }

    /// Collects up to `max_lines` lines accepted by `filter`, starting at
    /// `start`. Rejected lines do not count against the budget. `None` reads
    /// until the terminal boundary.
    pub fn read<R: Read + Seek>(
        &self,
        scanner: &mut ByteLineScanner<R>,
        start: u64,
        max_lines: Option<usize>,
        filter: &KeywordFilter,
    ) -> io::Result<ScanOutcome> {
        let mut position = start;
        let mut lines = Vec::new();
        let mut skipped = 0;

        while max_lines.is_none_or(|max| lines.len() < max) {
            let Some(span) = scanner.find(self.order, position)? else {
                break;
            };
            position = span.resume(self.order);

            let text = decode_line(&scanner.read_span_bytes(span)?);
            if filter.matches(&text) {
                lines.push(ScannedLine { text, span });
            } else {
                skipped += 1;
            }
        }

        Ok(ScanOutcome {
            lines,
            cursor: position,
            skipped,
        })
    }
}

/// Strips the line terminator (`\n` or `\r\n`) and decodes lossily.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    let mut end = bytes.len();
    if end > 0 && bytes[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && bytes[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn scanner(content: &str) -> ByteLineScanner<Cursor<Vec<u8>>> {
        let bytes = content.as_bytes().to_vec();
        let size = bytes.len() as u64;
        ByteLineScanner::new(Cursor::new(bytes), size)
    }

    fn texts(outcome: &ScanOutcome) -> Vec<&str> {
        outcome.lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn keyword_skips_without_spending_budget() {
        let mut scanner = scanner("A\nX1\nB\nX2\nX3\n");
        let outcome = LineReader::new(ReadOrder::Ascending)
            .read(&mut scanner, 0, Some(2), &KeywordFilter::new("X"))
            .expect("read");
        assert_eq!(texts(&outcome), vec!["X1", "X2"]);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.cursor, 10);
    }

    #[test]
    fn descending_returns_last_line_first() {
        let mut scanner = scanner("one\ntwo\nthree\n");
        let outcome = LineReader::new(ReadOrder::Descending)
            .read(&mut scanner, 14, Some(2), &KeywordFilter::default())
            .expect("read");
        assert_eq!(texts(&outcome), vec!["three", "two"]);
        assert_eq!(outcome.cursor, 4);
    }

    #[test]
    fn unbounded_read_stops_at_terminal_boundary() {
        let mut scanner = scanner("one\ntwo\n");
        let outcome = LineReader::new(ReadOrder::Descending)
            .read(&mut scanner, 8, None, &KeywordFilter::default())
            .expect("read");
        assert_eq!(texts(&outcome), vec!["two", "one"]);
        assert_eq!(outcome.cursor, 0);
    }

    #[test]
    fn empty_file_keeps_cursor() {
        let mut scanner = scanner("");
        let outcome = LineReader::new(ReadOrder::Ascending)
            .read(&mut scanner, 0, Some(3), &KeywordFilter::default())
            .expect("read");
        assert!(outcome.lines.is_empty());
        assert_eq!(outcome.cursor, 0);
    }

    #[test]
    fn single_unterminated_line_reads_both_ways() {
        for order in [ReadOrder::Ascending, ReadOrder::Descending] {
            let mut scanner = scanner("only");
            let start = order.default_start(4);
            let outcome = LineReader::new(order)
                .read(&mut scanner, start, Some(5), &KeywordFilter::default())
                .expect("read");
            assert_eq!(texts(&outcome), vec!["only"], "{order:?}");
        }
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        assert_eq!(decode_line(b"line\r\n"), "line");
        assert_eq!(decode_line(b"line\n"), "line");
        assert_eq!(decode_line(b"line"), "line");
        assert_eq!(decode_line(b"\n"), "");
    }
}
