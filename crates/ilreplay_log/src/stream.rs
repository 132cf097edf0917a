//! Line source for sequential log access.

use ilreplay_core::ReplayResult;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One physical log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based physical line number
    pub number: usize,
    /// Line text without the line terminator
    pub text: String,
}

/// Reads numbered lines from a log, skipping the recorder header
pub struct LineSource<R> {
    reader: R,
    number: usize,
    skip_header: bool,
    buf: String,
}

impl<R: BufRead> LineSource<R> {
    /// Read lines from `reader`; the first line is treated as the header
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            number: 0,
            skip_header: true,
            buf: String::new(),
        }
    }

    /// Whether the first line is skipped as the recorder header
    #[must_use]
    pub fn with_header_skip(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    /// Number of physical lines read so far, header included
    #[must_use]
    pub const fn lines_read(&self) -> usize {
        self.number
    }

    /// Read the next line
    ///
    /// # Errors
    ///
    /// Returns error if the reader fails or the line is not UTF-8
    pub fn next_line(&mut self) -> ReplayResult<Option<SourceLine>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.number += 1;

            if self.number == 1 && self.skip_header {
                tracing::trace!(header = %self.buf.trim_end(), "skipping log header");
                continue;
            }

            let text = self.buf.trim_end_matches(['\n', '\r']).to_string();
            return Ok(Some(SourceLine {
                number: self.number,
                text,
            }));
        }
    }

    /// Count the lines not yet read, consuming the source
    ///
    /// # Errors
    ///
    /// Returns error if the reader fails
    pub fn drain(mut self) -> ReplayResult<usize> {
        let mut count = 0;
        while self.next_line()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

impl LineSource<BufReader<File>> {
    /// Open a log file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened
    pub fn from_path(path: impl AsRef<Path>) -> ReplayResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = ReplayResult<SourceLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "ILBuilder recorder v1\nDef S3 \"3 [Add]\"\r\nB2 S3 V4 V5 V6\n";

    #[test]
    fn test_skips_header() {
        let mut source = LineSource::new(LOG.as_bytes());
        let first = source.next_line().unwrap().unwrap();
        assert_eq!(first.number, 2);
        assert_eq!(first.text, "Def S3 \"3 [Add]\"");
        let second = source.next_line().unwrap().unwrap();
        assert_eq!(second.number, 3);
        assert!(source.next_line().unwrap().is_none());
        assert_eq!(source.lines_read(), 3);
    }

    #[test]
    fn test_keep_header() {
        let mut source = LineSource::new(LOG.as_bytes()).with_header_skip(false);
        let first = source.next_line().unwrap().unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(first.text, "ILBuilder recorder v1");
    }

    #[test]
    fn test_iterator_and_drain() {
        let lines: Vec<_> = LineSource::new(LOG.as_bytes())
            .map(|l| l.unwrap().number)
            .collect();
        assert_eq!(lines, vec![2, 3]);

        let mut source = LineSource::new(LOG.as_bytes());
        source.next_line().unwrap();
        assert_eq!(source.drain().unwrap(), 1);
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut source = LineSource::new("header\nI0".as_bytes());
        assert_eq!(source.next_line().unwrap().unwrap().text, "I0");
        assert!(source.next_line().unwrap().is_none());
    }

    #[test]
    fn test_from_path_missing() {
        assert!(LineSource::from_path("/nonexistent/replay.log").is_err());
    }
}
