use super::error::ParseError;
use crate::core::models::frame::Frame;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading trajectory file formats.
///
/// Implementors expose a lazy reader that yields frames in file order. After a
/// malformed record the reader yields the error once and then ends, so every
/// frame preceding the damage is still delivered to the caller.
pub trait TrajectoryFile {
    /// The frame iterator produced for a buffered source.
    type Reader<R: BufRead>: Iterator<Item = Result<Frame, ParseError>>;

    /// Wraps a buffered reader positioned at the start of a trajectory.
    fn reader<R: BufRead>(reader: R) -> Self::Reader<R>;

    /// Opens a trajectory file for lazy reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    fn open<P: AsRef<Path>>(path: P) -> Result<Self::Reader<BufReader<File>>, ParseError> {
        let file = File::open(path)?;
        Ok(Self::reader(BufReader::new(file)))
    }
}

/// Cap on per-frame preallocation; atom counts are read from untrusted input.
pub(crate) const PREALLOCATION_LIMIT: usize = 4096;

/// Line cursor shared by the text readers; tracks 1-based line numbers.
pub(crate) struct LineReader<R> {
    inner: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// Returns the next line without its terminator, or `None` at end of file.
    pub(crate) fn next_line(&mut self) -> Result<Option<(usize, &str)>, ParseError> {
        self.buf.clear();
        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some((self.line_no, self.buf.trim_end_matches(['\n', '\r']))))
    }

    /// Like [`next_line`](Self::next_line) but treats end of file as a parse error.
    pub(crate) fn expect_line(
        &mut self,
        context: &'static str,
    ) -> Result<(usize, &str), ParseError> {
        let eof_line = self.line_no + 1;
        self.next_line()?.ok_or_else(|| {
            ParseError::at(
                eof_line,
                super::error::ParseErrorKind::UnexpectedEof(context),
            )
        })
    }
}
