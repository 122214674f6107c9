use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Syntax { line: usize, kind: ParseErrorKind },
    #[error("Parse error near byte {position}: {kind}")]
    Markup { position: u64, kind: ParseErrorKind },
}

impl ParseError {
    pub(crate) fn at(line: usize, kind: ParseErrorKind) -> Self {
        Self::Syntax { line, kind }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Invalid integer for '{field}' (value: '{value}')")]
    InvalidInteger { field: String, value: String },
    #[error("Invalid float for '{field}' (value: '{value}')")]
    InvalidFloat { field: String, value: String },
    #[error("Invalid logical flag for '{field}' (value: '{value}')")]
    InvalidFlag { field: String, value: String },
    #[error("Expected {expected} values for '{field}', found {found}")]
    WrongValueCount {
        field: String,
        expected: String,
        found: usize,
    },
    #[error("Malformed Properties specification '{0}'")]
    MalformedProperties(String),
    #[error("Required column '{0}' is missing from Properties")]
    MissingColumn(&'static str),
    #[error("Atom line has {found} columns but Properties describes {expected}")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error("Unterminated quoted value for key '{0}'")]
    UnterminatedValue(String),
    #[error("Unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("Missing header record: {0}")]
    MissingHeader(&'static str),
    #[error("{titles} species titles but {counts} entries in 'ions per type'")]
    InconsistentSpecies { titles: usize, counts: usize },
    #[error("Expected {expected} atoms in '{field}', found {found}")]
    AtomCountMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Malformed XML: {0}")]
    MalformedXml(String),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to open output file '{path}': {source}", path = path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write frame {index}: {source}")]
    Frame {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("Failed to flush output: {0}")]
    Flush(#[source] io::Error),
}
