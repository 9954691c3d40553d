use std::{fmt, io, result};

use thiserror::Error as ThisError;

/// The reason why a field or a record could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatErrorKind {
    /// A field operation was attempted while the cursor was not sitting at a
    /// field boundary (window start, or right after a separator or an EOL).
    WrongFieldBegin,

    /// A quoted field was still open after too many line endings, or when
    /// reaching the end of the window.
    UnterminatedQuote,

    /// A field did not end on a separator, an EOL or the end of the window.
    MalformedField,

    /// A separator was required at the cursor position.
    ExpectedSeparator,

    /// A line ending was required at the cursor position.
    ExpectedEol,

    /// A record had a number of fields different from the detected one, and
    /// the reader was not allowed to pad it.
    UnequalLengths {
        /// Expected number of fields
        expected_len: usize,
        /// Actual and incorrect number of fields observed
        len: usize,
    },

    /// The record found right after detection does not agree with the
    /// detected dialect.
    InconsistentDetection,
}

impl fmt::Display for FormatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WrongFieldBegin => write!(f, "wrong field begin"),
            Self::UnterminatedQuote => write!(f, "unterminated quoted field"),
            Self::MalformedField => {
                write!(f, "field does not end on a separator or a line ending")
            }
            Self::ExpectedSeparator => write!(f, "expected a separator"),
            Self::ExpectedEol => write!(f, "expected a line ending"),
            Self::UnequalLengths { expected_len, len } => write!(
                f,
                "found record with {} fields, but {} fields were detected",
                len, expected_len
            ),
            Self::InconsistentDetection => {
                write!(f, "first record does not match the detected field count")
            }
        }
    }
}

/// The specific type of an error.
#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Wrap a [std::io::Error].
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The buffer starts with a UTF-16 byte order mark. Recoding the data to
    /// UTF-8 is up to the caller.
    #[error("data is encoded in UTF-16 (BOM {:02X} {:02X}), please recode it to UTF-8", .bom[0], .bom[1])]
    EncodingUnsupported {
        /// The two bytes of the mark
        bom: [u8; 2],
    },

    /// A `\r\r\n` sequence was met while detecting the line ending.
    #[error("line ending is \\r\\r\\n (byte: {pos})")]
    MalformedLineEnding {
        /// Byte offset of the first `\r`
        pos: usize,
    },

    /// No (separator, quote rule) pair produced a run of records having more
    /// than one field.
    #[error("could not detect separator and quote rule")]
    DetectionFailed,

    /// A field or a record could not be parsed.
    #[error("CSV error (byte: {pos}): {kind}")]
    Format {
        /// What went wrong
        kind: FormatErrorKind,
        /// Byte offset where it went wrong
        pos: usize,
    },

    /// The resynchronizer did not find a reliable record start within its
    /// attempt budget.
    #[error("could not find a record start after {attempts} attempts (last candidate byte: {pos})")]
    ResyncUnresolved {
        /// Last candidate position, where the cursor was left
        pos: usize,
        /// Number of attempts made
        attempts: usize,
    },

    /// Indicate that a reader was asked to move to a position that is out of
    /// bounds.
    #[error("pos {pos} is out of bounds (should be >= {start} and <= {end})")]
    OutOfBounds {
        /// Desired position
        pos: usize,
        /// Lower bound
        start: usize,
        /// Upper bound
        end: usize,
    },

    /// A textual option value could not be understood.
    #[error("unknown value {value:?} for option {name}")]
    UnknownOption {
        /// Name of the option
        name: &'static str,
        /// Rejected value
        value: String,
    },
}

/// An error occurring when opening or reading CSV data.
#[derive(Debug)]
pub struct Error(ErrorKind);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) fn format(kind: FormatErrorKind, pos: usize) -> Self {
        Self(ErrorKind::Format { kind, pos })
    }

    /// Return whether the wrapped error is a [`std::io::Error`].
    pub fn is_io_error(&self) -> bool {
        matches!(self.0, ErrorKind::Io(_))
    }

    /// Return whether the error is a [`ErrorKind::Format`] one, i.e. an
    /// error local to a single read call.
    pub fn is_format_error(&self) -> bool {
        matches!(self.0, ErrorKind::Format { .. })
    }

    /// Return a reference to the underlying [`ErrorKind`].
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwraps the error into its underlying [`ErrorKind`].
    pub fn into_kind(self) -> ErrorKind {
        self.0
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err.0 {
            ErrorKind::Io(inner) => inner,
            kind => Self::new(io::ErrorKind::InvalidData, Error(kind)),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.0 {
            ErrorKind::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A type alias for `Result<T, sniff_csv::Error>`.
pub type Result<T> = result::Result<T, Error>;
