//! All errors that can be returned by functions in this crate.

use thiserror::Error;

/// Location of a token inside the parsed text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    /// 1-based line number
    pub line: usize,
    /// byte offset from the start of the source
    pub offset: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} (byte {})", self.line, self.offset)
    }
}

/// Errors produced while turning MD5 or PROC text into typed structures.
///
/// Parse errors are fatal for the file being parsed; malformed input will not get better on retry.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The token stream ended where another token was required
    #[error("unexpected end of input at {at}: expected {expected}")]
    UnexpectedEndOfInput { expected: String, at: Location },
    /// A token could not be lexed or converted to the requested type
    #[error("malformed token `{text}` at {at}: {reason}")]
    MalformedToken {
        text: String,
        reason: String,
        at: Location,
    },
    /// A well-formed token that is not the one the grammar requires
    #[error("unexpected token `{found}` at {at}: expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        at: Location,
    },
    /// Declared counts or indices disagree with the actual content
    #[error("structural mismatch at {at}: {message}")]
    StructuralMismatch { message: String, at: Location },
    /// Missing or unrecognized format/version marker
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl ParseError {
    pub(crate) fn mismatch(message: impl Into<String>, at: Location) -> Self {
        ParseError::StructuralMismatch {
            message: message.into(),
            at,
        }
    }
}

pub type ParseResult<T> = ::std::result::Result<T, ParseError>;

/// Errors from driving an animation clip.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnimationError {
    #[error("no animation with index {0}")]
    NoSuchAnimation(usize),
    #[error("frame {frame} out of range, clip has {count} frames")]
    FrameOutOfRange { frame: usize, count: usize },
    #[error("animation has {anim} joints but the mesh has {mesh}")]
    JointCountMismatch { anim: usize, mesh: usize },
}

/// Errors while reading or writing baked binary files.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Serialization Error: {0}")]
    SerializationError(#[from] Box<bincode::ErrorKind>),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid baked data: {0}")]
    InvalidData(#[from] ParseError),
}

pub type FormatResult<T> = ::std::result::Result<T, FormatError>;

/// Errors from the asynchronous loading layer. Any of these fails the whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch `{path}`: {source}")]
    Fetch {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to decode image `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Animation(#[from] AnimationError),
}

pub type LoadResult<T> = ::std::result::Result<T, LoadError>;
