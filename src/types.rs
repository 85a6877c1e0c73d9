//! The set of valid values for FTP commands, and the crate error type

use std::fmt;
use std::io;

use serde::Deserialize;
use thiserror::Error;

use super::status;

/// A shorthand for a Result whose error type is always an FtpError.
pub type Result<T> = ::std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while using FTP.
#[derive(Debug, Error)]
pub enum FtpError {
    #[error("FTP ConnectionError: {0}")]
    ConnectionError(#[from] io::Error),
    #[error("FTP InvalidResponse: {0}")]
    InvalidResponse(String),
    #[error("FTP UnexpectedCode: expected {expected:?}, got response: {line}")]
    UnexpectedCode { expected: Vec<u32>, line: Line },
    #[error("FTP MalformedListing: {0:?}")]
    MalformedListing(String),
    #[error("FTP InvalidPath: {0}")]
    InvalidPath(String),
}

/// Coarse classification of a failure, independent of which call produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    DirectoryNotEmpty,
    MalformedListing,
    Other,
}

impl FtpError {
    /// The reply code the server answered with, if the error came from a reply.
    pub fn reply_code(&self) -> Option<u32> {
        match self {
            FtpError::UnexpectedCode { line, .. } => Some(line.0),
            _ => None,
        }
    }

    /// Classifies the error.
    ///
    /// Servers disagree on which codes mean what (the console server answers
    /// every failed DELE/RMD/MKD with a bare 553), so the reply text is
    /// consulted before the code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FtpError::MalformedListing(_) => ErrorKind::MalformedListing,
            FtpError::UnexpectedCode { line, .. } => {
                let text = line.1.to_ascii_lowercase();
                if text.contains("not empty") {
                    ErrorKind::DirectoryNotEmpty
                } else if text.contains("permission") || text.contains("denied") {
                    ErrorKind::PermissionDenied
                } else if text.contains("not found") || text.contains("no such") {
                    ErrorKind::NotFound
                } else {
                    match line.0 {
                        status::NOT_LOGGED_IN | status::STORING_NEED_ACCOUNT => ErrorKind::PermissionDenied,
                        status::REQUEST_FILE_ACTION_IGNORED | status::FILE_UNAVAILABLE => ErrorKind::NotFound,
                        _ => ErrorKind::Other,
                    }
                }
            }
            _ => ErrorKind::Other,
        }
    }
}

/// Text Format Control used in `TYPE` command
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatControl {
    /// Default text format control (is NonPrint)
    Default,
    /// Non-print (not destined for printing)
    NonPrint,
    /// Telnet format control (\<CR\>, \<FF\>, etc.)
    Telnet,
    /// ASA (Fortran) Carriage Control
    Asa,
}

/// File Type used in `TYPE` command
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileType {
    /// ASCII text (the argument is the text format control)
    Ascii(FormatControl),
    /// EBCDIC text (the argument is the text format control)
    Ebcdic(FormatControl),
    /// Image,
    Image,
    /// Binary (the synonym to Image)
    Binary,
    /// Local format (the argument is the number of bits in one byte on local machine)
    Local(u8),
}

/// How data connections are opened. Active is the default, since the
/// console server refuses `PASV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The client connects to the address the server hands out with `PASV`.
    Passive,
    /// The client listens and announces itself with `PORT`.
    Active,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Active
    }
}

/// `Line` contains a reply code and the text of the final line of the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(pub u32, pub String);

impl fmt::Display for FormatControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatControl::Default | FormatControl::NonPrint => f.write_str("N"),
            FormatControl::Telnet => f.write_str("T"),
            FormatControl::Asa => f.write_str("C"),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Ascii(fc) => write!(f, "A {}", fc),
            FileType::Ebcdic(fc) => write!(f, "E {}", fc),
            FileType::Image | FileType::Binary => f.write_str("I"),
            FileType::Local(bits) => write!(f, "L {}", bits),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.1)
    }
}
