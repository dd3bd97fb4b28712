//! The set of valid values for FTP commands, session states and errors.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::reply::Reply;

/// A shorthand for a Result whose error type is always an FtpError.
pub type Result<T> = ::std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while using FTP.
#[derive(Debug, Error)]
pub enum FtpError {
    #[error("can't translate host name {host} to an address: {source}")]
    Resolve { host: String, source: io::Error },
    #[error("can't connect to remote server {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("FTP ConnectionError: {0}")]
    ConnectionError(io::Error),
    #[error("data connection to {addr} failed: {source}")]
    DataConnection { addr: String, source: io::Error },
    #[error("unexpected reply: {0}")]
    UnexpectedReply(Reply),
    #[error("unrecognized reply: {0:?}")]
    UnrecognizedReply(String),
    #[error("no complete reply line after {attempts} reads")]
    Framing { attempts: usize },
    #[error("invalid passive address: {0}")]
    InvalidAddress(String),
    #[error("FTP InvalidResponse: {0}")]
    InvalidResponse(String),
    #[error("not connected")]
    NotConnected,
    #[error("local I/O error: {0}")]
    LocalIo(io::Error),
}

impl FtpError {
    /// The rejected reply, when this is a protocol error.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            FtpError::UnexpectedReply(reply) => Some(reply),
            _ => None,
        }
    }

    /// Whether the control connection must be considered gone.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            FtpError::ConnectionError(err) => is_connection_loss(err),
            _ => false,
        }
    }
}

/// Classify a control-socket fault as a loss of the connection.
pub fn is_connection_loss(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::OutOfMemory
            | io::ErrorKind::UnexpectedEof
    )
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    LoggingIn,
    Ready,
    Busy,
    Transferring,
}

impl ConnectionState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ConnectionState::NotConnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::LoggingIn => 2,
            ConnectionState::Ready => 3,
            ConnectionState::Busy => 4,
            ConnectionState::Transferring => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> ConnectionState {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::LoggingIn,
            3 => ConnectionState::Ready,
            4 => ConnectionState::Busy,
            5 => ConnectionState::Transferring,
            _ => ConnectionState::NotConnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::LoggingIn => "logging in",
            ConnectionState::Ready => "ready",
            ConnectionState::Busy => "busy",
            ConnectionState::Transferring => "transferring",
        };
        f.write_str(name)
    }
}

/// Notifications delivered to subscribers of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Login completed; the session is about to become ready.
    Opened,
    /// The control connection is going away.
    Closed,
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

impl fmt::Display for FormatControl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatControl::Default | FormatControl::NonPrint => f.write_str("N"),
            FormatControl::Telnet => f.write_str("T"),
            FormatControl::Asa => f.write_str("C"),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileType::Ascii(fc) => write!(f, "A {}", fc),
            FileType::Ebcdic(fc) => write!(f, "E {}", fc),
            FileType::Image | FileType::Binary => f.write_str("I"),
            FileType::Local(bits) => write!(f, "L {}", bits),
        }
    }
}
