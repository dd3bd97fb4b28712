//! Server replies and the reader that frames them out of the control stream.

use std::convert::TryFrom;
use std::fmt;
use std::io::Read;

use crate::status::Status;
use crate::types::{FtpError, Result};

/// Size of the buffer used for every socket read.
pub const BLOCK_SIZE: usize = 512;

/// Reads allowed before giving up on a terminal reply line.
pub const MAX_READ_ATTEMPTS: usize = 25;

/// One complete server reply line: `NNN text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    status: Status,
    line: String,
}

impl Reply {
    /// Parse a terminal reply line. The code must be three digits known to
    /// the client.
    pub fn parse(line: &str) -> Result<Reply> {
        let line = line.trim_end_matches(['\r', '\n']);
        let code = line
            .get(0..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(|| FtpError::UnrecognizedReply(line.to_owned()))?;
        let status = Status::try_from(code).map_err(|_| FtpError::UnrecognizedReply(line.to_owned()))?;
        Ok(Reply {
            status,
            line: line.to_owned(),
        })
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The numeric reply code.
    pub fn code(&self) -> u32 {
        self.status.code()
    }

    /// The text following the code and its separator.
    pub fn message(&self) -> &str {
        self.line.get(4..).unwrap_or("")
    }

    /// The whole reply line, without line terminator.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Whether the reply code is one of `accepted`.
    pub fn is(&self, accepted: &[Status]) -> bool {
        accepted.contains(&self.status)
    }

    /// Turn a reply outside `accepted` into a protocol error.
    pub fn require(self, accepted: &[Status]) -> Result<Reply> {
        if self.is(accepted) {
            Ok(self)
        } else {
            Err(FtpError::UnexpectedReply(self))
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Assembles replies from raw control-socket reads.
///
/// A read cycle keeps reading while full blocks arrive. Of the received text
/// the second-to-last `\n`-separated segment is examined when there are more
/// than two, the first otherwise. The segment is terminal when its fourth
/// character is a space; otherwise another read cycle starts. Continuation
/// lines (`NNN-`) are not tracked separately, so this is looser than the
/// RFC 959 multi-line grammar.
#[derive(Debug)]
pub struct ReplyReader {
    buffer: [u8; BLOCK_SIZE],
}

impl Default for ReplyReader {
    fn default() -> Self {
        ReplyReader::new()
    }
}

impl ReplyReader {
    pub fn new() -> ReplyReader {
        ReplyReader {
            buffer: [0; BLOCK_SIZE],
        }
    }

    /// Read one reply from `stream`.
    pub fn read_reply<R: Read>(&mut self, stream: &mut R) -> Result<Reply> {
        for _ in 0..MAX_READ_ATTEMPTS {
            let text = self.read_cycle(stream)?;
            let segments: Vec<&str> = text.split('\n').collect();
            let candidate = if segments.len() > 2 {
                segments[segments.len() - 2]
            } else {
                segments[0]
            };
            let candidate = candidate.trim_end_matches('\r');
            trace!("FTP {}", candidate);

            if candidate.as_bytes().get(3) == Some(&b' ') {
                return Reply::parse(candidate);
            }
        }
        Err(FtpError::Framing {
            attempts: MAX_READ_ATTEMPTS,
        })
    }

    fn read_cycle<R: Read>(&mut self, stream: &mut R) -> Result<String> {
        let mut text = String::new();
        loop {
            let n = stream.read(&mut self.buffer).map_err(FtpError::ConnectionError)?;
            if n == 0 {
                return Err(FtpError::ConnectionError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "control connection closed by server",
                )));
            }
            text.push_str(&String::from_utf8_lossy(&self.buffer[..n]));
            if n < BLOCK_SIZE {
                return Ok(text);
            }
        }
    }
}
