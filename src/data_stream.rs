use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream};

use regex::Regex;

use crate::types::{FtpError, Result};

lazy_static! {
    // Matches the h1,h2,h3,h4,p1,p2 tuple found between the parentheses of a PASV reply.
    static ref PORT_RE: Regex = Regex::new(r"^\s*(\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\s*$").unwrap();
}

/// Extract the data endpoint from the text of a `227` reply, e.g.
/// `Entering Passive Mode (192,168,0,7,19,137)`.
pub fn parse_passive_address(text: &str) -> Result<SocketAddrV4> {
    let invalid = || FtpError::InvalidAddress(text.to_owned());
    let open = text.find('(').ok_or_else(invalid)?;
    let close = text.find(')').filter(|&close| close > open).ok_or_else(invalid)?;
    let caps = PORT_RE.captures(&text[open + 1..close]).ok_or_else(invalid)?;

    let mut fields = [0u8; 6];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = caps[i + 1].parse().map_err(|_| invalid())?;
    }
    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = ((fields[4] as u16) << 8) + fields[5] as u16;
    Ok(SocketAddrV4::new(ip, port))
}

/// Data connection for a single transfer. The socket closes when this is dropped.
#[derive(Debug)]
pub struct DataStream {
    stream: TcpStream,
    peer: SocketAddr,
}

impl DataStream {
    /// Connect to the endpoint the server announced.
    pub fn connect(addr: SocketAddrV4) -> Result<DataStream> {
        let peer = SocketAddr::V4(addr);
        debug!("opening data connection to {}", peer);
        TcpStream::connect(peer)
            .map(|stream| DataStream { stream, peer })
            .map_err(|source| FtpError::DataConnection {
                addr: peer.to_string(),
                source,
            })
    }

    /// Wrap an I/O failure on this channel.
    pub(crate) fn error(&self, source: io::Error) -> FtpError {
        FtpError::DataConnection {
            addr: self.peer.to_string(),
            source,
        }
    }

    /// Signal end of data and release the socket.
    pub fn close(self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The server may have torn the connection down first.
            Err(ref err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(self.error(err)),
        }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
