#![crate_name = "ftp_session"]
#![crate_type = "lib"]

//! ftp_session is a blocking FTP client that keeps its control connection
//! alive between transfers.
//!
//! ### Usage
//!
//! Here is a basic usage example:
//!
//! ```rust,no_run
//! use std::io::Cursor;
//! use ftp_session::{FtpSession, SessionConfig};
//!
//! let session = FtpSession::new(SessionConfig::new("127.0.0.1", "anonymous", "guest@"));
//! session.open().unwrap_or_else(|err| panic!("{}", err));
//! session.upload(&mut Cursor::new(b"hello".to_vec()), "incoming/hello.txt", true).unwrap();
//! let mut copy = Vec::new();
//! session.download("incoming/hello.txt", &mut copy).unwrap();
//! session.close();
//! ```
//!
//! Transfers always run in binary (`TYPE I`) mode over passive data
//! connections. While a session is open a background task sends `NOOP`
//! every keep-alive period (two minutes unless configured otherwise).

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod command;
pub mod config;
mod data_stream;
mod events;
mod ftp;
mod keepalive;
pub mod reply;
pub mod status;
mod transfer;
pub mod types;

pub use self::config::SessionConfig;
pub use self::data_stream::parse_passive_address;
pub use self::ftp::FtpSession;
pub use self::reply::{Reply, ReplyReader};
pub use self::status::Status;
pub use self::types::{ConnectionEvent, ConnectionState, FtpError, Result};

// -- test logging
#[cfg(test)]
pub(crate) fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
