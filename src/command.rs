//! RFC 959 commands and their wire representation.

use std::fmt;

use crate::types::FileType;

/// Data structure code used by `STRU`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    File,
    Record,
    Page,
}

/// Transfer mode code used by `MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Stream,
    Block,
    Compressed,
}

/// A command sent over the control connection. `Display` yields the command
/// line without its CRLF terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Acct(String),
    Cwd(String),
    Cdup,
    Smnt(String),
    Rein,
    Quit,
    /// Active mode endpoint: four address octets and the port split in two bytes.
    Port([u8; 4], u16),
    Pasv,
    Type(FileType),
    Stru(Structure),
    Mode(TransferMode),
    Retr(String),
    Stor(String),
    Stou,
    Appe(String),
    Allo(u64, Option<u64>),
    Rest(String),
    Rnfr(String),
    Rnto(String),
    Abor,
    Dele(String),
    Rmd(String),
    Mkd(String),
    Pwd,
    List(Option<String>),
    Nlst(Option<String>),
    Site(String),
    Syst,
    Stat(Option<String>),
    Help(Option<String>),
    Noop,
    Size(String),
    Mdtm(String),
}

impl Command {
    /// The command line as it may appear in logs: passwords are masked.
    pub fn redacted(&self) -> String {
        match self {
            Command::Pass(_) => String::from("PASS ******"),
            other => other.to_string(),
        }
    }
}

fn optional(f: &mut fmt::Formatter, verb: &str, arg: &Option<String>) -> fmt::Result {
    match arg {
        Some(arg) => write!(f, "{} {}", verb, arg),
        None => f.write_str(verb),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::User(user) => write!(f, "USER {}", user),
            Command::Pass(pass) => write!(f, "PASS {}", pass),
            Command::Acct(account) => write!(f, "ACCT {}", account),
            Command::Cwd(path) => write!(f, "CWD {}", path),
            Command::Cdup => f.write_str("CDUP"),
            Command::Smnt(path) => write!(f, "SMNT {}", path),
            Command::Rein => f.write_str("REIN"),
            Command::Quit => f.write_str("QUIT"),
            Command::Port(ip, port) => write!(
                f,
                "PORT {},{},{},{},{},{}",
                ip[0],
                ip[1],
                ip[2],
                ip[3],
                port >> 8,
                port & 0xff
            ),
            Command::Pasv => f.write_str("PASV"),
            Command::Type(file_type) => write!(f, "TYPE {}", file_type),
            Command::Stru(structure) => {
                let code = match structure {
                    Structure::File => "F",
                    Structure::Record => "R",
                    Structure::Page => "P",
                };
                write!(f, "STRU {}", code)
            }
            Command::Mode(mode) => {
                let code = match mode {
                    TransferMode::Stream => "S",
                    TransferMode::Block => "B",
                    TransferMode::Compressed => "C",
                };
                write!(f, "MODE {}", code)
            }
            Command::Retr(path) => write!(f, "RETR {}", path),
            Command::Stor(path) => write!(f, "STOR {}", path),
            Command::Stou => f.write_str("STOU"),
            Command::Appe(path) => write!(f, "APPE {}", path),
            Command::Allo(size, None) => write!(f, "ALLO {}", size),
            Command::Allo(size, Some(record)) => write!(f, "ALLO {} R {}", size, record),
            Command::Rest(marker) => write!(f, "REST {}", marker),
            Command::Rnfr(path) => write!(f, "RNFR {}", path),
            Command::Rnto(path) => write!(f, "RNTO {}", path),
            Command::Abor => f.write_str("ABOR"),
            Command::Dele(path) => write!(f, "DELE {}", path),
            Command::Rmd(path) => write!(f, "RMD {}", path),
            Command::Mkd(path) => write!(f, "MKD {}", path),
            Command::Pwd => f.write_str("PWD"),
            Command::List(path) => optional(f, "LIST", path),
            Command::Nlst(path) => optional(f, "NLST", path),
            Command::Site(cmd) => write!(f, "SITE {}", cmd),
            Command::Syst => f.write_str("SYST"),
            Command::Stat(path) => optional(f, "STAT", path),
            Command::Help(topic) => optional(f, "HELP", topic),
            Command::Noop => f.write_str("NOOP"),
            Command::Size(path) => write!(f, "SIZE {}", path),
            Command::Mdtm(path) => write!(f, "MDTM {}", path),
        }
    }
}
