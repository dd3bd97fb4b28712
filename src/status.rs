//! Reply codes a server may send, as defined by RFC 959 and the common
//! extensions (RFC 2228, RFC 2428).

use std::convert::TryFrom;
use std::fmt;

macro_rules! statuses {
    ($($(#[$doc:meta])* $name:ident = $code:expr,)+) => {
        /// A reply code known to the client. Codes outside this set are
        /// protocol violations.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Status {
            $($(#[$doc])* $name,)+
        }

        impl Status {
            /// The three-digit numeric value of this reply code.
            pub fn code(self) -> u32 {
                match self {
                    $(Status::$name => $code,)+
                }
            }
        }

        impl TryFrom<u32> for Status {
            type Error = u32;

            fn try_from(code: u32) -> ::std::result::Result<Status, u32> {
                match code {
                    $($code => Ok(Status::$name),)+
                    other => Err(other),
                }
            }
        }
    };
}

statuses! {
    // 1xx: Positive Preliminary Reply
    Initiating = 100,
    /// Restart marker; text reads `MARK yyyy = mmmm`.
    RestartMarker = 110,
    ReadyMinute = 120,
    AlreadyOpen = 125,
    AboutToSend = 150,

    // 2xx: Positive Completion Reply
    CommandOk = 200,
    /// Command not implemented, superfluous at this site.
    CommandNotImplemented = 202,
    System = 211,
    Directory = 212,
    File = 213,
    Help = 214,
    Name = 215,
    Ready = 220,
    Closing = 221,
    DataConnectionOpen = 225,
    ClosingDataConnection = 226,
    PassiveMode = 227,
    LongPassiveMode = 228,
    ExtendedPassiveMode = 229,
    LoggedIn = 230,
    LoggedOut = 231,
    LogoutAck = 232,
    AuthOk = 234,
    RequestedFileActionOk = 250,
    PathCreated = 257,

    // 3xx: Positive intermediate Reply
    NeedPassword = 331,
    LoginNeedAccount = 332,
    RequestFilePending = 350,

    // 4xx: Transient Negative Completion Reply
    NotAvailable = 421,
    CannotOpenDataConnection = 425,
    TransferAborted = 426,
    InvalidCredentials = 430,
    HostUnavailable = 434,
    RequestFileActionIgnored = 450,
    ActionAborted = 451,
    RequestedActionNotTaken = 452,

    // 5xx: Permanent Negative Completion Reply
    BadCommand = 500,
    BadArguments = 501,
    NotImplemented = 502,
    BadSequence = 503,
    NotImplementedParameter = 504,
    NotLoggedIn = 530,
    StoringNeedAccount = 532,
    FileUnavailable = 550,
    PageTypeUnknown = 551,
    ExceededStorage = 552,
    BadFilename = 553,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
