//! FTP module.

use std::fmt;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::offset::TimeZone;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::command::Command;
use crate::config::SessionConfig;
use crate::data_stream::{parse_passive_address, DataStream};
use crate::events::EventBus;
use crate::keepalive::KeepAlive;
use crate::reply::{Reply, ReplyReader};
use crate::status::Status;
use crate::types::{ConnectionEvent, ConnectionState, FtpError, Result};

lazy_static! {
    // This regex extracts modification time from MDTM command response.
    static ref MDTM_RE: Regex = Regex::new(r"\b(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})\b").unwrap();

    // This regex extracts file size from SIZE command response.
    static ref SIZE_RE: Regex = Regex::new(r"\s+(\d+)\s*$").unwrap();
}

/// The control socket and everything that must only be touched while
/// holding the control lock.
#[derive(Debug)]
pub(crate) struct Control {
    stream: Option<TcpStream>,
    reader: ReplyReader,
    /// `Opened` was emitted and `Closed` is still owed.
    announced: bool,
}

impl Control {
    fn write_command(&mut self, command: &Command) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(FtpError::NotConnected)?;
        trace!("CMD {}", command.redacted());
        stream
            .write_all(format!("{}\r\n", command).as_bytes())
            .map_err(FtpError::ConnectionError)
    }

    fn read_reply(&mut self) -> Result<Reply> {
        let Control { stream, reader, .. } = self;
        let stream = stream.as_mut().ok_or(FtpError::NotConnected)?;
        reader.read_reply(stream)
    }

    fn exchange(&mut self, command: &Command) -> Result<Reply> {
        self.write_command(command)?;
        self.read_reply()
    }
}

/// State shared between the caller-facing session and its keep-alive thread.
pub(crate) struct Shared {
    config: SessionConfig,
    control: Mutex<Control>,
    state: AtomicU8,
    connected: AtomicBool,
    events: EventBus,
    keep_alive: Mutex<Option<KeepAlive>>,
}

impl Shared {
    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `command` and read its reply. With `track` the session is Busy
    /// for the round-trip and Ready afterwards.
    pub(crate) fn send_command(&self, ctl: &mut Control, command: &Command, track: bool) -> Result<Reply> {
        if track {
            self.set_state(ConnectionState::Busy);
        }
        match ctl.exchange(command) {
            Ok(reply) => {
                if track {
                    self.set_state(ConnectionState::Ready);
                }
                Ok(reply)
            }
            Err(err) => Err(self.fault(ctl, err, track)),
        }
    }

    /// Read a reply nobody asked for yet, such as the end of a transfer.
    pub(crate) fn read_reply(&self, ctl: &mut Control) -> Result<Reply> {
        ctl.read_reply().map_err(|err| self.fault(ctl, err, false))
    }

    fn fault(&self, ctl: &mut Control, err: FtpError, track: bool) -> FtpError {
        if err.is_connection_loss() {
            debug!("control connection lost: {}", err);
            // The socket is unusable, so no QUIT.
            ctl.stream = None;
            self.close_locked(ctl);
        } else if track {
            self.set_state(ConnectionState::Ready);
        }
        err
    }

    /// Ask for a passive endpoint and connect to it.
    pub(crate) fn open_data_channel(&self, ctl: &mut Control) -> Result<DataStream> {
        // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
        let reply = self
            .send_command(ctl, &Command::Pasv, false)?
            .require(&[Status::PassiveMode])?;
        let addr = parse_passive_address(reply.message())?;
        DataStream::connect(addr)
    }

    pub(crate) fn mkdir_locked(&self, ctl: &mut Control, path: &str, track: bool) -> Result<()> {
        self.send_command(ctl, &Command::Mkd(path.to_owned()), track)?
            .require(&[Status::PathCreated, Status::RequestedFileActionOk])
            .map(|_| ())
    }

    fn close_locked(&self, ctl: &mut Control) {
        if let Some(mut stream) = ctl.stream.take() {
            trace!("CMD {}", Command::Quit);
            let quit = stream
                .write_all(b"QUIT\r\n")
                .map_err(FtpError::ConnectionError)
                .and_then(|_| ctl.reader.read_reply(&mut stream));
            if let Err(err) = quit {
                debug!("QUIT failed while closing: {}", err);
            }
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.connected.store(false, Ordering::SeqCst);

        if ctl.announced {
            ctl.announced = false;
            let keep_alive = self
                .keep_alive
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(keep_alive) = keep_alive {
                keep_alive.stop();
            }
            self.events.emit(ConnectionEvent::Closed);
            debug!("connection to {} closed", self.config.host);
        }
        self.set_state(ConnectionState::NotConnected);
    }

    fn handshake(&self, ctl: &mut Control) -> Result<()> {
        ctl.read_reply()?.require(&[Status::Ready])?;

        self.set_state(ConnectionState::LoggingIn);
        let reply = ctl
            .exchange(&Command::User(self.config.user.clone()))?
            .require(&[Status::NeedPassword, Status::LoggedIn])?;
        if reply.status() != Status::LoggedIn {
            ctl.exchange(&Command::Pass(self.config.password.clone()))?
                .require(&[Status::LoggedIn, Status::CommandNotImplemented])?;
        }
        debug!("logged in as {}", self.config.user);
        self.connected.store(true, Ordering::SeqCst);

        self.set_state(ConnectionState::Busy);
        let reply = ctl.exchange(&Command::Cwd(self.config.initial_dir.clone()))?;
        if !reply.is(&[Status::RequestedFileActionOk]) {
            warn!("can't change into {}: {}", self.config.initial_dir, reply);
        }
        Ok(())
    }

    /// One keep-alive tick. Returns false once the session is gone.
    fn keep_alive_tick(&self) -> bool {
        let mut ctl = match self.control.try_lock() {
            Ok(ctl) => ctl,
            Err(TryLockError::WouldBlock) => {
                trace!("control connection busy, skipping keep-alive");
                return true;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        match self.send_command(&mut *ctl, &Command::Noop, false) {
            Ok(reply) => {
                if !reply.is(&[Status::CommandOk]) {
                    warn!("keep-alive NOOP answered with {}", reply);
                }
                true
            }
            Err(err) => {
                warn!("keep-alive NOOP failed: {}", err);
                self.connected.load(Ordering::SeqCst)
            }
        }
    }
}

/// A client session with one FTP server.
///
/// All operations block. The control connection is guarded by a single lock
/// shared with the keep-alive task, so each command/reply exchange is atomic.
///
/// ```rust,no_run
/// use ftp_session::{FtpSession, SessionConfig};
///
/// let session = FtpSession::new(SessionConfig::new("127.0.0.1", "anonymous", "guest@"));
/// session.open().unwrap();
/// println!("{:?}", session.list_entries(".").unwrap());
/// session.close();
/// ```
pub struct FtpSession {
    pub(crate) shared: Arc<Shared>,
}

impl FtpSession {
    pub fn new(config: SessionConfig) -> FtpSession {
        FtpSession {
            shared: Arc::new(Shared {
                config,
                control: Mutex::new(Control {
                    stream: None,
                    reader: ReplyReader::new(),
                    announced: false,
                }),
                state: AtomicU8::new(ConnectionState::NotConnected.as_u8()),
                connected: AtomicBool::new(false),
                events: EventBus::default(),
                keep_alive: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether login completed and the session has not been closed since.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Receive `Opened` / `Closed` notifications from now on.
    pub fn subscribe(&self) -> Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Connect, log in and change into the configured directory. Does nothing
    /// when the session is already open.
    pub fn open(&self) -> Result<()> {
        let shared = &self.shared;
        let mut ctl = shared.lock();
        if shared.state() != ConnectionState::NotConnected {
            debug!("session to {} already open", shared.config.host);
            return Ok(());
        }

        shared.set_state(ConnectionState::Connecting);
        let addr = match resolve(&shared.config.host, shared.config.port) {
            Ok(addr) => addr,
            Err(source) => {
                shared.set_state(ConnectionState::NotConnected);
                return Err(FtpError::Resolve {
                    host: shared.config.host.clone(),
                    source,
                });
            }
        };
        debug!("connecting to {}", addr);
        let stream = match TcpStream::connect(addr) {
            Ok(stream) => stream,
            Err(source) => {
                shared.set_state(ConnectionState::NotConnected);
                return Err(FtpError::Connect {
                    addr: addr.to_string(),
                    source,
                });
            }
        };
        ctl.stream = Some(stream);

        if let Err(err) = shared.handshake(&mut *ctl) {
            debug!("opening session to {} failed: {}", addr, err);
            ctl.stream = ctl.stream.take().filter(|_| !err.is_connection_loss());
            shared.close_locked(&mut *ctl);
            return Err(err);
        }

        ctl.announced = true;
        shared.events.emit(ConnectionEvent::Opened);
        let weak = Arc::downgrade(shared);
        let keep_alive = KeepAlive::start(shared.config.keep_alive, move || {
            weak.upgrade().map_or(false, |shared| shared.keep_alive_tick())
        });
        match keep_alive {
            Ok(keep_alive) => {
                *shared.keep_alive.lock().unwrap_or_else(PoisonError::into_inner) = Some(keep_alive)
            }
            Err(err) => warn!("can't start keep-alive: {}", err),
        }
        shared.set_state(ConnectionState::Ready);
        debug!("session to {} ready", addr);
        Ok(())
    }

    /// Say QUIT (ignoring the answer) and drop the control connection.
    pub fn close(&self) {
        let mut ctl = self.shared.lock();
        self.shared.close_locked(&mut *ctl);
    }

    /// Run `op` under the control lock once the session is known to be
    /// connected. Leaves the session Ready unless the connection was lost.
    pub(crate) fn with_control<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Shared, &mut Control) -> Result<T>,
    {
        let mut ctl = self.shared.lock();
        if !self.is_connected() {
            return Err(FtpError::NotConnected);
        }
        let result = op(&*self.shared, &mut *ctl);
        if self.shared.state() != ConnectionState::NotConnected {
            self.shared.set_state(ConnectionState::Ready);
        }
        result
    }

    fn simple(&self, command: Command, accepted: &[Status]) -> Result<Reply> {
        self.with_control(|shared, ctl| shared.send_command(ctl, &command, true)?.require(accepted))
    }

    /// Change the current directory to the path specified.
    pub fn cwd(&self, path: &str) -> Result<()> {
        self.simple(Command::Cwd(path.to_owned()), &[Status::RequestedFileActionOk])
            .map(|_| ())
    }

    /// Move the current directory to the parent directory.
    pub fn cdup(&self) -> Result<()> {
        self.simple(
            Command::Cdup,
            &[Status::CommandOk, Status::RequestedFileActionOk],
        )
        .map(|_| ())
    }

    /// Gets the current directory
    pub fn pwd(&self) -> Result<String> {
        let reply = self.simple(Command::Pwd, &[Status::PathCreated])?;
        let text = reply.message();
        text.find('"')
            .and_then(|begin| {
                text[begin + 1..]
                    .find('"')
                    .map(|len| text[begin + 1..begin + 1 + len].to_owned())
            })
            .ok_or_else(|| FtpError::InvalidResponse(format!("Invalid PWD Response: {}", reply)))
    }

    /// This does nothing. This is usually just used to keep the connection open.
    pub fn noop(&self) -> Result<()> {
        self.simple(Command::Noop, &[Status::CommandOk]).map(|_| ())
    }

    /// This creates a new directory on the server.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        self.with_control(|shared, ctl| shared.mkdir_locked(ctl, path, true))
    }

    /// Removes the remote directory from the server.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        self.simple(
            Command::Rmd(path.to_owned()),
            &[Status::RequestedFileActionOk, Status::PathCreated],
        )
        .map(|_| ())
    }

    /// Renames the file or directory `from` to `to`.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.with_control(|shared, ctl| {
            shared
                .send_command(ctl, &Command::Rnfr(from.to_owned()), true)?
                .require(&[Status::RequestFilePending])?;
            shared
                .send_command(ctl, &Command::Rnto(to.to_owned()), true)?
                .require(&[Status::RequestedFileActionOk])
                .map(|_| ())
        })
    }

    /// Remove the remote file from the server.
    pub fn rm(&self, path: &str) -> Result<()> {
        self.simple(Command::Dele(path.to_owned()), &[Status::RequestedFileActionOk])
            .map(|_| ())
    }

    /// Retrieves the modification time of the file at `path` if it exists.
    /// `None` is returned when the reply carries no timestamp.
    pub fn mdtm(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let reply = self.simple(Command::Mdtm(path.to_owned()), &[Status::File])?;
        let caps = match MDTM_RE.captures(reply.message()) {
            Some(caps) => caps,
            None => return Ok(None),
        };
        let field = |i: usize| caps[i].parse::<u32>().unwrap_or(u32::MAX);
        let moment = NaiveDate::from_ymd_opt(field(1) as i32, field(2), field(3))
            .and_then(|date| date.and_hms_opt(field(4), field(5), field(6)))
            .ok_or_else(|| FtpError::InvalidResponse(format!("Invalid MDTM Response: {}", reply)))?;
        Ok(Some(Utc.from_utc_datetime(&moment)))
    }

    /// Retrieves the size of the file in bytes at `path` if it exists.
    /// `None` is returned when the reply carries no size.
    pub fn size(&self, path: &str) -> Result<Option<usize>> {
        let reply = self.simple(Command::Size(path.to_owned()), &[Status::File])?;
        match SIZE_RE.captures(reply.line()) {
            Some(caps) => caps[1]
                .parse()
                .map(Some)
                .map_err(|_| FtpError::InvalidResponse(format!("Invalid SIZE Response: {}", reply))),
            None => Ok(None),
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if self.state() != ConnectionState::NotConnected {
            self.close();
        }
    }
}

impl fmt::Debug for FtpSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FtpSession")
            .field("host", &self.shared.config.host)
            .field("port", &self.shared.config.port)
            .field("state", &self.state())
            .finish()
    }
}

/// Resolve `host`, preferring IPv4 since passive replies only carry IPv4.
fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host has no addresses"))
}
