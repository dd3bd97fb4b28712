//! Listings and binary file transfers over passive data connections.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::ftp::{Control, FtpSession, Shared};
use crate::reply::BLOCK_SIZE;
use crate::status::Status;
use crate::types::{ConnectionState, FileType, FtpError, Result};

const TRANSFER_STARTING: &[Status] = &[Status::AboutToSend, Status::AlreadyOpen];
const RETRIEVE_STARTING: &[Status] = &[Status::AboutToSend, Status::AlreadyOpen, Status::RestartMarker];
const TRANSFER_COMPLETE: &[Status] = &[Status::ClosingDataConnection, Status::RequestedFileActionOk];

enum PumpError {
    Read(io::Error),
    Write(io::Error),
}

/// Move bytes from `source` to `sink` in `BLOCK_SIZE` chunks until `source`
/// reports end of data.
fn pump<R: Read, W: Write>(source: &mut R, sink: &mut W) -> ::std::result::Result<u64, PumpError> {
    let mut buffer = [0u8; BLOCK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(PumpError::Read(err)),
        };
        sink.write_all(&buffer[..n]).map_err(PumpError::Write)?;
        total += n as u64;
    }
    sink.flush().map_err(PumpError::Write)?;
    Ok(total)
}

/// Directory part of a remote path, split at the last `/` or `\`.
pub(crate) fn remote_parent(path: &str) -> Option<&str> {
    let idx = path.rfind(['/', '\\'])?;
    if idx == 0 {
        Some(&path[..1])
    } else {
        Some(&path[..idx])
    }
}

fn remote_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn split_listing(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

impl Shared {
    fn set_binary(&self, ctl: &mut Control) -> Result<()> {
        self.send_command(ctl, &Command::Type(FileType::Image), false)?
            .require(&[Status::CommandOk])
            .map(|_| ())
    }

    pub(crate) fn list_locked(&self, ctl: &mut Control, path: Option<&str>) -> Result<Vec<String>> {
        self.set_state(ConnectionState::Busy);
        let mut data = self.open_data_channel(ctl)?;
        self.send_command(ctl, &Command::Nlst(path.map(String::from)), false)?
            .require(TRANSFER_STARTING)?;

        self.set_state(ConnectionState::Transferring);
        let mut raw = Vec::new();
        let drained = pump(&mut data, &mut raw).map_err(|err| match err {
            PumpError::Read(err) | PumpError::Write(err) => data.error(err),
        });
        drop(data);

        self.set_state(ConnectionState::Busy);
        let reply = self.read_reply(ctl);
        drained?;
        reply?.require(TRANSFER_COMPLETE)?;
        Ok(split_listing(&raw))
    }

    /// Listing-based existence probe. A listing the server refuses counts as
    /// "does not exist".
    pub(crate) fn exists_locked(&self, ctl: &mut Control, path: &str) -> Result<bool> {
        let name = remote_name(path);
        let parent = remote_parent(path).unwrap_or(".");
        match self.list_locked(ctl, Some(parent)) {
            Ok(entries) => Ok(entries
                .iter()
                .any(|entry| entry == path || remote_name(entry) == name)),
            Err(err @ FtpError::NotConnected) => Err(err),
            Err(err) if err.is_connection_loss() => Err(err),
            Err(err) => {
                debug!("listing {} failed, assuming {} is absent: {}", parent, path, err);
                Ok(false)
            }
        }
    }

    fn upload_locked<R: Read>(
        &self,
        ctl: &mut Control,
        source: &mut R,
        remote_path: &str,
        create_dirs: bool,
    ) -> Result<u64> {
        self.set_state(ConnectionState::Busy);
        if create_dirs {
            if let Some(parent) = remote_parent(remote_path).filter(|p| *p != "/" && *p != "\\") {
                if !self.exists_locked(ctl, parent)? {
                    debug!("creating remote directory {}", parent);
                    self.mkdir_locked(ctl, parent, false)?;
                }
            }
        }
        self.set_binary(ctl)?;

        let mut data = self.open_data_channel(ctl)?;
        self.send_command(ctl, &Command::Stor(remote_path.to_owned()), false)?
            .require(TRANSFER_STARTING)?;

        self.set_state(ConnectionState::Transferring);
        // The server only answers once the data connection is closed.
        let sent = match pump(source, &mut data) {
            Ok(sent) => data.close().map(|_| sent),
            Err(PumpError::Read(err)) => {
                drop(data);
                Err(FtpError::LocalIo(err))
            }
            Err(PumpError::Write(err)) => {
                let err = data.error(err);
                drop(data);
                Err(err)
            }
        };

        self.set_state(ConnectionState::Busy);
        let reply = self.read_reply(ctl);
        let sent = sent?;
        reply?.require(TRANSFER_COMPLETE)?;
        debug!("stored {} bytes as {}", sent, remote_path);
        Ok(sent)
    }

    fn download_locked<W: Write>(&self, ctl: &mut Control, remote_path: &str, sink: &mut W) -> Result<u64> {
        self.set_state(ConnectionState::Busy);
        self.set_binary(ctl)?;

        let mut data = self.open_data_channel(ctl)?;
        self.send_command(ctl, &Command::Retr(remote_path.to_owned()), false)?
            .require(RETRIEVE_STARTING)?;

        self.set_state(ConnectionState::Transferring);
        let received = match pump(&mut data, sink) {
            Ok(received) => Ok(received),
            Err(PumpError::Read(err)) => Err(data.error(err)),
            Err(PumpError::Write(err)) => Err(FtpError::LocalIo(err)),
        };
        drop(data);

        self.set_state(ConnectionState::Busy);
        let reply = self.read_reply(ctl);
        let received = received?;
        reply?.require(TRANSFER_COMPLETE)?;
        debug!("retrieved {} bytes from {}", received, remote_path);
        Ok(received)
    }
}

impl FtpSession {
    /// Names in `path` as returned by `NLST`. An empty directory yields an
    /// empty list.
    pub fn list_entries(&self, path: &str) -> Result<Vec<String>> {
        self.with_control(|shared, ctl| shared.list_locked(ctl, Some(path)))
    }

    /// Execute `NLST` command which returns the list of file names only.
    /// If `path` is omitted the current directory is listed.
    pub fn nlst(&self, path: Option<&str>) -> Result<Vec<String>> {
        self.with_control(|shared, ctl| shared.list_locked(ctl, path))
    }

    /// Whether `path` shows up in a listing of its parent directory.
    pub fn exists(&self, path: &str) -> Result<bool> {
        self.with_control(|shared, ctl| shared.exists_locked(ctl, path))
    }

    /// Store everything `source` yields as `remote_path`, in binary mode.
    /// With `create_dirs` the remote parent directory is created when a
    /// listing does not show it. Returns the number of bytes sent.
    pub fn upload<R: Read>(&self, source: &mut R, remote_path: &str, create_dirs: bool) -> Result<u64> {
        self.with_control(|shared, ctl| shared.upload_locked(ctl, source, remote_path, create_dirs))
    }

    /// Retrieve `remote_path` in binary mode into `sink`. Returns the number
    /// of bytes received.
    pub fn download<W: Write>(&self, remote_path: &str, sink: &mut W) -> Result<u64> {
        self.with_control(|shared, ctl| shared.download_locked(ctl, remote_path, sink))
    }

    /// Upload the local file at `local_path`.
    pub fn upload_file<P: AsRef<Path>>(&self, local_path: P, remote_path: &str, create_dirs: bool) -> Result<u64> {
        if !self.is_connected() {
            return Err(FtpError::NotConnected);
        }
        let mut file = File::open(local_path.as_ref()).map_err(FtpError::LocalIo)?;
        self.upload(&mut file, remote_path, create_dirs)
    }

    /// Download `remote_path` into the local file at `local_path`, creating
    /// its directory first when `create_dirs` is set. Data lands in a
    /// sibling `.part` file that replaces `local_path` only once the
    /// transfer succeeded, so a failed download leaves an existing file
    /// untouched.
    pub fn download_file<P: AsRef<Path>>(&self, remote_path: &str, local_path: P, create_dirs: bool) -> Result<u64> {
        if !self.is_connected() {
            return Err(FtpError::NotConnected);
        }
        let local_path = local_path.as_ref();
        let partial = partial_path(local_path)?;
        if create_dirs {
            if let Some(dir) = local_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(dir).map_err(FtpError::LocalIo)?;
            }
        }
        let mut file = File::create(&partial).map_err(FtpError::LocalIo)?;
        let result = self
            .download(remote_path, &mut file)
            .and_then(|received| file.sync_all().map(|_| received).map_err(FtpError::LocalIo));
        drop(file);
        let result = result.and_then(|received| {
            fs::rename(&partial, local_path)
                .map(|_| received)
                .map_err(FtpError::LocalIo)
        });
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result
    }
}

/// Where `download_file` writes before the data is complete.
fn partial_path(local_path: &Path) -> Result<PathBuf> {
    let name = local_path.file_name().ok_or_else(|| {
        FtpError::LocalIo(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not name a file", local_path.display()),
        ))
    })?;
    let mut partial = OsString::from(".");
    partial.push(name);
    partial.push(".part");
    Ok(local_path.with_file_name(partial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parent_of_remote_paths() {
        assert_eq!(remote_parent("file.bin"), None);
        assert_eq!(remote_parent("dir/file.bin"), Some("dir"));
        assert_eq!(remote_parent("a/b/file.bin"), Some("a/b"));
        assert_eq!(remote_parent("dir\\file.bin"), Some("dir"));
        assert_eq!(remote_parent("a/b\\file.bin"), Some("a/b"));
        assert_eq!(remote_parent("/file.bin"), Some("/"));
        assert_eq!(remote_name("a/b/file.bin"), "file.bin");
        assert_eq!(remote_name("file.bin"), "file.bin");
    }

    #[test]
    fn partial_file_sits_next_to_target() {
        assert_eq!(
            partial_path(Path::new("dir/copy.bin")).unwrap(),
            PathBuf::from("dir/.copy.bin.part")
        );
        assert_eq!(partial_path(Path::new("copy.bin")).unwrap(), PathBuf::from(".copy.bin.part"));
        assert!(matches!(partial_path(Path::new("dir/..")), Err(FtpError::LocalIo(_))));
    }

    #[test]
    fn listing_split() {
        assert!(split_listing(b"").is_empty());
        assert!(split_listing(b"\r\n").is_empty());
        assert_eq!(split_listing(b"a\r\nb\r\n"), vec!["a", "b"]);
        assert_eq!(split_listing(b"a\nb"), vec!["a", "b"]);
    }

    #[test]
    fn pump_moves_everything_across_chunk_boundaries() {
        for len in [0usize, 1, 511, 512, 513, 4096] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut sink = Vec::new();
            let moved = pump(&mut Cursor::new(payload.clone()), &mut sink).ok().unwrap();
            assert_eq!(moved, len as u64);
            assert_eq!(sink, payload);
        }
    }
}
