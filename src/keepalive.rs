//! Periodic background task that keeps an idle control connection open.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a running keep-alive thread. Stopping it wakes the thread
/// immediately instead of waiting for the next tick.
#[derive(Debug)]
pub(crate) struct KeepAlive {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl KeepAlive {
    /// Run `tick` every `period` until stopped or until `tick` returns false.
    pub(crate) fn start<F>(period: Duration, mut tick: F) -> io::Result<KeepAlive>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(String::from("ftp-keepalive"))
            .spawn(move || loop {
                match stopped.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !tick() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        debug!("keep-alive started, period {:?}", period);
        Ok(KeepAlive { stop, handle })
    }

    /// Stop the task and wait for it, unless called from the task itself.
    pub(crate) fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!("keep-alive thread panicked");
        }
        debug!("keep-alive stopped");
    }
}
