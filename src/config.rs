//! Session parameters.

use std::time::Duration;

/// Default control connection port.
pub const DEFAULT_PORT: u16 = 21;

/// Default period between keep-alive NOOPs.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(120);

/// Where and as whom a session connects.
#[derive(Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Directory changed into right after login.
    pub initial_dir: String,
    pub keep_alive: Duration,
}

impl SessionConfig {
    pub fn new<H, U, P>(host: H, user: U, password: P) -> SessionConfig
    where
        H: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        SessionConfig {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            initial_dir: String::from("."),
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }

    pub fn port(mut self, port: u16) -> SessionConfig {
        self.port = port;
        self
    }

    pub fn initial_dir<S: Into<String>>(mut self, dir: S) -> SessionConfig {
        self.initial_dir = dir.into();
        self
    }

    pub fn keep_alive(mut self, period: Duration) -> SessionConfig {
        self.keep_alive = period;
        self
    }
}

// Keep the password out of debug output.
impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("initial_dir", &self.initial_dir)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}
