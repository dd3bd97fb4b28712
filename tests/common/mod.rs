//! A small in-process FTP server used to drive sessions in tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ftp_session::SessionConfig;

pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// How the server answers the parts of a session tests want to vary.
#[derive(Clone)]
pub struct Script {
    pub greeting: String,
    pub user_reply: String,
    pub pass_reply: String,
    /// Hang up instead of answering NOOP.
    pub drop_on_noop: bool,
    /// Answer PASV with this instead of an endpoint.
    pub pasv_reply: Option<String>,
    /// Pause between data chunks sent for RETR.
    pub retr_chunk_delay: Option<Duration>,
    /// Pause before answering TYPE.
    pub type_delay: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            greeting: String::from("220 mock server ready"),
            user_reply: String::from("331 need password"),
            pass_reply: String::from("230 logged in"),
            drop_on_noop: false,
            pasv_reply: None,
            retr_chunk_delay: None,
            type_delay: None,
        }
    }
}

#[derive(Default)]
struct Store {
    commands: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Store {
    fn children(&self, dir: &str) -> Option<Vec<String>> {
        if dir == "." || dir == "/" || dir.is_empty() {
            let names = self
                .files
                .keys()
                .chain(self.dirs.iter())
                .filter(|name| !name.contains('/'))
                .cloned()
                .collect();
            return Some(names);
        }
        if !self.dirs.contains(dir) {
            return None;
        }
        let prefix = format!("{}/", dir);
        let names = self
            .files
            .keys()
            .chain(self.dirs.iter())
            .filter_map(|name| name.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(String::from)
            .collect();
        Some(names)
    }
}

pub struct MockServer {
    addr: SocketAddr,
    store: Arc<Mutex<Store>>,
}

impl MockServer {
    pub fn start(script: Script) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Mutex::new(Store::default()));
        let shared = Arc::clone(&store);
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => serve(stream, &shared, &script),
                    Err(_) => return,
                }
            }
        });
        MockServer { addr, store }
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", "tester", "secret").port(self.addr.port())
    }

    /// Every command line received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.store.lock().unwrap().commands.clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.commands()
            .iter()
            .filter(|line| line.split(' ').next() == Some(verb))
            .count()
    }

    pub fn put_file(&self, name: &str, content: &[u8]) {
        self.store.lock().unwrap().files.insert(name.to_owned(), content.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().files.get(name).cloned()
    }

    pub fn has_dir(&self, name: &str) -> bool {
        self.store.lock().unwrap().dirs.contains(name)
    }
}

fn reply(out: &mut TcpStream, line: &str) -> bool {
    out.write_all(format!("{}\r\n", line).as_bytes()).is_ok()
}

/// Wait until the client has closed its end of a data connection.
fn await_close(data: &mut TcpStream) {
    let mut sink = [0u8; 64];
    while let Ok(n) = data.read(&mut sink) {
        if n == 0 {
            break;
        }
    }
}

fn serve(stream: TcpStream, store: &Arc<Mutex<Store>>, script: &Script) {
    let mut out = stream.try_clone().unwrap();
    let mut input = BufReader::new(stream);
    let mut passive: Option<TcpListener> = None;
    let mut rename_from: Option<String> = None;

    if !reply(&mut out, &script.greeting) {
        return;
    }
    loop {
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end().to_owned();
        store.lock().unwrap().commands.push(line.clone());
        let (verb, arg) = match line.find(' ') {
            Some(idx) => (&line[..idx], line[idx + 1..].to_owned()),
            None => (line.as_str(), String::new()),
        };

        let ok = match verb {
            "USER" => reply(&mut out, &script.user_reply),
            "PASS" => reply(&mut out, &script.pass_reply),
            "CWD" => {
                let known = arg == "." || arg == "/" || store.lock().unwrap().dirs.contains(&arg);
                if known {
                    reply(&mut out, "250 directory changed")
                } else {
                    reply(&mut out, "550 no such directory")
                }
            }
            "CDUP" => reply(&mut out, "250 directory changed"),
            "PWD" => reply(&mut out, "257 \"/\" is the current directory"),
            "TYPE" => {
                if let Some(delay) = script.type_delay {
                    thread::sleep(delay);
                }
                reply(&mut out, "200 type set")
            }
            "NOOP" => {
                if script.drop_on_noop {
                    let _ = out.shutdown(Shutdown::Both);
                    return;
                }
                reply(&mut out, "200 NOOP ok")
            }
            "PASV" => match &script.pasv_reply {
                Some(refusal) => reply(&mut out, refusal),
                None => {
                    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                    let port = listener.local_addr().unwrap().port();
                    passive = Some(listener);
                    reply(
                        &mut out,
                        &format!("227 Entering Passive Mode (127,0,0,1,{},{})", port >> 8, port & 0xff),
                    )
                }
            },
            "NLST" => {
                let dir = if arg.is_empty() { String::from(".") } else { arg.clone() };
                let entries = store.lock().unwrap().children(&dir);
                match (entries, passive.take()) {
                    (Some(entries), Some(listener)) => {
                        reply(&mut out, "150 here comes the listing");
                        let (mut data, _) = listener.accept().unwrap();
                        for entry in entries {
                            let _ = data.write_all(format!("{}\r\n", entry).as_bytes());
                        }
                        let _ = data.shutdown(Shutdown::Write);
                        await_close(&mut data);
                        reply(&mut out, "226 listing sent")
                    }
                    (None, _) => reply(&mut out, "550 no such directory"),
                    (_, None) => reply(&mut out, "425 use PASV first"),
                }
            }
            "STOR" => match passive.take() {
                Some(listener) => {
                    reply(&mut out, "150 ok to send data");
                    let (mut data, _) = listener.accept().unwrap();
                    let mut content = Vec::new();
                    let _ = data.read_to_end(&mut content);
                    store.lock().unwrap().files.insert(arg, content);
                    reply(&mut out, "226 transfer complete")
                }
                None => reply(&mut out, "425 use PASV first"),
            },
            "RETR" => {
                let content = store.lock().unwrap().files.get(&arg).cloned();
                match (content, passive.take()) {
                    (Some(content), Some(listener)) => {
                        reply(&mut out, "150 opening data connection");
                        let (mut data, _) = listener.accept().unwrap();
                        for chunk in content.chunks(300) {
                            if let Some(delay) = script.retr_chunk_delay {
                                thread::sleep(delay);
                            }
                            let _ = data.write_all(chunk);
                        }
                        let _ = data.shutdown(Shutdown::Write);
                        await_close(&mut data);
                        reply(&mut out, "226 transfer complete")
                    }
                    (None, _) => reply(&mut out, "550 no such file"),
                    (_, None) => reply(&mut out, "425 use PASV first"),
                }
            }
            "MKD" => {
                store.lock().unwrap().dirs.insert(arg.clone());
                reply(&mut out, &format!("257 \"{}\" created", arg))
            }
            "RMD" => {
                if store.lock().unwrap().dirs.remove(&arg) {
                    reply(&mut out, "250 directory removed")
                } else {
                    reply(&mut out, "550 no such directory")
                }
            }
            "DELE" => {
                if store.lock().unwrap().files.remove(&arg).is_some() {
                    reply(&mut out, "250 file deleted")
                } else {
                    reply(&mut out, "550 no such file")
                }
            }
            "RNFR" => {
                let known = {
                    let store = store.lock().unwrap();
                    store.files.contains_key(&arg) || store.dirs.contains(&arg)
                };
                if known {
                    rename_from = Some(arg);
                    reply(&mut out, "350 ready for RNTO")
                } else {
                    reply(&mut out, "550 no such file")
                }
            }
            "RNTO" => match rename_from.take() {
                Some(from) => {
                    let mut store = store.lock().unwrap();
                    if let Some(content) = store.files.remove(&from) {
                        store.files.insert(arg, content);
                    } else if store.dirs.remove(&from) {
                        store.dirs.insert(arg);
                    }
                    reply(&mut out, "250 rename successful")
                }
                None => reply(&mut out, "503 RNFR first"),
            },
            "SIZE" => {
                let size = store.lock().unwrap().files.get(&arg).map(|c| c.len());
                match size {
                    Some(size) => reply(&mut out, &format!("213 {}", size)),
                    None => reply(&mut out, "550 no such file"),
                }
            }
            "MDTM" => {
                let known = store.lock().unwrap().files.contains_key(&arg);
                if known {
                    reply(&mut out, "213 20200102030405")
                } else {
                    reply(&mut out, "550 no such file")
                }
            }
            "QUIT" => {
                reply(&mut out, "221 goodbye");
                return;
            }
            _ => reply(&mut out, "502 command not implemented"),
        };
        if !ok {
            return;
        }
    }
}
