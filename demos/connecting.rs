use std::io::Cursor;

use ftp_session::{ConnectionEvent, FtpSession, Result, SessionConfig};

fn test_ftp(addr: &str, user: &str, pass: &str) -> Result<()> {
    let session = FtpSession::new(SessionConfig::new(addr, user, pass));
    let events = session.subscribe();
    session.open()?;
    if let Ok(ConnectionEvent::Opened) = events.try_recv() {
        println!("connected to {}", addr);
    }
    println!("current dir: {}", session.pwd()?);

    session.cwd("test_data")?;
    println!("files: {:?}", session.list_entries(".")?);

    // An easy way to retrieve a file
    let mut buffer = Vec::new();
    session.download("ftpext-charter.txt", &mut buffer)?;
    println!("got data: {}", String::from_utf8_lossy(&buffer));

    // Store a file
    let file_data = "Some awesome file data man!!";
    let mut reader = Cursor::new(file_data.as_bytes());
    session.upload(&mut reader, "uploads/my_random_file.txt", true)?;

    session.close();
    Ok(())
}

fn main() {
    env_logger::init();
    test_ftp("127.0.0.1", "Doe", "mumble").unwrap_or_else(|err| panic!("{}", err));
    println!("test successful")
}
