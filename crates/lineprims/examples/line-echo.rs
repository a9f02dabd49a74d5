//! Line echo server: accepts one connection and echoes every line back.
//!
//! Run with:
//!   cargo run --example line-echo
//!
//! In another terminal:
//!   cargo run --features cli -- send <printed path> --data hello --wait

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::fs;

    use lineprims::channel::UnixChannelListener;
    use lineprims::conn::Connection;

    let sock_dir = std::env::temp_dir().join(format!("lineprims-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixChannelListener::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    let conn = Connection::new(listener.accept()?)?;
    eprintln!("Peer connected");

    for token in conn.observe_string_stream() {
        match token {
            Ok(line) if line.is_empty() => {}
            Ok(line) => {
                eprintln!("Received {} bytes", line.len());
                if !conn.send_str(&format!("{line}\r\n")) {
                    break;
                }
            }
            Err(err) => {
                eprintln!("Peer disconnected: {err}");
                break;
            }
        }
    }

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("line-echo needs Unix domain sockets");
}
