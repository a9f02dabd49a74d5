use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use lineprims::channel::DuplexChannel;
use lineprims::conn::Connection;
use lineprims::stream::{Delimiters, WaitError};

use crate::exit::{stream_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// How often blocking loops wake up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and echo every received token back.
    Echo(EchoArgs),
    /// Connect, send one line and optionally wait for a reply.
    Send(SendArgs),
    /// Accept connections and print received tokens.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Token delimiters: comma-separated byte values or cr, lf, nul, tab.
    #[arg(long, default_value = "cr,lf")]
    pub delimiters: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Text to send.
    #[arg(long)]
    pub data: String,
    /// Do not append CR LF to the data.
    #[arg(long)]
    pub no_terminator: bool,
    /// Wait for one response token and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Delimiters used to frame the response.
    #[arg(long, default_value = "cr,lf")]
    pub delimiters: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after printing N tokens.
    #[arg(long)]
    pub count: Option<usize>,
    /// Token delimiters: comma-separated byte values or cr, lf, nul, tab.
    #[arg(long, default_value = "cr,lf")]
    pub delimiters: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Why a session over one accepted connection ended.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer went away or the connection failed.
    PeerClosed,
    /// Ctrl-C was pressed.
    Interrupted,
    /// The command has what it needs.
    Done,
}

/// Feed every token from `conn` to `on_token` until the stream ends, Ctrl-C
/// is pressed, or `on_token` breaks.
pub fn for_each_token<C, F>(
    conn: &Connection<C>,
    running: &AtomicBool,
    mut on_token: F,
) -> SessionEnd
where
    C: DuplexChannel,
    F: FnMut(String) -> ControlFlow<SessionEnd>,
{
    let mut lines = conn.observe_string_stream();
    while running.load(Ordering::SeqCst) {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(Some(token)) => {
                if let ControlFlow::Break(end) = on_token(token) {
                    return end;
                }
            }
            Ok(None) => {
                tracing::debug!("peer closed the connection");
                return SessionEnd::PeerClosed;
            }
            Err(WaitError::Timeout | WaitError::Empty) => {}
            Err(WaitError::Stream(err)) => {
                tracing::warn!(error = %err, "receive failed");
                return SessionEnd::PeerClosed;
            }
        }
    }
    SessionEnd::Interrupted
}

/// First Ctrl-C asks loops to stop; a second one exits right away, which
/// matters while blocked in `accept`.
pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

pub fn parse_delimiters(input: &str) -> CliResult<Delimiters> {
    let mut bytes = Vec::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let byte = match part.to_ascii_lowercase().as_str() {
            "cr" => b'\r',
            "lf" => b'\n',
            "nul" => 0,
            "tab" => b'\t',
            other => parse_byte(other)?,
        };
        bytes.push(byte);
    }
    Delimiters::new(bytes).map_err(|err| stream_error("invalid --delimiters", &err))
}

fn parse_byte(input: &str) -> CliResult<u8> {
    let parsed = match input.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid delimiter: {input}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn parse_delimiters_names_and_numbers() {
        let delimiters = parse_delimiters("cr, LF,nul,tab,59,0x7c").unwrap();
        assert_eq!(delimiters.as_bytes(), &[b'\r', b'\n', 0, b'\t', b';', b'|']);
    }

    #[test]
    fn parse_delimiters_rejects_garbage_and_empty() {
        assert_eq!(parse_delimiters("semicolon").unwrap_err().code, USAGE);
        assert_eq!(parse_delimiters("256").unwrap_err().code, USAGE);
        assert_eq!(parse_delimiters(" , ").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn for_each_token_stops_when_callback_breaks() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let conn = Connection::new(local).unwrap();
        let running = AtomicBool::new(true);
        remote.write_all(b"a\nb\nc\n").unwrap();

        let mut seen = Vec::new();
        let end = for_each_token(&conn, &running, |token| {
            seen.push(token);
            if seen.len() == 2 {
                ControlFlow::Break(SessionEnd::Done)
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(end, SessionEnd::Done);
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn for_each_token_reports_peer_close() {
        let (local, remote) = UnixStream::pair().unwrap();
        let conn = Connection::new(local).unwrap();
        drop(remote);

        let running = AtomicBool::new(true);
        let end = for_each_token(&conn, &running, |_| ControlFlow::Continue(()));
        assert_eq!(end, SessionEnd::PeerClosed);
    }

    #[test]
    fn for_each_token_honours_stop_flag() {
        let (local, _remote) = UnixStream::pair().unwrap();
        let conn = Connection::new(local).unwrap();

        let running = AtomicBool::new(false);
        let end = for_each_token(&conn, &running, |_| ControlFlow::Continue(()));
        assert_eq!(end, SessionEnd::Interrupted);
    }
}
