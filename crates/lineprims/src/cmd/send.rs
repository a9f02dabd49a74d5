use std::time::Duration;

use lineprims::channel::{connect, DuplexChannel};
use lineprims::conn::{Connection, ConnectionConfig};
use lineprims::stream::Lines;

use crate::cmd::{parse_delimiters, parse_duration, SendArgs};
use crate::exit::{channel_error, connection_error, wait_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_token, OutputFormat};

const TERMINATOR: &str = "\r\n";

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let config = ConnectionConfig {
        delimiters: parse_delimiters(&args.delimiters)?,
        write_timeout: Some(wait_timeout),
        ..ConnectionConfig::default()
    };

    let stream = connect(&args.path).map_err(|err| channel_error("connect failed", err))?;
    let conn = Connection::with_config(stream, config)
        .map_err(|err| connection_error("connection setup failed", err))?;

    // Subscribe before sending; the stream does not replay.
    let mut reply = args.wait.then(|| conn.observe_string_stream());

    let payload = build_payload(&args.data, args.no_terminator);
    if !conn.send_str(&payload) {
        return Err(CliError::new(FAILURE, "send failed: connection closed"));
    }
    tracing::debug!(size = payload.len(), "sent");

    if let Some(lines) = reply.as_mut() {
        let token = wait_for_reply(&conn, lines, wait_timeout)?;
        print_token(&token, 1, format);
    }

    conn.close();
    Ok(SUCCESS)
}

fn build_payload(data: &str, no_terminator: bool) -> String {
    if no_terminator {
        data.to_string()
    } else {
        format!("{data}{TERMINATOR}")
    }
}

fn wait_for_reply<C: DuplexChannel>(
    conn: &Connection<C>,
    lines: &mut Lines,
    timeout: Duration,
) -> CliResult<String> {
    match lines.recv_timeout(timeout) {
        Ok(Some(token)) => Ok(token),
        Ok(None) => Err(CliError::new(FAILURE, "peer closed before replying")),
        Err(err) => {
            tracing::debug!(connected = conn.is_connected(), "no reply");
            Err(wait_error("receive failed", &err))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    use super::*;
    use crate::exit::TIMEOUT;

    #[test]
    fn payload_gets_cr_lf_unless_disabled() {
        assert_eq!(build_payload("hi", false), "hi\r\n");
        assert_eq!(build_payload("hi", true), "hi");
    }

    #[test]
    fn reply_is_first_token() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let conn = Connection::new(local).unwrap();
        let mut lines = conn.observe_string_stream();
        remote.write_all(b"pong\r\nextra\r\n").unwrap();

        let token = wait_for_reply(&conn, &mut lines, Duration::from_secs(5)).unwrap();
        assert_eq!(token, "pong");
    }

    #[test]
    fn silent_peer_times_out() {
        let (local, _remote) = UnixStream::pair().unwrap();
        let conn = Connection::new(local).unwrap();
        let mut lines = conn.observe_string_stream();

        let err = wait_for_reply(&conn, &mut lines, Duration::from_millis(50)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn closed_peer_is_failure() {
        let (local, remote) = UnixStream::pair().unwrap();
        let conn = Connection::new(local).unwrap();
        let mut lines = conn.observe_string_stream();
        drop(remote);

        let err = wait_for_reply(&conn, &mut lines, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.code, FAILURE);
    }
}
