use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lineprims::channel::UnixChannelListener;
use lineprims::conn::{Connection, ConnectionConfig};

use crate::cmd::{for_each_token, install_ctrlc_handler, parse_delimiters, EchoArgs, SessionEnd};
use crate::exit::{channel_error, connection_error, CliResult, SUCCESS};

const TERMINATOR: &str = "\r\n";
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let config = ConnectionConfig {
        delimiters: parse_delimiters(&args.delimiters)?,
        write_timeout: Some(WRITE_TIMEOUT),
        ..ConnectionConfig::default()
    };
    let listener =
        UnixChannelListener::bind(&args.path).map_err(|err| channel_error("bind failed", err))?;
    tracing::info!(path = %listener.path().display(), "echo server listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let stream = listener
            .accept()
            .map_err(|err| channel_error("accept failed", err))?;
        let conn = Connection::with_config(stream, config.clone())
            .map_err(|err| connection_error("connection setup failed", err))?;

        let end = for_each_token(&conn, &running, |token| echo_token(&conn, &token));
        if end == SessionEnd::Interrupted {
            break;
        }
    }

    Ok(SUCCESS)
}

fn echo_token<C: lineprims::channel::DuplexChannel>(
    conn: &Connection<C>,
    token: &str,
) -> ControlFlow<SessionEnd> {
    tracing::info!(size = token.len(), "echoing token");
    if conn.send_str(&format!("{token}{TERMINATOR}")) {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(SessionEnd::PeerClosed)
    }
}
