use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lineprims::channel::UnixChannelListener;
use lineprims::conn::{Connection, ConnectionConfig};

use crate::cmd::{for_each_token, install_ctrlc_handler, parse_delimiters, ListenArgs, SessionEnd};
use crate::exit::{channel_error, connection_error, CliResult, SUCCESS};
use crate::output::{print_token, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ConnectionConfig {
        delimiters: parse_delimiters(&args.delimiters)?,
        ..ConnectionConfig::default()
    };
    let listener =
        UnixChannelListener::bind(&args.path).map_err(|err| channel_error("bind failed", err))?;
    tracing::info!(path = %listener.path().display(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut connection_id = 0u64;

    while running.load(Ordering::SeqCst) {
        let stream = listener
            .accept()
            .map_err(|err| channel_error("accept failed", err))?;
        connection_id += 1;
        let conn = Connection::with_config(stream, config.clone())
            .map_err(|err| connection_error("connection setup failed", err))?;
        tracing::debug!(connection = connection_id, "accepted connection");

        let end = for_each_token(&conn, &running, |token| {
            print_token(&token, connection_id, format);
            printed = printed.saturating_add(1);
            match args.count {
                Some(count) if printed >= count => ControlFlow::Break(SessionEnd::Done),
                _ => ControlFlow::Continue(()),
            }
        });

        match end {
            SessionEnd::Done | SessionEnd::Interrupted => break,
            SessionEnd::PeerClosed => {
                tracing::debug!(connection = connection_id, "connection ended");
            }
        }
    }

    Ok(SUCCESS)
}
