use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One received token, as printed by `listen` and `send --wait`.
#[derive(Serialize, Debug)]
pub struct TokenOutput<'a> {
    pub token: &'a str,
    pub length: usize,
    pub connection: u64,
    pub timestamp: String,
}

impl<'a> TokenOutput<'a> {
    pub fn new(token: &'a str, connection: u64) -> Self {
        Self {
            token,
            length: token.len(),
            connection,
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_token(token: &str, connection: u64, format: OutputFormat) {
    let out = TokenOutput::new(token, connection);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CONNECTION", "LENGTH", "TOKEN"])
                .add_row(vec![
                    out.connection.to_string(),
                    out.length.to_string(),
                    out.token.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "connection={} length={} token={:?}",
                out.connection, out.length, out.token
            );
        }
        OutputFormat::Raw => print_raw(token),
    }
}

/// Token text followed by a newline, nothing else.
pub fn print_raw(token: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(token.as_bytes());
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
