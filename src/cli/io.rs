//! JSON output for CLI commands
//!
//! One JSON object per command on stdout. Logs go to stderr.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

#[derive(Serialize)]
struct Response<'a, T> {
    status: &'static str,
    data: &'a T,
}

/// Write a success response to stdout
pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &Response { status: "ok", data })?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
