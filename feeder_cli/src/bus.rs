//! Line-oriented stand-in for the broker: commands in on stdin, publications
//! out on stdout as JSON lines.

use std::io::{self, BufRead, Write};
use std::thread;

use feeder_core::{ChannelHandle, Published};

/// Split `<topic> <payload>`. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((topic, payload)) => Some((topic, payload.trim())),
        None => Some((line, "")),
    }
}

/// Forward stdin lines onto the bus until EOF or until the loop side is gone.
pub fn spawn_stdin_reader(handle: ChannelHandle) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-bus".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed; no more commands");
                        break;
                    }
                };
                let Some((topic, payload)) = parse_line(&line) else {
                    continue;
                };
                tracing::debug!(topic, "inbound");
                if !handle.send(topic, payload) {
                    break;
                }
            }
            tracing::debug!("stdin closed");
        })
}

/// One JSON object per line: `{"topic","payload","retain"}`.
pub fn write_published<W: Write>(out: &mut W, items: &[Published]) -> io::Result<()> {
    for p in items {
        serde_json::to_writer(&mut *out, p)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Drain the bus to stdout. Output errors are logged, not fatal.
pub fn flush_to_stdout(handle: &ChannelHandle) {
    let items = handle.drain();
    if items.is_empty() {
        return;
    }
    let stdout = io::stdout();
    if let Err(e) = write_published(&mut stdout.lock(), &items) {
        tracing::warn!(error = %e, dropped = items.len(), "stdout write failed");
    }
}
