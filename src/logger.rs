//! Console log backend for the `log` facade.
//!
//! Keeps the last lines in memory so a front end can render a console view,
//! echoes to stderr and optionally appends to a file.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

const MAX_CONSOLE_LINES: usize = 500;

pub struct ConsoleLog {
    lines: Mutex<VecDeque<String>>,
    file: Mutex<Option<File>>,
    echo: bool,
}

static CONSOLE: OnceLock<ConsoleLog> = OnceLock::new();

impl ConsoleLog {
    fn new(echo: bool) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(MAX_CONSOLE_LINES)),
            file: Mutex::new(None),
            echo,
        }
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push_back(line);
            while lines.len() > MAX_CONSOLE_LINES {
                lines.pop_front();
            }
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Log for ConsoleLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] [{}] {}", timestamp_now(), record.level(), record.args());
        if self.echo {
            eprintln!("{}", line);
        }
        if let Ok(mut file) = self.file.lock() {
            if let Some(f) = file.as_mut() {
                let _ = writeln!(f, "{}", line);
            }
        }
        self.push(line);
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            if let Some(f) = file.as_mut() {
                let _ = f.flush();
            }
        }
    }
}

/// Install the console logger. Later calls only adjust the level.
pub fn init(level: LevelFilter, echo: bool) {
    let console = CONSOLE.get_or_init(|| ConsoleLog::new(echo));
    let _ = log::set_logger(console);
    log::set_max_level(level);
}

/// Mirror log lines into `path` (appending)
pub fn attach_file(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if let Some(console) = CONSOLE.get() {
        if let Ok(mut slot) = console.file.lock() {
            *slot = Some(file);
        }
    }
    Ok(())
}

/// Snapshot of the in-memory console
pub fn console_lines() -> Vec<String> {
    CONSOLE.get().map(ConsoleLog::lines).unwrap_or_default()
}

/// Local time as HH:MM:SS
fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_keeps_last_lines() {
        let console = ConsoleLog::new(false);
        for i in 0..(MAX_CONSOLE_LINES + 5) {
            console.push(format!("line {}", i));
        }
        let lines = console.lines();
        assert_eq!(lines.len(), MAX_CONSOLE_LINES);
        assert_eq!(lines[0], "line 5");
    }
}
