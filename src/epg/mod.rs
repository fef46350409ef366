//! EPG (Electronic Program Guide) module
//!
//! XMLTV parsing, the per-channel index and the on-disk cache.

mod cache;
mod index;
mod parser;

pub use cache::EpgCache;
pub use index::{normalize_channel_id, normalize_channel_name, EpgIndex};
pub use parser::{
    parse_bytes, parse_reader, parse_xmltv_time, sanitize_xml, EpgChannel, EpgParseReport, EpgProgram,
    ParsedGuide,
};

use chrono::{Local, TimeZone};

/// Format a Unix timestamp as local time HH:MM
pub fn format_time(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// "HH:MM - HH:MM  Title"
pub fn format_program_line(program: &EpgProgram) -> String {
    format!("{} - {}  {}", format_time(program.start), format_time(program.stop), program.title)
}
