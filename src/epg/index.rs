//! Channel lookup tables built from one XMLTV fetch

use super::parser::{parse_bytes, EpgParseReport, EpgProgram};
use crate::models::StreamEntry;
use log::{info, warn};
use std::collections::HashMap;

/// Tokens that carry no identity when matching channel names
const NOISE_TOKENS: [&str; 4] = ["hd", "sd", "channel", "tv"];

/// Normalise a display name for fuzzy channel matching:
/// lowercase, strip punctuation, drop noise tokens, collapse whitespace.
pub fn normalize_channel_name(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped
        .split_whitespace()
        .filter(|token| !NOISE_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key used for `programs_by_channel`
pub fn normalize_channel_id(id: &str) -> String {
    id.trim().to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct EpgIndex {
    programs_by_channel: HashMap<String, Vec<EpgProgram>>,
    name_index: HashMap<String, String>,
    report: EpgParseReport,
}

impl EpgIndex {
    /// Build from raw feed bytes. Never fails: an unreadable document gives empty tables.
    pub fn build(xml: &[u8]) -> Self {
        let guide = parse_bytes(xml);

        let mut name_index: HashMap<String, String> = HashMap::new();
        for channel in &guide.channels {
            let id = normalize_channel_id(&channel.id);
            for name in &channel.display_names {
                let key = normalize_channel_name(name);
                if !key.is_empty() {
                    // First writer wins
                    name_index.entry(key).or_insert_with(|| id.clone());
                }
            }
        }

        let mut programs_by_channel: HashMap<String, Vec<EpgProgram>> = HashMap::new();
        for program in guide.programs {
            programs_by_channel
                .entry(normalize_channel_id(&program.channel_id))
                .or_default()
                .push(program);
        }
        for programs in programs_by_channel.values_mut() {
            programs.sort_by_key(|p| p.start);
        }

        if guide.report.error_count > 0 {
            warn!(
                "EPG parsed with {} XML errors (first: {})",
                guide.report.error_count,
                guide.report.errors.first().map(String::as_str).unwrap_or("-")
            );
        }
        info!(
            "EPG indexed - {} channels, {} names, {} programs, {} skipped",
            programs_by_channel.len(),
            name_index.len(),
            programs_by_channel.values().map(Vec::len).sum::<usize>(),
            guide.report.skipped_programs
        );

        Self {
            programs_by_channel,
            name_index,
            report: guide.report,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.programs_by_channel.is_empty()
    }

    pub fn report(&self) -> &EpgParseReport {
        &self.report
    }

    pub fn channel_count(&self) -> usize {
        self.programs_by_channel.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs_by_channel.values().map(Vec::len).sum()
    }

    pub fn programs(&self, channel_id: &str) -> &[EpgProgram] {
        self.programs_by_channel
            .get(&normalize_channel_id(channel_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Program airing at `as_of`, else the first one starting after it
    pub fn current_program(&self, channel_id: &str, as_of: i64) -> Option<&EpgProgram> {
        let programs = self.programs(channel_id);
        programs
            .iter()
            .find(|p| p.is_airing(as_of))
            .or_else(|| programs.iter().find(|p| p.start > as_of))
    }

    /// Airing program (if any) followed by the next ones, at most `count`
    pub fn upcoming(&self, channel_id: &str, as_of: i64, count: usize) -> Vec<&EpgProgram> {
        self.programs(channel_id)
            .iter()
            .filter(|p| p.stop >= as_of)
            .take(count)
            .collect()
    }

    /// Direct channel-id hit first, display-name match on miss
    pub fn resolve_channel_id(&self, raw_id: Option<&str>, display_name: &str) -> Option<String> {
        if let Some(raw) = raw_id.map(normalize_channel_id).filter(|id| !id.is_empty()) {
            if self.programs_by_channel.contains_key(&raw) {
                return Some(raw);
            }
        }
        self.name_index.get(&normalize_channel_name(display_name)).cloned()
    }

    /// "What's on" for a live catalog entry
    pub fn now_playing(&self, entry: &StreamEntry, as_of: i64) -> Option<&EpgProgram> {
        let channel_id = self.resolve_channel_id(entry.epg_channel_id.as_deref(), &entry.name)?;
        self.current_program(&channel_id, as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = r#"<tv>
  <channel id="nbc.us"><display-name>NBC HD</display-name><display-name>NBC East</display-name></channel>
  <channel id="cnn.us"><display-name>CNN</display-name></channel>
  <channel id="dup.us"><display-name>CNN International</display-name><display-name>C.N.N.</display-name></channel>
  <programme start="20240115130000 +0000" stop="20240115140000 +0000" channel="nbc.us"><title>Second</title></programme>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="nbc.us"><title>First</title></programme>
  <programme start="20240115160000 +0000" stop="20240115170000 +0000" channel="nbc.us"><title>Later</title></programme>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="cnn.us"><title>Headlines</title></programme>
</tv>"#;

    // 2024-01-15 12:00:00 UTC
    const NOON: i64 = 1_705_320_000;

    #[test]
    fn test_normalize_channel_name() {
        assert_eq!(normalize_channel_name(" NBC HD "), normalize_channel_name("nbc"));
        assert_eq!(normalize_channel_name("Sky  Sports   TV"), "sky sports");
        assert_eq!(normalize_channel_name("A&E Channel"), "ae");
        assert_eq!(normalize_channel_name("HDTV"), "hdtv");
    }

    #[test]
    fn test_programs_sorted_per_channel() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        let titles: Vec<&str> = index.programs("nbc.us").iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Later"]);
        assert_eq!(index.program_count(), 4);
    }

    #[test]
    fn test_resolve_raw_id_hit() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        assert_eq!(index.resolve_channel_id(Some("cnn.us"), "whatever"), Some("cnn.us".to_string()));
    }

    #[test]
    fn test_resolve_name_only_hit() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        assert_eq!(index.resolve_channel_id(Some("missing.id"), "nbc"), Some("nbc.us".to_string()));
        assert_eq!(index.resolve_channel_id(None, "NBC East HD"), Some("nbc.us".to_string()));
    }

    #[test]
    fn test_resolve_total_miss() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        assert_eq!(index.resolve_channel_id(Some("nope"), "Unknown Station"), None);
    }

    #[test]
    fn test_name_index_first_writer_wins() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        // "C.N.N." normalises to "cnn", already claimed by cnn.us
        assert_eq!(index.resolve_channel_id(None, "CNN"), Some("cnn.us".to_string()));
    }

    #[test]
    fn test_current_program_airing() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        let p = index.current_program("nbc.us", NOON + 30 * 60).unwrap();
        assert_eq!(p.title, "First");
        let p = index.current_program("nbc.us", NOON + 3600 + 1).unwrap();
        assert_eq!(p.title, "Second");
    }

    #[test]
    fn test_current_program_includes_stop_second() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        // cnn.us has a single 12:00-13:00 slot
        let p = index.current_program("cnn.us", NOON + 3600).unwrap();
        assert_eq!(p.title, "Headlines");
        assert!(index.current_program("cnn.us", NOON + 3600 + 1).is_none());
        // At a shared boundary the earlier slot wins
        let p = index.current_program("nbc.us", NOON + 3600).unwrap();
        assert_eq!(p.title, "First");
    }

    #[test]
    fn test_current_program_falls_back_to_next() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        // Gap between 14:00 and 16:00
        let p = index.current_program("nbc.us", NOON + 3 * 3600).unwrap();
        assert_eq!(p.title, "Later");
        let p = index.current_program("nbc.us", NOON - 3600).unwrap();
        assert_eq!(p.title, "First");
    }

    #[test]
    fn test_current_program_none() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        assert!(index.current_program("nbc.us", NOON + 10 * 3600).is_none());
        assert!(index.current_program("unknown", NOON).is_none());
    }

    #[test]
    fn test_upcoming() {
        let index = EpgIndex::build(GUIDE.as_bytes());
        let titles: Vec<&str> = index.upcoming("nbc.us", NOON + 60, 2).iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn test_unparseable_document_gives_empty_index() {
        let index = EpgIndex::build(b"<html><body>502 Bad Gateway");
        assert!(index.is_empty());
        assert!(index.resolve_channel_id(Some("x"), "x").is_none());
    }
}
