//! XMLTV parser.
//! Streams events with quick-xml; tolerant of broken providers: plain or
//! gzip-compressed input, illegal control characters and bare ampersands.

use flate2::read::GzDecoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::{BufRead, Read};

const MAX_STORED_ERRORS: usize = 50;

/// A single TV program/show
#[derive(Debug, Clone, PartialEq)]
pub struct EpgProgram {
    /// Channel id as written in the `channel` attribute (trimmed)
    pub channel_id: String,
    /// Start time as Unix timestamp
    pub start: i64,
    /// End time as Unix timestamp
    pub stop: i64,
    pub title: String,
    pub description: String,
    /// Category/genre (optional)
    pub category: Option<String>,
    /// Episode info (optional) e.g., "S01E05"
    pub episode: Option<String>,
}

impl EpgProgram {
    /// Both ends inclusive
    pub fn is_airing(&self, at: i64) -> bool {
        self.start <= at && at <= self.stop
    }
}

/// `<channel>` element with all of its display names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpgChannel {
    pub id: String,
    pub display_names: Vec<String>,
}

/// What went wrong while parsing, without aborting the parse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpgParseReport {
    /// First XML errors encountered (up to 50)
    pub errors: Vec<String>,
    /// Total count of XML errors
    pub error_count: usize,
    /// Programmes dropped for a missing channel or unparseable time
    pub skipped_programs: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedGuide {
    pub channels: Vec<EpgChannel>,
    pub programs: Vec<EpgProgram>,
    pub report: EpgParseReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    Programme,
    Title,
    Desc,
    Category,
    DisplayName,
    EpisodeNum,
}

impl ParserState {
    fn collects_text(&self) -> bool {
        matches!(
            self,
            ParserState::Title
                | ParserState::Desc
                | ParserState::Category
                | ParserState::DisplayName
                | ParserState::EpisodeNum
        )
    }
}

/// Programme being assembled; validated at its end tag
#[derive(Default)]
struct PendingProgram {
    channel: String,
    start: Option<i64>,
    stop: Option<i64>,
    title: String,
    description: String,
    category: Option<String>,
    episode: Option<String>,
}

/// Parse raw feed bytes, decompressing gzip input first
pub fn parse_bytes(bytes: &[u8]) -> ParsedGuide {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut xml = Vec::new();
        if let Err(e) = GzDecoder::new(bytes).read_to_end(&mut xml) {
            let mut guide = ParsedGuide::default();
            guide.report.error_count = 1;
            guide.report.errors.push(format!("Gzip decode failed: {}", e));
            return guide;
        }
        parse_reader(sanitize_xml(&xml).as_slice())
    } else {
        parse_reader(sanitize_xml(bytes).as_slice())
    }
}

pub fn parse_reader<R: BufRead>(reader: R) -> ParsedGuide {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text(false);

    let mut guide = ParsedGuide::default();
    let mut buf = Vec::with_capacity(8192);

    let mut state = ParserState::Root;
    let mut channel: Option<EpgChannel> = None;
    let mut program: Option<PendingProgram> = None;
    let mut text_buf = String::new();
    let mut last_error_pos: Option<u64> = None;

    loop {
        let position = xml_reader.buffer_position();
        match xml_reader.read_event_into(&mut buf) {
            // Self-closing elements carry no text or children worth keeping
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"channel" => {
                    state = ParserState::Channel;
                    channel = Some(EpgChannel {
                        id: get_attribute(e, b"id").map(|id| id.trim().to_string()).unwrap_or_default(),
                        display_names: Vec::new(),
                    });
                }
                b"programme" => {
                    state = ParserState::Programme;
                    program = Some(PendingProgram {
                        channel: get_attribute(e, b"channel").map(|c| c.trim().to_string()).unwrap_or_default(),
                        start: get_attribute(e, b"start").and_then(|s| parse_xmltv_time(&s)),
                        stop: get_attribute(e, b"stop").and_then(|s| parse_xmltv_time(&s)),
                        ..Default::default()
                    });
                }
                b"title" if state == ParserState::Programme => {
                    state = ParserState::Title;
                    text_buf.clear();
                }
                b"desc" if state == ParserState::Programme => {
                    state = ParserState::Desc;
                    text_buf.clear();
                }
                b"category" if state == ParserState::Programme => {
                    state = ParserState::Category;
                    text_buf.clear();
                }
                b"episode-num" if state == ParserState::Programme => {
                    state = ParserState::EpisodeNum;
                    text_buf.clear();
                }
                b"display-name" if state == ParserState::Channel => {
                    state = ParserState::DisplayName;
                    text_buf.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if state.collects_text() {
                    text_buf.push_str(&decode_xml_entities(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::CData(e)) => {
                if state.collects_text() {
                    text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if state.collects_text() {
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        text_buf.push(ch);
                    } else if let Ok(name) = e.decode() {
                        match resolve_predefined_entity(&name) {
                            Some(s) => text_buf.push_str(s),
                            None if name == "nbsp" => text_buf.push(' '),
                            None => {}
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"channel" => {
                    if let Some(ch) = channel.take() {
                        if !ch.id.is_empty() {
                            guide.channels.push(ch);
                        }
                    }
                    state = ParserState::Root;
                }
                b"programme" => {
                    if let Some(pending) = program.take() {
                        match (pending.channel.is_empty(), pending.start, pending.stop) {
                            (false, Some(start), Some(stop)) => guide.programs.push(EpgProgram {
                                channel_id: pending.channel,
                                start,
                                stop,
                                title: pending.title,
                                description: pending.description,
                                category: pending.category,
                                episode: pending.episode,
                            }),
                            _ => guide.report.skipped_programs += 1,
                        }
                    }
                    state = ParserState::Root;
                }
                b"title" if state == ParserState::Title => {
                    if let Some(ref mut p) = program {
                        if p.title.is_empty() {
                            p.title = text_buf.trim().to_string();
                        }
                    }
                    state = ParserState::Programme;
                }
                b"desc" if state == ParserState::Desc => {
                    if let Some(ref mut p) = program {
                        p.description = text_buf.trim().to_string();
                    }
                    state = ParserState::Programme;
                }
                b"category" if state == ParserState::Category => {
                    if let Some(ref mut p) = program {
                        let cat = text_buf.trim();
                        if !cat.is_empty() && p.category.is_none() {
                            p.category = Some(cat.to_string());
                        }
                    }
                    state = ParserState::Programme;
                }
                b"episode-num" if state == ParserState::EpisodeNum => {
                    if let Some(ref mut p) = program {
                        let ep = format_episode(text_buf.trim());
                        if !ep.is_empty() {
                            p.episode = Some(ep);
                        }
                    }
                    state = ParserState::Programme;
                }
                b"display-name" if state == ParserState::DisplayName => {
                    if let Some(ref mut ch) = channel {
                        let name = text_buf.trim();
                        if !name.is_empty() {
                            ch.display_names.push(name.to_string());
                        }
                    }
                    state = ParserState::Channel;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                guide.report.error_count += 1;
                if guide.report.errors.len() < MAX_STORED_ERRORS {
                    guide.report.errors.push(format!("XML error at byte {}: {}", position, e));
                }
                // Drop the element being built and resync at the next one
                channel = None;
                program = None;
                state = ParserState::Root;
                text_buf.clear();

                let now = xml_reader.buffer_position();
                if now == position || last_error_pos == Some(now) {
                    break;
                }
                last_error_pos = Some(now);
            }
            _ => {}
        }
        buf.clear();
    }

    guide
}

/// Replace illegal XML 1.0 control characters with spaces and escape bare `&`.
/// Legal XML 1.0: #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
pub fn sanitize_xml(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 64);
    for (i, &b) in input.iter().enumerate() {
        match b {
            0x09 | 0x0A | 0x0D => out.push(b),
            0x00..=0x1F | 0x7F => out.push(b' '),
            b'&' if !is_valid_entity_start(&input[i..]) => out.extend_from_slice(b"&amp;"),
            _ => out.push(b),
        }
    }
    out
}

/// Check if bytes starting with & look like an XML entity
fn is_valid_entity_start(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }
    if bytes[1] == b'#' {
        return true;
    }
    let mut end = 1;
    while end < bytes.len() && end < 10 {
        match bytes[end] {
            b';' => return end > 1,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => end += 1,
            _ => return false,
        }
    }
    false
}

/// Decode entities that survived as literal text
fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| decode_xml_entities(&String::from_utf8_lossy(attr.value.as_ref())))
}

/// Parse XMLTV time: "20240115120000 +0000" (zone optional, UTC assumed) -> Unix timestamp
pub fn parse_xmltv_time(time_str: &str) -> Option<i64> {
    use chrono::{DateTime, NaiveDateTime};

    let time_str = time_str.trim();
    if time_str.len() < 14 || !time_str.is_char_boundary(14) {
        return None;
    }
    let (datetime, zone) = time_str.split_at(14);
    let zone = zone.trim();

    if zone.is_empty() {
        return NaiveDateTime::parse_from_str(datetime, "%Y%m%d%H%M%S")
            .ok()
            .map(|dt| dt.and_utc().timestamp());
    }
    DateTime::parse_from_str(&format!("{} {}", datetime, zone), "%Y%m%d%H%M%S %z")
        .ok()
        .map(|dt| dt.timestamp())
}

/// Format episode number (e.g., "0.4." -> "S01E05")
fn format_episode(episode: &str) -> String {
    let parts: Vec<&str> = episode.split('.').collect();

    if parts.len() >= 2 {
        let season = parts[0].trim().parse::<i32>().map(|s| s + 1).unwrap_or(0);
        let ep = parts[1].trim().parse::<i32>().map(|e| e + 1).unwrap_or(0);
        if season > 0 && ep > 0 {
            return format!("S{:02}E{:02}", season, ep);
        }
    }

    episode.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xmltv_time() {
        assert_eq!(parse_xmltv_time("20240115120000 +0000"), Some(1_705_320_000));
        assert_eq!(parse_xmltv_time("20240115120000"), Some(1_705_320_000));

        let plus_one = parse_xmltv_time("20240115120000 +0100").unwrap();
        assert_eq!(1_705_320_000 - plus_one, 3600);

        assert_eq!(parse_xmltv_time("2024"), None);
        assert_eq!(parse_xmltv_time("2024011512000x +0000"), None);
    }

    #[test]
    fn test_format_episode() {
        assert_eq!(format_episode("0.4."), "S01E05");
        assert_eq!(format_episode("1.9.0"), "S02E10");
        assert_eq!(format_episode("S3E2"), "S3E2");
    }

    #[test]
    fn test_parse_channels_and_programmes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="bbc1">
    <display-name>BBC One</display-name>
    <display-name>BBC 1 HD</display-name>
  </channel>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="bbc1">
    <title>News &amp; Weather</title>
    <desc>Daily news broadcast</desc>
    <category>News</category>
    <episode-num system="xmltv_ns">0.4.</episode-num>
  </programme>
</tv>"#;

        let guide = parse_bytes(xml.as_bytes());
        assert_eq!(guide.channels.len(), 1);
        assert_eq!(guide.channels[0].display_names, vec!["BBC One", "BBC 1 HD"]);
        assert_eq!(guide.programs.len(), 1);
        let p = &guide.programs[0];
        assert_eq!(p.title, "News & Weather");
        assert_eq!(p.description, "Daily news broadcast");
        assert_eq!(p.category.as_deref(), Some("News"));
        assert_eq!(p.episode.as_deref(), Some("S01E05"));
        assert_eq!(p.stop - p.start, 3600);
    }

    #[test]
    fn test_malformed_programmes_are_skipped() {
        let xml = r#"<tv>
  <programme start="20240115120000" stop="20240115130000" channel="ch1"><title>Kept</title></programme>
  <programme start="20240115130000" stop="20240115140000"><title>No channel</title></programme>
  <programme start="garbage" stop="20240115140000" channel="ch1"><title>Bad start</title></programme>
  <programme start="20240115140000" channel="ch1"><title>No stop</title></programme>
</tv>"#;
        let guide = parse_bytes(xml.as_bytes());
        assert_eq!(guide.programs.len(), 1);
        assert_eq!(guide.programs[0].title, "Kept");
        assert_eq!(guide.report.skipped_programs, 3);
    }

    #[test]
    fn test_sanitize_bare_ampersand_and_controls() {
        let xml = b"<tv><programme start=\"20240115120000\" stop=\"20240115130000\" channel=\"c\"><title>Tom & Jerry\x01</title></programme></tv>";
        let guide = parse_bytes(xml);
        assert_eq!(guide.programs[0].title, "Tom & Jerry");
    }

    #[test]
    fn test_gzip_input() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let xml = r#"<tv><channel id="a"><display-name>A</display-name></channel></tv>"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        let guide = parse_bytes(&gz);
        assert_eq!(guide.channels.len(), 1);
    }

    #[test]
    fn test_garbage_document_yields_nothing() {
        let guide = parse_bytes(b"this is not xml </tv> <<<");
        assert!(guide.channels.is_empty());
        assert!(guide.programs.is_empty());
    }
}
