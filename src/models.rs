//! Data models for the Xtream catalog engine

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

/// Content partition of a provider catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentType {
    Live,
    Movie,
    Series,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [ContentType::Live, ContentType::Movie, ContentType::Series];

    /// Path segment used in playable URLs
    pub fn stream_type(&self) -> &'static str {
        match self {
            ContentType::Live => "live",
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }

    pub fn categories_action(&self) -> &'static str {
        match self {
            ContentType::Live => "get_live_categories",
            ContentType::Movie => "get_vod_categories",
            ContentType::Series => "get_series_categories",
        }
    }

    pub fn streams_action(&self) -> &'static str {
        match self {
            ContentType::Live => "get_live_streams",
            ContentType::Movie => "get_vod_streams",
            ContentType::Series => "get_series",
        }
    }

    /// Container used when the provider omits one
    pub fn default_extension(&self) -> &'static str {
        match self {
            ContentType::Live => "ts",
            ContentType::Movie | ContentType::Series => "mp4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Live => "LIVE",
            ContentType::Movie => "Movies",
            ContentType::Series => "Series",
        }
    }

    /// Only series drill down into seasons and episodes
    pub fn supports_drill_down(&self) -> bool {
        matches!(self, ContentType::Series)
    }
}

/// One value per content type, indexable by [`ContentType`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ByType<T> {
    pub live: T,
    pub movie: T,
    pub series: T,
}

impl<T> ByType<T> {
    pub fn from_fn(mut f: impl FnMut(ContentType) -> T) -> Self {
        Self {
            live: f(ContentType::Live),
            movie: f(ContentType::Movie),
            series: f(ContentType::Series),
        }
    }

    pub fn get(&self, content_type: ContentType) -> &T {
        match content_type {
            ContentType::Live => &self.live,
            ContentType::Movie => &self.movie,
            ContentType::Series => &self.series,
        }
    }

    pub fn get_mut(&mut self, content_type: ContentType) -> &mut T {
        match content_type {
            ContentType::Live => &mut self.live,
            ContentType::Movie => &mut self.movie,
            ContentType::Series => &mut self.series,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContentType, &T)> {
        ContentType::ALL.into_iter().map(move |ct| (ct, self.get(ct)))
    }
}

impl<T> Index<ContentType> for ByType<T> {
    type Output = T;

    fn index(&self, content_type: ContentType) -> &T {
        self.get(content_type)
    }
}

impl<T> IndexMut<ContentType> for ByType<T> {
    fn index_mut(&mut self, content_type: ContentType) -> &mut T {
        self.get_mut(content_type)
    }
}

/// Catalog category. `id == None` is the synthetic "All" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Option<String>,
    pub name: String,
}

pub const ALL_CATEGORIES_LABEL: &str = "All";

impl Category {
    pub fn all() -> Self {
        Self {
            id: None,
            name: ALL_CATEGORIES_LABEL.to_string(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.id.is_none()
    }

    /// Exact category id match; the sentinel matches everything
    pub fn matches(&self, entry: &StreamEntry) -> bool {
        match &self.id {
            None => true,
            Some(id) => entry.category_id.as_deref() == Some(id.as_str()),
        }
    }
}

/// Category object as sent by `get_*_categories`
#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_name: Option<String>,
}

impl RawCategory {
    pub fn into_category(self) -> Option<Category> {
        let id = self.category_id?;
        Some(Category {
            name: self.category_name.unwrap_or_else(|| id.clone()),
            id: Some(id),
        })
    }
}

/// Stream/series object as sent by `get_live_streams`, `get_vod_streams` and `get_series`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cover: Option<String>,
}

impl RawEntry {
    /// Series listings carry `series_id`, everything else `stream_id`
    pub fn id(&self) -> Option<&str> {
        self.stream_id.as_deref().or(self.series_id.as_deref())
    }
}

/// Playable catalog entry. Immutable once built by the catalog store.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: Option<String>,
    pub name: String,
    pub category_id: Option<String>,
    pub content_type: ContentType,
    pub stream_type_hint: String,
    pub container_extension: String,
    pub playable_url: Option<String>,
    pub epg_channel_id: Option<String>,
    pub icon: Option<String>,
}

/// Credentials baked into playable URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrls {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl StreamUrls {
    /// `{server}/{stream_type}/{user}/{pass}/{id}.{ext}`
    pub fn playable(&self, stream_type: &str, id: &str, extension: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.server, stream_type, self.username, self.password, id, extension
        )
    }
}

/// Single series episode
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub season_number: String,
    pub episode_number: u32,
    pub container_extension: String,
    pub playable_url: Option<String>,
}

impl Episode {
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            format!("Episode {}", self.episode_number)
        } else {
            self.title.clone()
        }
    }
}

/// Descriptive block of `get_series_info`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesDetails {
    pub name: String,
    pub cover: Option<String>,
    pub plot: Option<String>,
    pub cast: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub rating: Option<String>,
    pub episode_run_time: Option<String>,
    pub youtube_trailer: Option<String>,
    pub tmdb: Option<String>,
}

/// Seasons and episodes of one series, fetched lazily on first drill-down
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesInfo {
    pub series_id: String,
    pub seasons: BTreeMap<String, Vec<Episode>>,
    pub details: SeriesDetails,
}

impl SeriesInfo {
    /// Season keys ordered by numeric value, non-numeric keys last
    pub fn sorted_season_numbers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.seasons.keys().cloned().collect();
        keys.sort_by(|a, b| {
            match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            }
        });
        keys
    }

    pub fn episodes(&self, season: &str) -> &[Episode] {
        self.seasons.get(season).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Movie details from `get_vod_info`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VodInfo {
    pub vod_id: String,
    pub name: String,
    pub cover: Option<String>,
    pub release_date: Option<String>,
    pub country: Option<String>,
    pub genre: Option<String>,
    pub duration: Option<String>,
    pub rating: Option<String>,
    pub director: Option<String>,
    pub cast: Option<String>,
    pub description: Option<String>,
    pub youtube_trailer: Option<String>,
    pub tmdb_id: Option<String>,
}

/// User account information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo {
    pub username: Option<String>,
    pub password: Option<String>,
    pub status: Option<String>,
    pub max_connections: Option<String>,
    pub active_connections: Option<String>,
    pub is_trial: Option<String>,
    pub expiry: Option<String>,
    pub created_at: Option<String>,
}

/// Server information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerInfo {
    pub url: Option<String>,
    pub port: Option<String>,
    pub timezone: Option<String>,
}

/// Result of the action-less `player_api.php` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountInfo {
    pub user: UserInfo,
    pub server: ServerInfo,
}

impl AccountInfo {
    pub fn from_value(value: &Value) -> Self {
        let user = value.get("user_info");
        let server = value.get("server_info");
        let field = |obj: Option<&Value>, key: &str| obj.and_then(|o| o.get(key)).and_then(value_to_string);

        Self {
            user: UserInfo {
                username: field(user, "username"),
                password: field(user, "password"),
                status: field(user, "status"),
                max_connections: field(user, "max_connections"),
                active_connections: field(user, "active_cons"),
                is_trial: field(user, "is_trial"),
                expiry: field(user, "exp_date"),
                created_at: field(user, "created_at"),
            },
            server: ServerInfo {
                url: field(server, "url"),
                port: field(server, "port"),
                timezone: field(server, "timezone"),
            },
        }
    }

    pub fn host(&self) -> String {
        match (&self.server.url, &self.server.port) {
            (Some(url), Some(port)) => format!("http://{}:{}", url, port),
            _ => "Unknown".to_string(),
        }
    }

    /// Human readable lines for an account/info panel
    pub fn summary_lines(&self) -> Vec<String> {
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "Unknown".to_string());
        let trial = if self.user.is_trial.as_deref() == Some("1") { "Yes" } else { "No" };

        vec![
            format!("Host: {}", self.host()),
            format!("Username: {}", or_unknown(&self.user.username)),
            format!("Password: {}", or_unknown(&self.user.password)),
            format!("Max Connections: {}", or_unknown(&self.user.max_connections)),
            format!("Active Connections: {}", or_unknown(&self.user.active_connections)),
            format!("Timezone: {}", or_unknown(&self.server.timezone)),
            format!("Trial: {}", trial),
            format!("Status: {}", or_unknown(&self.user.status)),
            format!("Created At: {}", format_date(self.user.created_at.as_deref())),
            format!("Expiry: {}", format_date(self.user.expiry.as_deref())),
        ]
    }
}

/// Format a unix timestamp string as "January 15, 2024"
pub fn format_date(ts: Option<&str>) -> String {
    use chrono::{Local, TimeZone};

    ts.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|ts| *ts > 0)
        .and_then(|ts| Local.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// JSON scalar as string; providers mix numbers and strings freely
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_entry_accepts_numbers_and_strings() {
        let json = r#"[
            {"stream_id": 5, "name": "News", "category_id": "3", "stream_type": "live"},
            {"series_id": "77", "name": "Show", "category_id": 9, "cover": null}
        ]"#;
        let entries: Vec<RawEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].id(), Some("5"));
        assert_eq!(entries[0].category_id.as_deref(), Some("3"));
        assert_eq!(entries[1].id(), Some("77"));
        assert_eq!(entries[1].category_id.as_deref(), Some("9"));
        assert_eq!(entries[1].cover, None);
    }

    #[test]
    fn test_season_numbers_sort_numerically() {
        let mut info = SeriesInfo::default();
        for season in ["10", "2", "1"] {
            info.seasons.insert(season.to_string(), Vec::new());
        }
        assert_eq!(info.sorted_season_numbers(), vec!["1", "2", "10"]);
    }

    #[test]
    fn test_account_summary() {
        let value: Value = serde_json::from_str(
            r#"{"user_info": {"username": "u", "password": "p", "max_connections": "2",
                "active_cons": 0, "status": "Active", "exp_date": null, "is_trial": "1",
                "created_at": "1700000000"},
               "server_info": {"url": "h.example", "port": 8080, "timezone": "UTC"}}"#,
        )
        .unwrap();
        let info = AccountInfo::from_value(&value);
        let lines = info.summary_lines();
        assert_eq!(lines[0], "Host: http://h.example:8080");
        assert_eq!(lines[4], "Active Connections: 0");
        assert_eq!(lines[6], "Trial: Yes");
        assert_eq!(lines[9], "Expiry: Unknown");
        assert!(!lines[8].ends_with("Unknown"));
    }

    #[test]
    fn test_by_type_indexing() {
        let mut counts: ByType<usize> = ByType::default();
        counts[ContentType::Series] += 2;
        assert_eq!(counts.get(ContentType::Series), &2);
        assert_eq!(counts.iter().map(|(_, c)| *c).sum::<usize>(), 2);
    }
}
