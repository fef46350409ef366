//! Xtream Codes API client

use crate::credentials::Credentials;
use crate::epg::EpgCache;
use crate::error::FetchError;
use crate::models::{
    value_to_string, AccountInfo, ByType, Category, ContentType, Episode, RawCategory, RawEntry,
    SeriesDetails, SeriesInfo, StreamUrls, VodInfo,
};
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// Provider catalogs routinely exceed ureq's 10 MB default body limit
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

/// Blocking GET seam so the client can run against a fake provider
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// ureq-backed transport with a fixed user agent and global timeout
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(map_ureq_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(status.as_u16()));
        }

        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(map_ureq_error)
    }
}

fn map_ureq_error(e: ureq::Error) -> FetchError {
    match e {
        ureq::Error::StatusCode(code) => FetchError::status(code),
        ureq::Error::Timeout(t) => FetchError::timeout(format!("Request timed out ({:?})", t)),
        other => FetchError::network(format!("Request failed: {}", other)),
    }
}

/// Everything a login fetches, best effort per slice
#[derive(Debug, Clone, Default)]
pub struct FetchedCatalog {
    pub account: AccountInfo,
    pub categories: ByType<Vec<Category>>,
    pub entries: ByType<Vec<RawEntry>>,
    /// One message per failed sub-fetch
    pub notices: Vec<String>,
}

pub struct XtreamClient {
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
}

impl XtreamClient {
    pub fn new(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self { credentials, transport }
    }

    pub fn stream_urls(&self) -> StreamUrls {
        self.credentials.stream_urls()
    }

    fn api_url(&self, action: Option<&str>, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/player_api.php?username={}&password={}",
            self.credentials.server,
            urlencoding::encode(&self.credentials.username),
            urlencoding::encode(&self.credentials.password)
        );
        if let Some(action) = action {
            url.push_str("&action=");
            url.push_str(action);
        }
        for (name, value) in params {
            url.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
        }
        url
    }

    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.transport.get(url)?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub fn get_account_info(&self) -> Result<AccountInfo, FetchError> {
        let json = self.get_json(&self.api_url(None, &[]))?;
        if !json.is_object() {
            return Err(FetchError::decode("Account info is not a JSON object"));
        }
        Ok(AccountInfo::from_value(&json))
    }

    pub fn get_categories(&self, content_type: ContentType) -> Result<Vec<Category>, FetchError> {
        let json = self.get_json(&self.api_url(Some(content_type.categories_action()), &[]))?;
        let raw: Vec<RawCategory> = list_or_empty(json)?;
        Ok(raw.into_iter().filter_map(RawCategory::into_category).collect())
    }

    pub fn get_entries(&self, content_type: ContentType) -> Result<Vec<RawEntry>, FetchError> {
        let json = self.get_json(&self.api_url(Some(content_type.streams_action()), &[]))?;
        list_or_empty(json)
    }

    /// Account info, categories and entries of all content types.
    ///
    /// A failing slice is returned empty and reported in `notices`; the call
    /// only fails when every sub-fetch failed.
    pub fn fetch_catalog(&self, progress: &mut dyn FnMut(u8, &str)) -> Result<FetchedCatalog, FetchError> {
        let mut catalog = FetchedCatalog::default();
        let mut first_error: Option<FetchError> = None;
        let mut succeeded = 0usize;

        let mut record = |e: FetchError, what: &str, notices: &mut Vec<String>| {
            let e = e.context(what);
            warn!("{}", e);
            notices.push(e.message.clone());
            if first_error.is_none() {
                first_error = Some(e);
            }
        };

        progress(0, "Fetching account info");
        match self.get_account_info() {
            Ok(account) => {
                catalog.account = account;
                succeeded += 1;
            }
            Err(e) => record(e, "Account info", &mut catalog.notices),
        }

        // 1 account + 2 requests per content type
        let steps = 1 + 2 * ContentType::ALL.len();
        let mut step = 1;
        for content_type in ContentType::ALL {
            let pct = (step * 100 / steps) as u8;
            progress(pct, &format!("Loading {} categories", content_type.label()));
            match self.get_categories(content_type) {
                Ok(categories) => {
                    catalog.categories[content_type] = categories;
                    succeeded += 1;
                }
                Err(e) => record(
                    e,
                    &format!("{} categories", content_type.label()),
                    &mut catalog.notices,
                ),
            }
            step += 1;

            let pct = (step * 100 / steps) as u8;
            progress(pct, &format!("Loading {} streams", content_type.label()));
            match self.get_entries(content_type) {
                Ok(entries) => {
                    catalog.entries[content_type] = entries;
                    succeeded += 1;
                }
                Err(e) => record(
                    e,
                    &format!("{} streams", content_type.label()),
                    &mut catalog.notices,
                ),
            }
            step += 1;
        }

        if succeeded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        info!(
            "Catalog fetched - Live: {}, Movies: {}, Series: {} entries",
            catalog.entries.live.len(),
            catalog.entries.movie.len(),
            catalog.entries.series.len()
        );
        Ok(catalog)
    }

    pub fn fetch_series_info(&self, series_id: &str) -> Result<SeriesInfo, FetchError> {
        let json = self.get_json(&self.api_url(Some("get_series_info"), &[("series_id", series_id)]))?;
        parse_series_info(series_id, &json, &self.stream_urls())
    }

    pub fn fetch_vod_info(&self, vod_id: &str) -> Result<VodInfo, FetchError> {
        let json = self.get_json(&self.api_url(Some("get_vod_info"), &[("vod_id", vod_id)]))?;
        parse_vod_info(vod_id, &json)
    }

    /// Cover art or a channel logo. An empty body counts as a failure.
    pub fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self.transport.get(url).map_err(|e| e.context("Image"))?;
        if bytes.is_empty() {
            return Err(FetchError::decode("Image response was empty"));
        }
        Ok(bytes)
    }

    fn xmltv_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.credentials.server,
            urlencoding::encode(&self.credentials.username),
            urlencoding::encode(&self.credentials.password)
        )
    }

    /// Raw XMLTV bytes, served from `cache` while it is fresh
    pub fn fetch_epg(&self, cache: &EpgCache) -> Result<Vec<u8>, FetchError> {
        if let Some(bytes) = cache.load_fresh() {
            info!("Using cached EPG ({} bytes)", bytes.len());
            return Ok(bytes);
        }
        let bytes = self.transport.get(&self.xmltv_url()).map_err(|e| e.context("EPG"))?;
        if let Err(e) = cache.store(&bytes) {
            warn!("Failed writing EPG cache: {}", e);
        }
        Ok(bytes)
    }
}

/// Some panels answer an empty category with `{}` or `null` instead of `[]`
fn list_or_empty<T: serde::de::DeserializeOwned>(json: Value) -> Result<Vec<T>, FetchError> {
    match json {
        Value::Array(_) => Ok(serde_json::from_value(json)?),
        Value::Null => Ok(Vec::new()),
        Value::Object(ref map) if map.is_empty() => Ok(Vec::new()),
        _ => Err(FetchError::decode("Expected a JSON list")),
    }
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(value_to_string)
}

pub fn parse_series_info(series_id: &str, json: &Value, urls: &StreamUrls) -> Result<SeriesInfo, FetchError> {
    if !json.is_object() {
        return Err(FetchError::decode("Series info is not a JSON object"));
    }

    let mut seasons: BTreeMap<String, Vec<Episode>> = BTreeMap::new();
    let mut push = |season_key: String, ep: &Value| {
        let Some(id) = str_field(ep, "id") else { return };
        let season_number = str_field(ep, "season").unwrap_or_else(|| season_key.clone());
        let container = str_field(ep, "container_extension")
            .unwrap_or_else(|| ContentType::Series.default_extension().to_string());
        let episode = Episode {
            playable_url: Some(urls.playable(ContentType::Series.stream_type(), &id, &container)),
            title: str_field(ep, "title").unwrap_or_default(),
            episode_number: str_field(ep, "episode_num")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            season_number,
            container_extension: container,
            id,
        };
        seasons.entry(season_key).or_default().push(episode);
    };

    match json.get("episodes") {
        Some(Value::Object(map)) => {
            for (season, eps) in map {
                for ep in eps.as_array().into_iter().flatten() {
                    push(season.clone(), ep);
                }
            }
        }
        // Some panels send a list of per-season lists
        Some(Value::Array(list)) => {
            for (idx, eps) in list.iter().enumerate() {
                for ep in eps.as_array().into_iter().flatten() {
                    let season = str_field(ep, "season").unwrap_or_else(|| (idx + 1).to_string());
                    push(season, ep);
                }
            }
        }
        _ => {}
    }

    let info = json.get("info").cloned().unwrap_or(Value::Null);
    let details = SeriesDetails {
        name: str_field(&info, "name").unwrap_or_else(|| "No name Available...".to_string()),
        cover: str_field(&info, "cover"),
        plot: str_field(&info, "plot"),
        cast: str_field(&info, "cast"),
        director: str_field(&info, "director"),
        genre: str_field(&info, "genre"),
        release_date: str_field(&info, "releaseDate").or_else(|| str_field(&info, "release_date")),
        rating: str_field(&info, "rating"),
        episode_run_time: str_field(&info, "episode_run_time"),
        youtube_trailer: str_field(&info, "youtube_trailer"),
        tmdb: str_field(&info, "tmdb"),
    };

    Ok(SeriesInfo {
        series_id: series_id.to_string(),
        seasons,
        details,
    })
}

pub fn parse_vod_info(vod_id: &str, json: &Value) -> Result<VodInfo, FetchError> {
    let info = match json.get("info") {
        Some(info @ Value::Object(_)) => info,
        _ => return Err(FetchError::decode("VOD info missing")),
    };
    let movie_data = json.get("movie_data").cloned().unwrap_or(Value::Null);

    Ok(VodInfo {
        vod_id: vod_id.to_string(),
        name: str_field(info, "name")
            .or_else(|| str_field(&movie_data, "name"))
            .unwrap_or_else(|| "No name Available...".to_string()),
        cover: str_field(info, "movie_image"),
        release_date: str_field(info, "releasedate"),
        country: str_field(info, "country"),
        genre: str_field(info, "genre"),
        duration: str_field(info, "duration"),
        rating: str_field(info, "rating"),
        director: str_field(info, "director"),
        cast: str_field(info, "actors").or_else(|| str_field(info, "cast")),
        description: str_field(info, "description").or_else(|| str_field(info, "plot")),
        youtube_trailer: str_field(info, "youtube_trailer"),
        tmdb_id: str_field(info, "tmdb_id"),
    })
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
