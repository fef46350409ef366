//! Tests for the Xtream API client against a scripted provider

use super::*;
use std::sync::Mutex;

/// Answers by the `action=` of the URL (`""` for the action-less call and `xmltv` for the guide)
struct FakeProvider {
    responses: Vec<(&'static str, Result<&'static str, FetchError>)>,
    requests: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn new(responses: Vec<(&'static str, Result<&'static str, FetchError>)>) -> Arc<Self> {
        Arc::new(Self { responses, requests: Mutex::new(Vec::new()) })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpTransport for FakeProvider {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let action = if url.contains("xmltv.php") {
            "xmltv"
        } else {
            url.split("action=").nth(1).map(|a| a.split('&').next().unwrap_or("")).unwrap_or("")
        };
        self.responses
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, r)| r.clone().map(|body| body.as_bytes().to_vec()))
            .unwrap_or_else(|| Err(FetchError::status(404)))
    }
}

fn client(provider: Arc<FakeProvider>) -> XtreamClient {
    XtreamClient::new(Credentials::new("http://h", "u", "p"), provider)
}

const ACCOUNT: &str = r#"{"user_info": {"username": "u", "status": "Active"}, "server_info": {"url": "h", "port": "80"}}"#;

#[test]
fn test_fetch_catalog_degrades_failed_slice_to_empty() {
    let provider = FakeProvider::new(vec![
        ("", Ok(ACCOUNT)),
        ("get_live_categories", Ok(r#"[{"category_id": "1", "category_name": "News"}]"#)),
        ("get_vod_categories", Ok("[]")),
        ("get_series_categories", Err(FetchError::timeout("Request timed out"))),
        ("get_live_streams", Ok(r#"[{"stream_id": 5, "name": "CNN", "category_id": "1", "stream_type": "live"}]"#)),
        ("get_vod_streams", Ok("null")),
        ("get_series", Ok(r#"[{"series_id": 9, "name": "Show", "category_id": "4"}]"#)),
    ]);
    let mut stages = Vec::new();
    let catalog = client(provider.clone())
        .fetch_catalog(&mut |pct, label| stages.push((pct, label.to_string())))
        .unwrap();

    assert_eq!(catalog.account.user.status.as_deref(), Some("Active"));
    assert_eq!(catalog.categories.live.len(), 1);
    assert!(catalog.categories.series.is_empty());
    assert_eq!(catalog.entries.live[0].id(), Some("5"));
    assert!(catalog.entries.movie.is_empty());
    assert_eq!(catalog.entries.series[0].id(), Some("9"));
    assert_eq!(catalog.notices, vec!["Series categories: Request timed out".to_string()]);
    assert_eq!(provider.request_count(), 7);
    assert!(stages.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_fetch_catalog_fails_when_everything_fails() {
    let provider = FakeProvider::new(Vec::new());
    let err = client(provider).fetch_catalog(&mut |_, _| {}).unwrap_err();
    assert_eq!(err.kind, crate::error::FetchErrorKind::Status(404));
    assert!(err.message.starts_with("Account info"));
}

#[test]
fn test_malformed_json_is_decode_error() {
    let provider = FakeProvider::new(vec![("get_live_categories", Ok("<html>oops</html>"))]);
    let err = client(provider).get_categories(ContentType::Live).unwrap_err();
    assert_eq!(err.kind, crate::error::FetchErrorKind::Decode);
}

#[test]
fn test_series_info_builds_episode_urls() {
    let provider = FakeProvider::new(vec![(
        "get_series_info",
        Ok(r#"{
            "info": {"name": "Show", "plot": "Plot", "rating": 7.5},
            "episodes": {
                "10": [{"id": "100", "title": "Finale", "episode_num": 1, "container_extension": "mkv"}],
                "2": [{"id": "20", "title": "Two", "episode_num": "1"}],
                "1": [{"id": "10", "title": "Pilot", "episode_num": 1, "container_extension": "mp4"},
                      {"title": "no id"}]
            }
        }"#),
    )]);
    let info = client(provider).fetch_series_info("9").unwrap();

    assert_eq!(info.series_id, "9");
    assert_eq!(info.sorted_season_numbers(), vec!["1", "2", "10"]);
    assert_eq!(info.episodes("1").len(), 1);
    assert_eq!(info.episodes("10")[0].playable_url.as_deref(), Some("http://h/series/u/p/100.mkv"));
    assert_eq!(info.episodes("2")[0].playable_url.as_deref(), Some("http://h/series/u/p/20.mp4"));
    assert_eq!(info.details.name, "Show");
    assert_eq!(info.details.rating.as_deref(), Some("7.5"));
}

#[test]
fn test_series_info_accepts_list_of_seasons() {
    let json: Value = serde_json::from_str(
        r#"{"episodes": [[{"id": "1", "title": "A", "season": 1}], [{"id": "2", "title": "B"}]]}"#,
    )
    .unwrap();
    let urls = Credentials::new("http://h", "u", "p").stream_urls();
    let info = parse_series_info("3", &json, &urls).unwrap();
    assert_eq!(info.sorted_season_numbers(), vec!["1", "2"]);
}

#[test]
fn test_vod_info() {
    let provider = FakeProvider::new(vec![(
        "get_vod_info",
        Ok(r#"{"info": {"name": "", "genre": "Drama", "actors": "A, B"}, "movie_data": {"name": "Film"}}"#),
    )]);
    let info = client(provider).fetch_vod_info("12").unwrap();
    assert_eq!(info.name, "Film");
    assert_eq!(info.genre.as_deref(), Some("Drama"));
    assert_eq!(info.cast.as_deref(), Some("A, B"));
}

#[test]
fn test_fetch_epg_uses_fresh_cache() {
    let dir = std::env::temp_dir().join(format!("xtream_catalog_api_epg_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cache = EpgCache::new(dir.join("epg.xml"), Duration::from_secs(3600));
    cache.invalidate();

    let provider = FakeProvider::new(vec![("xmltv", Ok("<tv></tv>"))]);
    let client = client(provider.clone());

    assert_eq!(client.fetch_epg(&cache).unwrap(), b"<tv></tv>".to_vec());
    assert_eq!(client.fetch_epg(&cache).unwrap(), b"<tv></tv>".to_vec());
    assert_eq!(provider.request_count(), 1);

    cache.invalidate();
    client.fetch_epg(&cache).unwrap();
    assert_eq!(provider.request_count(), 2);
}

#[test]
fn test_credentials_are_url_encoded_in_api_calls() {
    let provider = FakeProvider::new(vec![("", Ok(ACCOUNT))]);
    let client = XtreamClient::new(Credentials::new("http://h", "u", "p&q"), provider.clone());
    client.get_account_info().unwrap();
    let url = provider.requests.lock().unwrap()[0].clone();
    assert_eq!(url, "http://h/player_api.php?username=u&password=p%26q");
}

#[test]
fn test_fetch_image_returns_raw_bytes() {
    let provider = FakeProvider::new(vec![("", Ok("\u{89}PNG"))]);
    let bytes = client(provider).fetch_image("http://img.example/cover.png").unwrap();
    assert_eq!(bytes, "\u{89}PNG".as_bytes());
}

#[test]
fn test_fetch_image_rejects_empty_body() {
    let provider = FakeProvider::new(vec![("", Ok(""))]);
    let err = client(provider).fetch_image("http://img.example/cover.png").unwrap_err();
    assert_eq!(err.kind, crate::error::FetchErrorKind::Decode);

    let err = client(FakeProvider::new(Vec::new())).fetch_image("http://img.example/gone.png").unwrap_err();
    assert_eq!(err.kind, crate::error::FetchErrorKind::Status(404));
    assert!(err.message.starts_with("Image"));
}
