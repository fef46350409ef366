//! In-memory catalog of categories and playable entries per content type

use crate::models::{AccountInfo, ByType, Category, ContentType, RawEntry, StreamEntry, StreamUrls};
use log::info;
use std::sync::Arc;

/// One complete login's worth of catalog data. Never mutated after `build`.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub account: AccountInfo,
    categories: ByType<Vec<Category>>,
    entries: ByType<Vec<StreamEntry>>,
}

impl CatalogSnapshot {
    pub fn build(
        account: AccountInfo,
        categories: ByType<Vec<Category>>,
        raw_entries: ByType<Vec<RawEntry>>,
        urls: &StreamUrls,
    ) -> Self {
        let categories = ByType::from_fn(|content_type| {
            let mut list = categories[content_type].clone();
            list.push(Category::all());
            list
        });
        let entries = ByType::from_fn(|content_type| {
            raw_entries[content_type]
                .iter()
                .map(|raw| to_stream_entry(raw, content_type, urls))
                .collect()
        });
        Self { account, categories, entries }
    }

    pub fn categories(&self, content_type: ContentType) -> &[Category] {
        &self.categories[content_type]
    }

    pub fn all_entries(&self, content_type: ContentType) -> &[StreamEntry] {
        &self.entries[content_type]
    }

    /// Entries of `category` in provider order
    pub fn entries(&self, content_type: ContentType, category: &Category) -> Vec<&StreamEntry> {
        self.entries[content_type]
            .iter()
            .filter(|entry| category.matches(entry))
            .collect()
    }

    /// Same as `entries`, sorted case-insensitively by name for display
    pub fn entries_sorted(&self, content_type: ContentType, category: &Category) -> Vec<&StreamEntry> {
        let mut entries = self.entries(content_type, category);
        entries.sort_by_cached_key(|entry| entry.name.to_lowercase());
        entries
    }
}

fn to_stream_entry(raw: &RawEntry, content_type: ContentType, urls: &StreamUrls) -> StreamEntry {
    let id = raw.id().map(str::to_string);

    // Providers sometimes send "created_live", "radio_streams" and the like
    let stream_type_hint = match raw.stream_type.as_deref() {
        Some(t @ ("live" | "movie" | "series")) => t.to_string(),
        _ => content_type.stream_type().to_string(),
    };

    let container_extension = raw
        .container_extension
        .clone()
        .filter(|ext| !ext.trim().is_empty())
        .unwrap_or_else(|| content_type.default_extension().to_string());

    // Series resolve their URLs per episode
    let playable_url = match (&id, content_type) {
        (_, ContentType::Series) => None,
        (Some(id), _) => Some(urls.playable(&stream_type_hint, id, &container_extension)),
        (None, _) => None,
    };

    StreamEntry {
        name: raw.name.clone().unwrap_or_default(),
        category_id: raw.category_id.clone(),
        content_type,
        stream_type_hint,
        container_extension,
        playable_url,
        epg_channel_id: raw.epg_channel_id.clone().filter(|id| !id.trim().is_empty()),
        icon: raw.stream_icon.clone().or_else(|| raw.cover.clone()),
        id,
    }
}

/// Owner of the current catalog. `load` swaps the whole snapshot at once, so a
/// reader holding an older `Arc` keeps seeing a complete old catalog.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: Arc<CatalogSnapshot>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &mut self,
        account: AccountInfo,
        categories: ByType<Vec<Category>>,
        raw_entries: ByType<Vec<RawEntry>>,
        urls: &StreamUrls,
    ) -> Arc<CatalogSnapshot> {
        self.replace(CatalogSnapshot::build(account, categories, raw_entries, urls))
    }

    /// Install a snapshot built elsewhere (usually on a worker thread)
    pub fn replace(&mut self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        info!(
            "Catalog loaded - Live: {}, Movies: {}, Series: {} entries",
            snapshot.entries.live.len(),
            snapshot.entries.movie.len(),
            snapshot.entries.series.len()
        );
        self.current = Arc::new(snapshot);
        Arc::clone(&self.current)
    }

    pub fn clear(&mut self) {
        self.current = Arc::new(CatalogSnapshot::default());
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn categories_for(&self, content_type: ContentType) -> &[Category] {
        self.current.categories(content_type)
    }

    pub fn entries_for(&self, content_type: ContentType, category: &Category) -> Vec<&StreamEntry> {
        self.current.entries(content_type, category)
    }

    pub fn entries_sorted_for(&self, content_type: ContentType, category: &Category) -> Vec<&StreamEntry> {
        self.current.entries_sorted(content_type, category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> StreamUrls {
        StreamUrls {
            server: "http://h".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        }
    }

    fn raw(id: &str, name: &str, category: &str) -> RawEntry {
        RawEntry {
            stream_id: Some(id.to_string()),
            name: Some(name.to_string()),
            category_id: Some(category.to_string()),
            ..Default::default()
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category { id: Some(id.to_string()), name: name.to_string() }
    }

    #[test]
    fn test_live_url_derived_at_load() {
        let mut entries = ByType::<Vec<RawEntry>>::default();
        entries.live.push(RawEntry {
            stream_id: Some("5".to_string()),
            stream_type: Some("live".to_string()),
            container_extension: Some("ts".to_string()),
            ..Default::default()
        });

        let mut store = CatalogStore::new();
        store.load(AccountInfo::default(), ByType::default(), entries, &urls());

        let all = store.entries_for(ContentType::Live, &Category::all());
        assert_eq!(all[0].playable_url.as_deref(), Some("http://h/live/u/p/5.ts"));
    }

    #[test]
    fn test_defaults_and_series_without_url() {
        let mut entries = ByType::<Vec<RawEntry>>::default();
        entries.movie.push(RawEntry { stream_type: Some("radio_streams".to_string()), ..raw("7", "Film", "1") });
        entries.movie.push(RawEntry { name: Some("No id".to_string()), ..Default::default() });
        entries.series.push(RawEntry { series_id: Some("9".to_string()), name: Some("Show".to_string()), ..Default::default() });

        let snapshot = CatalogSnapshot::build(AccountInfo::default(), ByType::default(), entries, &urls());

        let movies = snapshot.all_entries(ContentType::Movie);
        assert_eq!(movies[0].playable_url.as_deref(), Some("http://h/movie/u/p/7.mp4"));
        assert_eq!(movies[1].playable_url, None);

        let series = &snapshot.all_entries(ContentType::Series)[0];
        assert_eq!(series.id.as_deref(), Some("9"));
        assert_eq!(series.playable_url, None);
    }

    #[test]
    fn test_all_sentinel_appended_per_type() {
        let mut categories = ByType::<Vec<Category>>::default();
        categories.live = vec![category("1", "News"), category("2", "Sports")];

        let snapshot = CatalogSnapshot::build(AccountInfo::default(), categories, ByType::default(), &urls());

        let live = snapshot.categories(ContentType::Live);
        assert_eq!(live.len(), 3);
        assert!(live[2].is_all());
        assert_eq!(snapshot.categories(ContentType::Series), &[Category::all()]);
    }

    #[test]
    fn test_filter_exact_match_keeps_order() {
        let mut entries = ByType::<Vec<RawEntry>>::default();
        entries.live = vec![raw("1", "Zeta", "10"), raw("2", "Alpha", "1"), raw("3", "beta", "10")];

        let mut store = CatalogStore::new();
        store.load(AccountInfo::default(), ByType::default(), entries, &urls());

        let names = |list: Vec<&StreamEntry>| list.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(store.entries_for(ContentType::Live, &category("10", "x"))), vec!["Zeta", "beta"]);
        assert_eq!(names(store.entries_for(ContentType::Live, &category("1", "x"))), vec!["Alpha"]);
        assert_eq!(names(store.entries_for(ContentType::Live, &Category::all())), vec!["Zeta", "Alpha", "beta"]);
        assert_eq!(
            names(store.entries_sorted_for(ContentType::Live, &Category::all())),
            vec!["Alpha", "beta", "Zeta"]
        );
    }

    #[test]
    fn test_reload_never_mixes_snapshots() {
        let mut first = ByType::<Vec<RawEntry>>::default();
        first.live = vec![raw("1", "Old A", "1"), raw("2", "Old B", "1")];
        first.movie = vec![raw("3", "Old Movie", "2")];
        let mut second = ByType::<Vec<RawEntry>>::default();
        second.live = vec![raw("9", "New", "1")];

        let mut store = CatalogStore::new();
        store.load(AccountInfo::default(), ByType::default(), first, &urls());
        let held = store.snapshot();

        store.load(AccountInfo::default(), ByType::default(), second, &urls());
        let fresh = store.snapshot();

        assert_eq!(held.all_entries(ContentType::Live).len(), 2);
        assert_eq!(held.all_entries(ContentType::Movie).len(), 1);
        assert_eq!(fresh.all_entries(ContentType::Live).len(), 1);
        assert!(fresh.all_entries(ContentType::Movie).is_empty());
        assert!(!Arc::ptr_eq(&held, &fresh));
    }
}
