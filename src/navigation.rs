//! List navigation: category filter, series drill-down, search and history

use crate::catalog::CatalogSnapshot;
use crate::history::{ListKind, Recall, SearchHistories};
use crate::models::{ByType, Category, ContentType, Episode, SeriesInfo, StreamEntry};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

pub const GO_BACK_LABEL: &str = "Go back";
pub const NO_RESULTS_LABEL: &str = "No search results found...";

/// Drill-down level of one content list
#[derive(Debug, Clone, PartialEq)]
pub enum NavState {
    Top,
    InSeasons(Arc<SeriesInfo>),
    InEpisodes(Arc<SeriesInfo>, String),
}

impl NavState {
    pub fn depth(&self) -> usize {
        match self {
            NavState::Top => 0,
            NavState::InSeasons(_) => 1,
            NavState::InEpisodes(..) => 2,
        }
    }
}

/// One row of a category or content list
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayItem {
    GoBack,
    Category(Category),
    Entry(StreamEntry),
    Season(String),
    Episode(Episode),
    NoResults,
}

impl DisplayItem {
    pub fn label(&self) -> String {
        match self {
            DisplayItem::GoBack => GO_BACK_LABEL.to_string(),
            DisplayItem::Category(category) => category.name.clone(),
            DisplayItem::Entry(entry) => entry.name.clone(),
            DisplayItem::Season(number) => format!("Season {}", number),
            DisplayItem::Episode(episode) => episode.display_title(),
            DisplayItem::NoResults => NO_RESULTS_LABEL.to_string(),
        }
    }

    /// Text the search filter matches against, lower-cased. Episodes match
    /// on their title only, never on the "Episode N" fallback label.
    fn search_key(&self) -> String {
        match self {
            DisplayItem::Episode(episode) => episode.title.to_lowercase(),
            other => other.label().to_lowercase(),
        }
    }
}

/// What the caller has to do after an activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Hand the URL to the player
    Play(String),
    /// Series info is not cached yet; fetch it and report back via `series_info_loaded`
    FetchSeriesInfo(String),
    /// Level or filter changed; redraw the listing
    Navigated,
    /// Nothing to do in the current state
    Ignored,
}

#[derive(Debug, Clone)]
struct ListView {
    selected: Category,
    state: NavState,
    pending_series: Option<String>,
    series_cache: HashMap<String, Arc<SeriesInfo>>,
}

impl Default for ListView {
    fn default() -> Self {
        Self {
            selected: Category::all(),
            state: NavState::Top,
            pending_series: None,
            series_cache: HashMap::new(),
        }
    }
}

impl ListView {
    fn reset(&mut self) {
        self.state = NavState::Top;
        self.pending_series = None;
        self.series_cache.clear();
    }
}

#[derive(Debug, Default)]
pub struct NavigationEngine {
    catalog: Arc<CatalogSnapshot>,
    views: ByType<ListView>,
    histories: SearchHistories,
}

impl NavigationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh catalog: every list goes back to Top with the "All" filter.
    /// Search histories survive.
    pub fn load(&mut self, catalog: Arc<CatalogSnapshot>) {
        self.catalog = catalog;
        for content_type in ContentType::ALL {
            let view = &mut self.views[content_type];
            view.reset();
            view.selected = Category::all();
        }
    }

    pub fn state(&self, content_type: ContentType) -> &NavState {
        &self.views[content_type].state
    }

    pub fn selected_category(&self, content_type: ContentType) -> &Category {
        &self.views[content_type].selected
    }

    pub fn pending_series(&self, content_type: ContentType) -> Option<&str> {
        self.views[content_type].pending_series.as_deref()
    }

    pub fn categories(&self, content_type: ContentType) -> Vec<DisplayItem> {
        self.catalog
            .categories(content_type)
            .iter()
            .cloned()
            .map(DisplayItem::Category)
            .collect()
    }

    pub fn select_category(&mut self, content_type: ContentType, category: &Category) {
        debug!("Selected {} category '{}'", content_type.label(), category.name);
        let view = &mut self.views[content_type];
        view.selected = category.clone();
        view.reset();
        self.histories.get_mut(ListKind::Content, content_type).reset_cursor();
    }

    /// Unfiltered content list for the current level
    pub fn listing(&self, content_type: ContentType) -> Vec<DisplayItem> {
        let view = &self.views[content_type];
        match &view.state {
            NavState::Top => self
                .catalog
                .entries(content_type, &view.selected)
                .into_iter()
                .cloned()
                .map(DisplayItem::Entry)
                .collect(),
            NavState::InSeasons(info) => std::iter::once(DisplayItem::GoBack)
                .chain(info.sorted_season_numbers().into_iter().map(DisplayItem::Season))
                .collect(),
            NavState::InEpisodes(info, season) => std::iter::once(DisplayItem::GoBack)
                .chain(info.episodes(season).iter().cloned().map(DisplayItem::Episode))
                .collect(),
        }
    }

    pub fn activate(&mut self, content_type: ContentType, item: &DisplayItem) -> Activation {
        match item {
            DisplayItem::GoBack => self.go_back(content_type),
            DisplayItem::NoResults => Activation::Ignored,
            DisplayItem::Category(category) => {
                self.select_category(content_type, category);
                Activation::Navigated
            }
            DisplayItem::Entry(entry) => self.activate_entry(content_type, entry),
            DisplayItem::Season(number) => {
                let view = &mut self.views[content_type];
                let next = match &view.state {
                    NavState::InSeasons(info) if info.seasons.contains_key(number) => {
                        NavState::InEpisodes(Arc::clone(info), number.clone())
                    }
                    _ => return Activation::Ignored,
                };
                view.state = next;
                Activation::Navigated
            }
            DisplayItem::Episode(episode) => match (&self.views[content_type].state, &episode.playable_url) {
                (NavState::InEpisodes(..), Some(url)) => Activation::Play(url.clone()),
                _ => Activation::Ignored,
            },
        }
    }

    /// Pop one level; a no-op at Top
    pub fn go_back(&mut self, content_type: ContentType) -> Activation {
        let view = &mut self.views[content_type];
        let previous = std::mem::replace(&mut view.state, NavState::Top);
        view.state = match previous {
            NavState::Top => return Activation::Ignored,
            NavState::InSeasons(_) => NavState::Top,
            NavState::InEpisodes(info, _) => NavState::InSeasons(info),
        };
        Activation::Navigated
    }

    fn activate_entry(&mut self, content_type: ContentType, entry: &StreamEntry) -> Activation {
        let view = &mut self.views[content_type];
        if !matches!(view.state, NavState::Top) {
            return Activation::Ignored;
        }

        if !content_type.supports_drill_down() {
            return match &entry.playable_url {
                Some(url) => Activation::Play(url.clone()),
                None => Activation::Ignored,
            };
        }

        let Some(series_id) = entry.id.clone() else {
            return Activation::Ignored;
        };
        if let Some(info) = view.series_cache.get(&series_id) {
            view.state = NavState::InSeasons(Arc::clone(info));
            return Activation::Navigated;
        }
        view.pending_series = Some(series_id.clone());
        Activation::FetchSeriesInfo(series_id)
    }

    /// Deliver a fetched series. Enters its seasons if it is still the one
    /// the user asked for; returns whether the level changed.
    pub fn series_info_loaded(&mut self, content_type: ContentType, info: SeriesInfo) -> bool {
        let view = &mut self.views[content_type];
        if view.pending_series.as_deref() != Some(info.series_id.as_str()) {
            debug!("Dropping series info for {} (no longer requested)", info.series_id);
            return false;
        }
        view.pending_series = None;

        let info = Arc::new(info);
        view.series_cache.insert(info.series_id.clone(), Arc::clone(&info));
        if !matches!(view.state, NavState::Top) {
            return false;
        }
        info!("Loaded {} seasons for series {}", info.seasons.len(), info.series_id);
        view.state = NavState::InSeasons(info);
        true
    }

    pub fn series_info_failed(&mut self, content_type: ContentType, series_id: &str) {
        let view = &mut self.views[content_type];
        if view.pending_series.as_deref() == Some(series_id) {
            view.pending_series = None;
        }
    }

    /// Case-insensitive substring filter. An empty result is replaced by a
    /// single `NoResults` row; `GoBack` is always kept.
    pub fn search(&self, kind: ListKind, content_type: ContentType, text: &str) -> Vec<DisplayItem> {
        let needle = text.to_lowercase();
        let candidates = match kind {
            ListKind::Category => self.categories(content_type),
            ListKind::Content => self.listing(content_type),
        };

        let mut results: Vec<DisplayItem> = candidates
            .into_iter()
            .filter(|item| matches!(item, DisplayItem::GoBack) || item.search_key().contains(&needle))
            .collect();

        if !results.iter().any(|item| !matches!(item, DisplayItem::GoBack)) {
            results.push(DisplayItem::NoResults);
        }
        results
    }

    /// Enter pressed in a search bar
    pub fn submit_search(&mut self, kind: ListKind, content_type: ContentType, text: &str) -> Vec<DisplayItem> {
        self.histories.get_mut(kind, content_type).submit(text);
        self.search(kind, content_type, text)
    }

    pub fn recall_older(&mut self, kind: ListKind, content_type: ContentType) -> Option<Recall> {
        self.histories.get_mut(kind, content_type).recall_older()
    }

    pub fn recall_newer(&mut self, kind: ListKind, content_type: ContentType) -> Option<Recall> {
        self.histories.get_mut(kind, content_type).recall_newer()
    }

    pub fn histories(&self) -> &SearchHistories {
        &self.histories
    }
}

#[cfg(test)]
#[path = "navigation_tests.rs"]
mod tests;
