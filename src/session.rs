//! The engine a front end talks to.
//!
//! Owns the catalog store, EPG index and navigation state, and is only ever
//! touched from one thread. Network work is pushed to the task coordinator and
//! its results are applied in `poll`.

use crate::api::{HttpTransport, XtreamClient};
use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::config::AppConfig;
use crate::credentials::Credentials;
use crate::epg::{EpgCache, EpgIndex, EpgProgram};
use crate::error::AppResult;
use crate::models::{AccountInfo, ContentType, SeriesDetails, SeriesInfo, StreamEntry, VodInfo};
use crate::navigation::{Activation, DisplayItem, NavigationEngine};
use crate::player::Player;
use crate::tasks::{Generation, TaskCoordinator, TaskId, TaskKind, TaskPayload};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

const AUX_WORKERS: usize = 4;

/// Why a series was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesRequest {
    DrillDown,
    Details,
}

/// Result type carried by background tasks
#[derive(Debug)]
pub enum TaskOutput {
    Catalog {
        snapshot: CatalogSnapshot,
        notices: Vec<String>,
    },
    Epg(EpgIndex),
    Series {
        info: SeriesInfo,
        request: SeriesRequest,
    },
    Vod(VodInfo),
    /// Cover art for the details pane of `content_type`
    Image {
        content_type: ContentType,
        url: String,
        bytes: Vec<u8>,
    },
}

/// What the presentation layer should react to
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress { percent: u8, label: String },
    LoggedIn { live: usize, movies: usize, series: usize },
    /// Non-fatal problem, e.g. one catalog slice failed
    Notice(String),
    EpgReady { channels: usize, programs: usize, skipped: usize },
    /// Content list of this type changed level
    ListingChanged(ContentType),
    SeriesDetails(SeriesDetails),
    VodInfo(VodInfo),
    /// Image bytes as served; decoding is left to the front end
    Cover { content_type: ContentType, url: String, bytes: Vec<u8> },
    Error(String),
}

pub struct Session {
    transport: Arc<dyn HttpTransport>,
    player: Box<dyn Player>,
    epg_cache: EpgCache,
    tasks: TaskCoordinator<TaskOutput>,
    store: CatalogStore,
    epg: Arc<EpgIndex>,
    navigation: NavigationEngine,
    client: Option<Arc<XtreamClient>>,
    series_tasks: HashMap<TaskId, String>,
    status: String,
    progress: u8,
}

impl Session {
    pub fn new(transport: Arc<dyn HttpTransport>, player: Box<dyn Player>, epg_cache: EpgCache) -> Self {
        Self {
            transport,
            player,
            epg_cache,
            tasks: TaskCoordinator::new(AUX_WORKERS),
            store: CatalogStore::new(),
            epg: Arc::new(EpgIndex::default()),
            navigation: NavigationEngine::new(),
            client: None,
            series_tasks: HashMap::new(),
            status: String::new(),
            progress: 0,
        }
    }

    /// Real network and the configured external player
    pub fn from_config(config: &AppConfig) -> Self {
        use crate::api::UreqTransport;
        use crate::player::ExternalPlayer;
        use std::time::Duration;

        let transport = UreqTransport::new(&config.user_agent, Duration::from_secs(config.request_timeout_secs));
        let player = ExternalPlayer::new(&config.external_player).with_user_agent(&config.user_agent);
        let epg_cache = EpgCache::in_dir(
            &crate::config::config_dir(),
            Duration::from_secs(config.epg_cache_max_age_secs),
        );
        Self::new(Arc::new(transport), Box::new(player), epg_cache)
    }

    /// Start a new session. Previous data is dropped right away and any result
    /// still in flight for an older login is ignored when it arrives.
    pub fn login(&mut self, credentials: &Credentials) -> AppResult<Generation> {
        let credentials = credentials.validated()?;
        let generation = self.tasks.begin_session();
        info!("Logging in to {} as {} (session {})", credentials.server, credentials.username, generation);

        self.epg_cache.invalidate();
        self.store.clear();
        self.epg = Arc::new(EpgIndex::default());
        self.navigation.load(self.store.snapshot());
        self.series_tasks.clear();
        self.progress = 0;
        self.status = "Logging in...".to_string();

        let client = Arc::new(XtreamClient::new(credentials, Arc::clone(&self.transport)));
        self.client = Some(Arc::clone(&client));

        let catalog_client = Arc::clone(&client);
        self.tasks.submit(TaskKind::Catalog, move |progress| {
            let fetched = catalog_client
                .fetch_catalog(&mut |percent, label| progress.report(percent, label))
                .map_err(|e| e.message)?;
            let snapshot = CatalogSnapshot::build(
                fetched.account,
                fetched.categories,
                fetched.entries,
                &catalog_client.stream_urls(),
            );
            progress.report(100, "Finished loading");
            Ok(TaskOutput::Catalog { snapshot, notices: fetched.notices })
        });

        let epg_cache = self.epg_cache.clone();
        self.tasks.submit(TaskKind::Epg, move |progress| {
            progress.report(0, "Loading EPG");
            let bytes = client.fetch_epg(&epg_cache).map_err(|e| e.message)?;
            progress.report(50, "Indexing EPG");
            Ok(TaskOutput::Epg(EpgIndex::build(&bytes)))
        });

        Ok(generation)
    }

    /// Apply finished background work. Never blocks.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for event in self.tasks.poll() {
            match event.payload {
                TaskPayload::Progress { percent, label } => {
                    if event.kind == TaskKind::Catalog {
                        self.progress = percent;
                        self.status = label.clone();
                        events.push(EngineEvent::Progress { percent, label });
                    }
                }
                TaskPayload::Completed(output) => self.apply(event.task_id, output, &mut events),
                TaskPayload::Error(message) => self.fail(event.kind, event.task_id, message, &mut events),
            }
        }
        events
    }

    fn apply(&mut self, task_id: TaskId, output: TaskOutput, events: &mut Vec<EngineEvent>) {
        match output {
            TaskOutput::Catalog { snapshot, notices } => {
                let snapshot = self.store.replace(snapshot);
                self.navigation.load(Arc::clone(&snapshot));
                // Counts exclude the "All" sentinel
                let count = |ct| snapshot.categories(ct).len().saturating_sub(1);
                let (live, movies, series) =
                    (count(ContentType::Live), count(ContentType::Movie), count(ContentType::Series));
                info!("Login successful - Live: {}, Movies: {}, Series: {} categories", live, movies, series);
                self.status = "Logged in successfully".to_string();
                self.progress = 100;
                events.extend(notices.into_iter().map(EngineEvent::Notice));
                events.push(EngineEvent::LoggedIn { live, movies, series });
            }
            TaskOutput::Epg(index) => {
                let (channels, programs) = (index.channel_count(), index.program_count());
                let skipped = index.report().skipped_programs;
                self.epg = Arc::new(index);
                events.push(EngineEvent::EpgReady { channels, programs, skipped });
            }
            TaskOutput::Series { info, request } => {
                self.series_tasks.remove(&task_id);
                match request {
                    SeriesRequest::Details => {
                        self.fetch_cover(ContentType::Series, info.details.cover.as_deref());
                        events.push(EngineEvent::SeriesDetails(info.details));
                    }
                    SeriesRequest::DrillDown => {
                        if self.navigation.series_info_loaded(ContentType::Series, info) {
                            events.push(EngineEvent::ListingChanged(ContentType::Series));
                        }
                    }
                }
            }
            TaskOutput::Vod(info) => {
                self.fetch_cover(ContentType::Movie, info.cover.as_deref());
                events.push(EngineEvent::VodInfo(info));
            }
            TaskOutput::Image { content_type, url, bytes } => {
                events.push(EngineEvent::Cover { content_type, url, bytes });
            }
        }
    }

    fn fail(&mut self, kind: TaskKind, task_id: TaskId, message: String, events: &mut Vec<EngineEvent>) {
        match kind {
            TaskKind::Catalog => {
                warn!("Login failed: {}", message);
                self.status = format!("Login failed: {}", message);
            }
            TaskKind::Epg => {
                // Browsing works without a guide
                warn!("EPG unavailable: {}", message);
                events.push(EngineEvent::Notice(format!("EPG unavailable: {}", message)));
                return;
            }
            TaskKind::SeriesInfo => {
                if let Some(series_id) = self.series_tasks.remove(&task_id) {
                    self.navigation.series_info_failed(ContentType::Series, &series_id);
                }
                self.status = format!("Failed to load series info: {}", message);
            }
            TaskKind::VodInfo => {
                self.status = format!("Failed to load movie info: {}", message);
            }
            TaskKind::Image => {
                // The details stay usable without a picture
                warn!("Cover unavailable: {}", message);
                return;
            }
        }
        events.push(EngineEvent::Error(self.status.clone()));
    }

    /// Double-click on a content row: plays leaves, drills into series
    pub fn activate(&mut self, content_type: ContentType, item: &DisplayItem) -> AppResult<Activation> {
        let activation = self.navigation.activate(content_type, item);
        match &activation {
            Activation::Play(url) => {
                info!("Playing {}", url);
                self.player.play(url)?;
            }
            Activation::FetchSeriesInfo(series_id) => {
                self.status = "Loading series info...".to_string();
                self.fetch_series(series_id, SeriesRequest::DrillDown);
            }
            Activation::Navigated | Activation::Ignored => {}
        }
        Ok(activation)
    }

    /// Single-click on a content row: loads movie or series details
    pub fn select(&mut self, content_type: ContentType, item: &DisplayItem) -> Option<TaskId> {
        let DisplayItem::Entry(entry) = item else { return None };
        let id = entry.id.clone()?;
        let client = Arc::clone(self.client.as_ref()?);
        match content_type {
            ContentType::Live => None,
            ContentType::Movie => Some(self.tasks.submit(TaskKind::VodInfo, move |_| {
                client.fetch_vod_info(&id).map(TaskOutput::Vod).map_err(|e| e.message)
            })),
            ContentType::Series => Some(self.fetch_series(&id, SeriesRequest::Details)),
        }
    }

    fn fetch_series(&mut self, series_id: &str, request: SeriesRequest) -> TaskId {
        let client = self.client.clone();
        let id = series_id.to_string();
        let task_id = self.tasks.submit(TaskKind::SeriesInfo, move |_| {
            let client = client.ok_or_else(|| "Not logged in".to_string())?;
            let info = client.fetch_series_info(&id).map_err(|e| e.message)?;
            Ok(TaskOutput::Series { info, request })
        });
        self.series_tasks.insert(task_id, series_id.to_string());
        task_id
    }

    fn fetch_cover(&mut self, content_type: ContentType, url: Option<&str>) -> Option<TaskId> {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?.to_string();
        let client = Arc::clone(self.client.as_ref()?);
        Some(self.tasks.submit(TaskKind::Image, move |_| {
            let bytes = client.fetch_image(&url).map_err(|e| e.message)?;
            Ok(TaskOutput::Image { content_type, url, bytes })
        }))
    }

    /// Program airing now (or next) on a live entry's channel
    pub fn now_playing(&self, entry: &StreamEntry) -> Option<&EpgProgram> {
        self.epg.now_playing(entry, chrono::Utc::now().timestamp())
    }

    pub fn upcoming(&self, entry: &StreamEntry, count: usize) -> Vec<&EpgProgram> {
        let now = chrono::Utc::now().timestamp();
        self.epg
            .resolve_channel_id(entry.epg_channel_id.as_deref(), &entry.name)
            .map(|channel| self.epg.upcoming(&channel, now, count))
            .unwrap_or_default()
    }

    pub fn navigation(&self) -> &NavigationEngine {
        &self.navigation
    }

    pub fn navigation_mut(&mut self) -> &mut NavigationEngine {
        &mut self.navigation
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn epg(&self) -> &EpgIndex {
        &self.epg
    }

    pub fn account(&self) -> AccountInfo {
        self.store.snapshot().account.clone()
    }

    pub fn generation(&self) -> Generation {
        self.tasks.generation()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_busy(&self) -> bool {
        self.tasks.is_busy()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
