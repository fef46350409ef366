//! Xtream Codes IPTV client core.
//!
//! Catalog download and storage, series drill-down navigation, list search
//! with history, XMLTV guide matching and generation-tagged background work.

pub mod api;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod epg;
pub mod error;
pub mod history;
pub mod logger;
pub mod models;
pub mod navigation;
pub mod player;
pub mod session;
pub mod tasks;

pub use api::{HttpTransport, UreqTransport, XtreamClient};
pub use catalog::{CatalogSnapshot, CatalogStore};
pub use config::AppConfig;
pub use credentials::Credentials;
pub use epg::{EpgCache, EpgIndex, EpgProgram};
pub use error::{AppError, AppResult, FetchError};
pub use history::{ListKind, Recall};
pub use models::{Category, ContentType, StreamEntry};
pub use navigation::{Activation, DisplayItem, NavState, NavigationEngine};
pub use session::{EngineEvent, Session};
