//! Xtreme IPTV catalog - terminal front end
//! Drives the engine with line commands; playback goes to the external player.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use log::{error, info, LevelFilter};
use std::io::{self, BufRead};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use xtream_catalog::config::{self, AppConfig, ProfileSource, SavedCredential};
use xtream_catalog::epg::format_program_line;
use xtream_catalog::history::{ListKind, Recall};
use xtream_catalog::models::{ContentType, SeriesDetails, VodInfo};
use xtream_catalog::navigation::{Activation, DisplayItem};
use xtream_catalog::session::{EngineEvent, Session};
use xtream_catalog::{logger, AppError, AppResult, Credentials};

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
    /// Server address, e.g. http://host:8080
    #[arg(short, long)]
    server: Option<String>,
    #[arg(short, long)]
    username: Option<String>,
    #[arg(short, long)]
    password: Option<String>,
    /// M3U plus URL carrying server and credentials
    #[arg(long, conflicts_with_all = ["server", "username", "password"])]
    m3u: Option<String>,
    /// Address book profile to log in with
    #[arg(long)]
    profile: Option<String>,
    /// Store the given credentials in the address book under this name
    #[arg(long)]
    save_as: Option<String>,
    /// Echo debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

const HELP: &str = "\
Commands:
  login <server> <user> <pass>   log in
  m3u <url>                      log in with an M3U plus URL
  tab live|movies|series         switch content type
  cats                           list categories
  cat <n>                        select category n
  ls                             show the content list
  open <n>                       activate item n (play / drill down)
  back                           go back one level
  info <n>                       details for item n
  find [text]                    search the content list
  findcat [text]                 search the categories
  up [cat] / down [cat]          recall older / newer searches
  account                        account information
  log                            recent log lines
  quit";

struct App {
    session: Session,
    tab: ContentType,
    categories: Vec<DisplayItem>,
    items: Vec<DisplayItem>,
    content_query: String,
    category_query: String,
}

impl App {
    fn new(session: Session) -> Self {
        Self {
            session,
            tab: ContentType::Live,
            categories: Vec::new(),
            items: Vec::new(),
            content_query: String::new(),
            category_query: String::new(),
        }
    }

    fn login(&mut self, credentials: &Credentials) {
        match self.session.login(credentials) {
            Ok(_) => {
                self.categories.clear();
                self.items.clear();
                println!("{}", self.session.status());
            }
            Err(e) => println!("{}", e),
        }
    }

    /// Returns false on quit
    fn handle(&mut self, line: &str) -> bool {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "quit" | "exit" | "q" => return false,
            "help" | "?" => println!("{}", HELP),
            "login" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                match parts.as_slice() {
                    [server, user, pass] => self.login(&Credentials::new(server, user, pass)),
                    _ => println!("usage: login <server> <user> <pass>"),
                }
            }
            "m3u" => match Credentials::from_m3u_url(rest) {
                Ok(credentials) => self.login(&credentials),
                Err(e) => println!("{}", e),
            },
            "tab" => match parse_tab(rest) {
                Some(tab) => {
                    self.tab = tab;
                    self.show_categories();
                }
                None => println!("usage: tab live|movies|series"),
            },
            "cats" => self.show_categories(),
            "cat" => {
                if self.categories.is_empty() {
                    self.categories = self.session.navigation().categories(self.tab);
                }
                if let Some(item) = pick(&self.categories, rest) {
                    self.content_query.clear();
                    self.session.navigation_mut().activate(self.tab, &item);
                    self.show_listing();
                }
            }
            "ls" => self.show_listing(),
            "open" => {
                if let Some(item) = pick(&self.items, rest) {
                    self.open(&item);
                }
            }
            "back" => {
                if self.session.navigation_mut().go_back(self.tab) == Activation::Navigated {
                    self.show_listing();
                }
            }
            "info" => {
                if let Some(item) = pick(&self.items, rest) {
                    self.info(&item);
                }
            }
            "find" => self.search(ListKind::Content, rest),
            "findcat" => self.search(ListKind::Category, rest),
            "up" | "down" => {
                let kind = if rest == "cat" { ListKind::Category } else { ListKind::Content };
                let navigation = self.session.navigation_mut();
                let recall = if command == "up" {
                    navigation.recall_older(kind, self.tab)
                } else {
                    navigation.recall_newer(kind, self.tab)
                };
                if let Some(recall) = recall {
                    let query = match kind {
                        ListKind::Category => &mut self.category_query,
                        ListKind::Content => &mut self.content_query,
                    };
                    *query = match recall {
                        Recall::Show(text) => text,
                        Recall::Clear => String::new(),
                    };
                    println!("search: {}", query);
                }
            }
            "account" => {
                for line in self.session.account().summary_lines() {
                    println!("  {}", line);
                }
            }
            "log" => {
                let lines = logger::console_lines();
                for line in lines.iter().skip(lines.len().saturating_sub(20)) {
                    println!("{}", line);
                }
            }
            other => println!("Unknown command '{}', type 'help'", other),
        }
        true
    }

    /// Enter in a search bar: an empty argument re-runs the recalled text
    fn search(&mut self, kind: ListKind, text: &str) {
        let query = match kind {
            ListKind::Category => &mut self.category_query,
            ListKind::Content => &mut self.content_query,
        };
        if !text.is_empty() {
            *query = text.to_string();
        }
        let query = query.clone();
        let results = self.session.navigation_mut().submit_search(kind, self.tab, &query);
        match kind {
            ListKind::Category => {
                self.categories = results;
                print_items(&self.categories);
            }
            ListKind::Content => {
                self.items = results;
                self.print_content();
            }
        }
    }

    fn open(&mut self, item: &DisplayItem) {
        match self.session.activate(self.tab, item) {
            Ok(Activation::Play(url)) => println!("Playing {}", url),
            Ok(Activation::FetchSeriesInfo(_)) => println!("Loading series info..."),
            Ok(Activation::Navigated) => {
                self.content_query.clear();
                self.show_listing();
            }
            Ok(Activation::Ignored) => {}
            Err(e) => println!("{}", e),
        }
    }

    fn info(&mut self, item: &DisplayItem) {
        if let DisplayItem::Entry(entry) = item {
            if self.tab == ContentType::Live {
                let upcoming = self.session.upcoming(entry, 5);
                if upcoming.is_empty() {
                    println!("No EPG data for {}", entry.name);
                }
                for program in upcoming {
                    println!("  {}", format_program_line(program));
                }
                return;
            }
        }
        if self.session.select(self.tab, item).is_some() {
            println!("Loading details...");
        }
    }

    fn show_categories(&mut self) {
        self.categories = self.session.navigation().categories(self.tab);
        println!("{} categories:", self.tab.label());
        print_items(&self.categories);
    }

    fn show_listing(&mut self) {
        self.items = self.session.navigation().listing(self.tab);
        self.print_content();
    }

    fn print_content(&self) {
        if self.items.is_empty() {
            println!("  (empty)");
        }
        for (i, item) in self.items.iter().enumerate() {
            let now = match item {
                DisplayItem::Entry(entry) if self.tab == ContentType::Live => self
                    .session
                    .now_playing(entry)
                    .map(|p| format!("  [{}]", format_program_line(p)))
                    .unwrap_or_default(),
                _ => String::new(),
            };
            println!("{:>4}. {}{}", i + 1, item.label(), now);
        }
    }

    fn print_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Progress { percent, label } => println!("[{:>3}%] {}", percent, label),
            EngineEvent::LoggedIn { live, movies, series } => {
                println!("Logged in - Live: {}, Movies: {}, Series: {} categories", live, movies, series);
            }
            EngineEvent::Notice(message) => println!("! {}", message),
            EngineEvent::EpgReady { channels, programs, skipped } => {
                println!("EPG ready ({} channels, {} programs)", channels, programs);
                if skipped > 0 {
                    println!("! {} EPG programmes skipped (bad channel or time)", skipped);
                }
            }
            EngineEvent::ListingChanged(content_type) => {
                if content_type == self.tab {
                    self.content_query.clear();
                    self.show_listing();
                }
            }
            EngineEvent::SeriesDetails(details) => print_series_details(&details),
            EngineEvent::VodInfo(info) => print_vod_info(&info),
            EngineEvent::Cover { content_type, url, bytes } => {
                info!("Cover for {} loaded from {}", content_type.label(), url);
                println!("  Cover: {} ({} KiB)", url, bytes.len().div_ceil(1024));
            }
            EngineEvent::Error(message) => println!("Error: {}", message),
        }
    }
}

fn parse_tab(name: &str) -> Option<ContentType> {
    match name.to_lowercase().as_str() {
        "live" | "tv" => Some(ContentType::Live),
        "movies" | "movie" | "vod" => Some(ContentType::Movie),
        "series" => Some(ContentType::Series),
        _ => None,
    }
}

/// 1-based index into the last printed list
fn pick(items: &[DisplayItem], arg: &str) -> Option<DisplayItem> {
    let item = arg
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| items.get(i))
        .cloned();
    if item.is_none() {
        println!("No item '{}' in the current list", arg);
    }
    item
}

fn print_items(items: &[DisplayItem]) {
    for (i, item) in items.iter().enumerate() {
        println!("{:>4}. {}", i + 1, item.label());
    }
}

fn print_field(label: &str, value: &Option<String>) {
    if let Some(value) = value {
        println!("  {}: {}", label, value);
    }
}

fn print_series_details(details: &SeriesDetails) {
    println!("{}", details.name);
    print_field("Genre", &details.genre);
    print_field("Released", &details.release_date);
    print_field("Rating", &details.rating);
    print_field("Director", &details.director);
    print_field("Cast", &details.cast);
    print_field("Plot", &details.plot);
}

fn print_vod_info(info: &VodInfo) {
    println!("{}", info.name);
    print_field("Genre", &info.genre);
    print_field("Released", &info.release_date);
    print_field("Duration", &info.duration);
    print_field("Rating", &info.rating);
    print_field("Director", &info.director);
    print_field("Cast", &info.cast);
    print_field("Plot", &info.description);
}

/// Credentials from the command line, else the requested or startup profile
fn resolve_credentials(args: &Args, config: &AppConfig) -> AppResult<Option<Credentials>> {
    if let Some(url) = &args.m3u {
        return Credentials::from_m3u_url(url).map(Some);
    }
    if let (Some(server), Some(user), Some(pass)) = (&args.server, &args.username, &args.password) {
        return Ok(Some(Credentials::new(server, user, pass)));
    }

    let Some(name) = args.profile.as_ref().or(config.startup_profile.as_ref()) else {
        return Ok(None);
    };
    let book = config::load_address_book(&config::address_book_path())?;
    book.iter()
        .find(|entry| &entry.name == name)
        .ok_or_else(|| AppError::Config(format!("No saved profile named '{}'", name)))?
        .credentials()
        .map(Some)
}

fn save_profile(name: &str, args: &Args) -> AppResult<()> {
    let source = match (&args.m3u, &args.server, &args.username, &args.password) {
        (Some(url), ..) => ProfileSource::M3uPlus { url: url.clone() },
        (None, Some(server), Some(username), Some(password)) => ProfileSource::Manual {
            server: server.clone(),
            username: username.clone(),
            password: password.clone(),
        },
        _ => return Err(AppError::Validation("Nothing to save: pass credentials or --m3u".to_string())),
    };

    let path = config::address_book_path();
    let mut book = config::load_address_book(&path)?;
    book.retain(|entry| entry.name != name);
    book.push(SavedCredential {
        name: name.to_string(),
        source,
        saved_at: chrono::Utc::now().timestamp(),
    });
    config::save_address_book(&path, &book)?;
    info!("Saved profile '{}'", name);
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    receiver
}

fn main() {
    let args = Args::parse();
    logger::init(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info }, args.verbose);

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("{} - continuing with defaults", e);
        error!("{}", e);
        AppConfig::default()
    });
    if config.log_to_file {
        let path = config::config_dir().join("xtream_catalog.log");
        if let Err(e) = logger::attach_file(&path) {
            eprintln!("Cannot write log file {}: {}", path.display(), e);
        }
    }

    if let Some(name) = &args.save_as {
        if let Err(e) = save_profile(name, &args) {
            eprintln!("{}", e);
        }
    }

    let mut app = App::new(Session::from_config(&config));
    match resolve_credentials(&args, &config) {
        Ok(Some(credentials)) => app.login(&credentials),
        Ok(None) => println!("Not logged in. Type 'help' for commands."),
        Err(e) => eprintln!("{}", e),
    }

    let input = spawn_stdin_reader();
    loop {
        for event in app.session.poll() {
            app.print_event(event);
        }
        match input.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => {
                if !app.handle(&line) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
