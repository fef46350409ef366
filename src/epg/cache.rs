//! On-disk copy of the last downloaded XMLTV document

use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub struct EpgCache {
    path: PathBuf,
    max_age: Duration,
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

impl EpgCache {
    pub fn new(path: PathBuf, max_age: Duration) -> Self {
        Self { path, max_age }
    }

    /// `epg.xml` inside the application directory
    pub fn in_dir(dir: &Path, max_age: Duration) -> Self {
        Self::new(dir.join("epg.xml"), max_age)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached bytes if the file exists and is younger than `max_age`
    pub fn load_fresh(&self) -> Option<Vec<u8>> {
        let age = file_age(&self.path)?;
        if age > self.max_age {
            debug!("EPG cache stale ({}s old)", age.as_secs());
            return None;
        }
        fs::read(&self.path).ok().filter(|bytes| !bytes.is_empty())
    }

    pub fn store(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)
    }

    /// Drop the cached copy; a missing file is fine
    pub fn invalidate(&self) {
        let _ = fs::remove_file(&self.path);
    }
}
