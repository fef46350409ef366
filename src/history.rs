//! Search-bar history with up/down recall

use crate::models::{ByType, ContentType};
use std::collections::VecDeque;

pub const MAX_SEARCH_HISTORY: usize = 30;

/// Which search bar a query was typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Category,
    Content,
}

/// What the search bar should show after a recall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    Show(String),
    Clear,
}

/// Most-recent-first list of submitted queries plus a scrollback cursor.
/// The cursor sits at 0 (the newest entry) after every submit and may drop
/// to -1, meaning "back at an empty input".
#[derive(Debug, Clone)]
pub struct SearchHistory {
    entries: VecDeque<String>,
    cursor: isize,
    capacity: usize,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_SEARCH_HISTORY)
    }
}

impl SearchHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Enter pressed. Empty text only resets the cursor.
    pub fn submit(&mut self, text: &str) {
        self.cursor = 0;
        if text.is_empty() {
            return;
        }
        self.entries.push_front(text.to_string());
        self.entries.truncate(self.capacity);
    }

    /// Up arrow. `None` when there is nothing to recall.
    pub fn recall_older(&mut self) -> Option<Recall> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() as isize - 1;
        self.cursor = (self.cursor + 1).min(last);
        self.current()
    }

    /// Down arrow. Stepping past the newest entry clears the input.
    pub fn recall_newer(&mut self) -> Option<Recall> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = (self.cursor - 1).max(-1);
        self.current()
    }

    fn current(&self) -> Option<Recall> {
        if self.cursor < 0 {
            return Some(Recall::Clear);
        }
        self.entries
            .get(self.cursor as usize)
            .map(|text| Recall::Show(text.clone()))
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// One independent history per search bar and content type
#[derive(Debug, Clone, Default)]
pub struct SearchHistories {
    category: ByType<SearchHistory>,
    content: ByType<SearchHistory>,
}

impl SearchHistories {
    pub fn get(&self, kind: ListKind, content_type: ContentType) -> &SearchHistory {
        match kind {
            ListKind::Category => &self.category[content_type],
            ListKind::Content => &self.content[content_type],
        }
    }

    pub fn get_mut(&mut self, kind: ListKind, content_type: ContentType) -> &mut SearchHistory {
        match kind {
            ListKind::Category => &mut self.category[content_type],
            ListKind::Content => &mut self.content[content_type],
        }
    }
}
