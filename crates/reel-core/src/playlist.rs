//! Looping playlist with a cursor

use serde::{Deserialize, Serialize};
use url::Url;

/// A stream and its display title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntryFields")]
pub struct PlaylistEntry {
    pub url: String,
    pub title: String,
}

/// Wire form of an entry; `title` may be omitted
#[derive(Deserialize)]
struct EntryFields {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

impl From<EntryFields> for PlaylistEntry {
    fn from(fields: EntryFields) -> Self {
        PlaylistEntry::new(fields.url, fields.title)
    }
}

impl PlaylistEntry {
    /// Create an entry; without a title one is derived from the URL
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        let url = url.into();
        let title = title.unwrap_or_else(|| derive_title(&url));
        Self { url, title }
    }
}

/// Last non-empty path segment of an absolute URL, otherwise the URL itself
fn derive_title(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| url.to_string())
}

/// Ordered entries plus a cursor.
///
/// The cursor starts out unset ("not started"). Once set it always points at
/// a valid entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    position: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<PlaylistEntry>) -> Self {
        Self {
            entries,
            position: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    /// Cursor position (`None` before the first entry is selected)
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Entry under the cursor
    pub fn current(&self) -> Option<&PlaylistEntry> {
        self.position.and_then(|pos| self.entries.get(pos))
    }

    /// Append an entry; the cursor is left untouched
    pub fn push(&mut self, entry: PlaylistEntry) {
        self.entries.push(entry);
    }

    /// Replace the entry under the cursor and return its index.
    ///
    /// When the playlist has not started the first entry is replaced; when it
    /// is empty the entry is appended. Either way the cursor ends up on it.
    pub fn replace_current(&mut self, entry: PlaylistEntry) -> usize {
        let index = if self.entries.is_empty() {
            self.entries.push(entry);
            0
        } else {
            let index = self.position.unwrap_or(0);
            self.entries[index] = entry;
            index
        };
        self.position = Some(index);
        index
    }

    /// Ensure the cursor is set, selecting the first entry if needed
    pub fn start(&mut self) -> Option<&PlaylistEntry> {
        if self.position.is_none() && !self.entries.is_empty() {
            self.position = Some(0);
        }
        self.current()
    }

    /// Move the cursor forward, wrapping to the first entry after the last
    pub fn advance(&mut self) -> Option<&PlaylistEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.position {
            Some(pos) if pos + 1 < self.entries.len() => pos + 1,
            Some(_) => 0,
            None => 0,
        };
        self.position = Some(next);
        self.entries.get(next)
    }
}
