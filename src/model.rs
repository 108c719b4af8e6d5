//! Core data model for the chart feed importer

use chrono::NaiveDate;

/// The one namespace prefix the feed schema uses for its extension fields.
///
/// Prefix recognition is an exact string comparison; elements under any other
/// prefix are ignored entirely.
pub const ITMS_PREFIX: &str = "itms";

/// Date format used by the feed's `releasedate` field.
///
/// The feed is not localized: dates arrive as US English long-form strings
/// ("January 7, 2026") regardless of where the importer runs.
const RELEASE_DATE_FORMAT: &str = "%B %d, %Y";

/// Handle to a category entity owned by the store.
///
/// A handle is tentative from creation until the store commits, at which
/// point the store promotes it to a permanent identity. Tentative handles
/// recorded before a commit cannot be dereferenced afterwards, which is why
/// the category cache purges them on the store's persisted notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryHandle {
    /// Provisional identity, valid only until the next commit
    Tentative(u64),
    /// Stable identity assigned by a commit
    Permanent(u64),
}

impl CategoryHandle {
    /// Whether this handle is still pre-persistence
    pub fn is_tentative(self) -> bool {
        matches!(self, CategoryHandle::Tentative(_))
    }

    /// The underlying store identifier
    pub fn id(self) -> u64 {
        match self {
            CategoryHandle::Tentative(id) | CategoryHandle::Permanent(id) => id,
        }
    }
}

/// A single chart entry materialized from the feed.
///
/// Every field except `rank` is optional: the feed omits elements freely and
/// an unparseable release date degrades to `None` rather than failing the
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// Chart position, assigned sequentially from 1 in feed order
    pub rank: u32,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Deduplicated category entity, shared across songs with the same name
    pub category: Option<CategoryHandle>,
}

impl Song {
    /// Create an empty song at the given chart position
    pub fn with_rank(rank: u32) -> Self {
        Self {
            rank,
            title: None,
            artist: None,
            album: None,
            release_date: None,
            category: None,
        }
    }
}

/// The feed fields the importer captures text for.
///
/// `title` and `category` are unprefixed; `artist`, `album` and
/// `releasedate` carry the `itms` namespace prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    Title,
    Artist,
    Album,
    ReleaseDate,
    Category,
}

impl FieldTag {
    /// Map an element name plus namespace prefix to a recognized field.
    ///
    /// Returns `None` for anything outside the schema, including known local
    /// names under the wrong prefix ("itms:title" is not a field, nor is a
    /// bare "artist").
    pub fn recognize(prefix: Option<&str>, local: &str) -> Option<FieldTag> {
        match (prefix, local) {
            (None, "title") => Some(FieldTag::Title),
            (None, "category") => Some(FieldTag::Category),
            (Some(p), "artist") if p == ITMS_PREFIX => Some(FieldTag::Artist),
            (Some(p), "album") if p == ITMS_PREFIX => Some(FieldTag::Album),
            (Some(p), "releasedate") if p == ITMS_PREFIX => Some(FieldTag::ReleaseDate),
            _ => None,
        }
    }
}

/// Parse a `releasedate` value with the feed's fixed long-date format.
///
/// Failures are deliberately silent: a date that doesn't parse leaves the
/// song's release date absent instead of aborting the import.
pub fn parse_release_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), RELEASE_DATE_FORMAT).ok()
}
