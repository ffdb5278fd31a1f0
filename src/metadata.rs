//! Artist/title extraction from free-text titles.
//!
//! Streaming titles rarely carry tags, so the artist has to be guessed from
//! separators like `"Artist - Title"`. The result doubles as the identity key
//! used by [`crate::similarity`] for near-duplicate detection.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Channel names longer than this are not treated as an artist name.
const MAX_CHANNEL_ARTIST_LEN: usize = 50;

lazy_static! {
    /// Separator patterns, tried in order. Both groups are candidates for
    /// the artist; the shorter one wins.
    static ref SPLIT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"^(.+?)\s*-\s*(.+)$").unwrap(),
        Regex::new(r"(?i)^(.+?)\s+by\s+(.+)$").unwrap(),
        Regex::new(r"^(.+?)\s*\|\s*(.+)$").unwrap(),
        Regex::new(r"^(.+?)\s*:\s*(.+)$").unwrap(),
    ];

    static ref CHANNEL_SUFFIX: Regex =
        Regex::new(r"(?i)\s*\b(official|music|records|entertainment|vevo)\s*$").unwrap();

    static ref PARENTHESISED: Regex = Regex::new(r"(?s)\(.*?\)").unwrap();
    static ref BRACKETED: Regex = Regex::new(r"(?s)\[.*?\]").unwrap();

    static ref TITLE_QUALIFIERS: Regex = Regex::new(
        r"\b(official|music|video|audio|lyric|lyrics|hd|4k|hq|high\s+quality)\b"
    ).unwrap();

    static ref ARTIST_QUALIFIERS: Regex =
        Regex::new(r"\b(official|music|records|entertainment)\b").unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Artist and title guessed from a raw title, plus their comparison forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedMetadata {
    /// Best-guess artist; empty when unknown
    pub artist: String,
    /// Title with the artist part removed
    pub title: String,
    pub normalized_artist: String,
    pub normalized_title: String,
}

impl NormalizedMetadata {
    /// Build metadata from an already-split artist and title.
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            normalized_artist: normalize_artist(artist),
            normalized_title: normalize_title(title),
        }
    }

    /// `normalized_artist:normalized_title`, the dedup signature.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.normalized_artist, self.normalized_title)
    }

    pub fn has_artist(&self) -> bool {
        !self.artist.is_empty()
    }
}

/// Extract artist and title from a raw title and optional channel name.
///
/// Pure and deterministic. When no separator pattern matches, the title is
/// kept as-is and the channel (minus boilerplate such as "VEVO") becomes the
/// artist if it is short enough to be a name.
///
/// ```
/// use autoqueue::metadata::extract;
///
/// let meta = extract("Daft Punk - Around the World", None);
/// assert_eq!(meta.artist, "Daft Punk");
/// assert_eq!(meta.title, "Around the World");
/// ```
pub fn extract(raw_title: &str, channel: Option<&str>) -> NormalizedMetadata {
    let (mut artist, title) = split_title(raw_title);

    if artist.is_empty() {
        if let Some(channel) = channel {
            let stripped = CHANNEL_SUFFIX.replace(channel, "");
            let stripped = stripped.trim();
            if !stripped.is_empty() && stripped.chars().count() < MAX_CHANNEL_ARTIST_LEN {
                artist = stripped.to_string();
            }
        }
    }

    NormalizedMetadata::new(&title, &artist)
}

fn split_title(raw_title: &str) -> (String, String) {
    for pattern in SPLIT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(raw_title) {
            let first = caps.get(1).map_or("", |m| m.as_str()).trim();
            let second = caps.get(2).map_or("", |m| m.as_str()).trim();

            // Ties go to the second group
            return if first.chars().count() < second.chars().count() {
                (first.to_string(), second.to_string())
            } else {
                (second.to_string(), first.to_string())
            };
        }
    }

    (String::new(), raw_title.to_string())
}

/// Lowercase, drop `(...)`/`[...]` segments and version qualifiers, collapse whitespace.
///
/// Idempotent: `normalize_title(&normalize_title(s)) == normalize_title(s)`.
pub fn normalize_title(title: &str) -> String {
    normalize_with(title, &TITLE_QUALIFIERS)
}

/// Artist counterpart of [`normalize_title`] with a label-oriented vocabulary.
pub fn normalize_artist(artist: &str) -> String {
    normalize_with(artist, &ARTIST_QUALIFIERS)
}

fn normalize_with(text: &str, qualifiers: &Regex) -> String {
    let lowered = text.to_lowercase();
    let without_parens = PARENTHESISED.replace_all(&lowered, " ");
    let without_brackets = BRACKETED.replace_all(&without_parens, " ");

    // Removing one qualifier can bring two words of a multi-word one together
    let mut cleaned = without_brackets.into_owned();
    while qualifiers.is_match(&cleaned) {
        cleaned = qualifiers.replace_all(&cleaned, " ").into_owned();
    }

    WHITESPACE
        .replace_all(&cleaned, " ")
        .trim()
        .to_string()
}
