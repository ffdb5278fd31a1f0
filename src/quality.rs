//! Heuristic quality scoring for search candidates.
//!
//! Maps a candidate's title, channel, duration and popularity to a score in
//! `[0, 1]` starting from a neutral 0.5. All keyword tables live here as
//! constants so the heuristics can be tested without a provider.

use lazy_static::lazy_static;
use regex::Regex;

pub const BASE_SCORE: f64 = 0.5;

/// Per-match adjustment for title patterns (both directions).
const PATTERN_STEP: f64 = 0.15;

/// Anything longer than this (15 minutes) is treated as long-form content.
const LONG_FORM_MIN_SECS: i64 = 900;

const HIGH_POPULARITY: u64 = 1_000_000;
const LOW_POPULARITY: u64 = 1_000;

/// Title words that mark devotional, classical or spoken-word content.
pub const LONG_FORM_TITLE_KEYWORDS: &[&str] = &[
    "sahasranamam",
    "bhajan",
    "devotional",
    "mantra",
    "chant",
    "classical",
    "full version",
    "complete",
    "interview",
    "talk",
    "lecture",
    "discussion",
    "episode",
    "audiobook",
    "documentary",
    "speech",
];

/// Channel fragments that suggest a podcast-like source.
pub const LONG_FORM_CHANNEL_KEYWORDS: &[&str] =
    &["podcast", "interview", "talk", "radio", "show", "cast"];

pub const GOOD_CHANNEL_KEYWORDS: &[&str] = &["official", "records", "music"];
pub const BAD_CHANNEL_KEYWORDS: &[&str] = &["compilation", "mix", "covers"];

/// A title pattern, optionally vetoed by a second pattern.
struct TitlePattern {
    hit: Regex,
    unless: Option<Regex>,
}

impl TitlePattern {
    fn new(hit: &str) -> Self {
        Self {
            hit: Regex::new(hit).unwrap(),
            unless: None,
        }
    }

    fn unless(hit: &str, unless: &str) -> Self {
        Self {
            hit: Regex::new(hit).unwrap(),
            unless: Some(Regex::new(unless).unwrap()),
        }
    }

    fn matches(&self, title: &str) -> bool {
        self.hit.is_match(title) && !self.unless.as_ref().is_some_and(|veto| veto.is_match(title))
    }
}

lazy_static! {
    /// Shorts, reactions, numbered remixes/covers/live cuts and the like.
    static ref LOW_QUALITY_PATTERNS: Vec<TitlePattern> = vec![
        TitlePattern::new(r"#shorts?\b"),
        TitlePattern::new(r"\bshort\b"),
        TitlePattern::new(r"\bstatus\b"),
        TitlePattern::new(r"\bmeme\b"),
        TitlePattern::new(r"\breaction\b"),
        TitlePattern::new(r"\breview\b"),
        TitlePattern::new(r"\bcompilation\b"),
        TitlePattern::unless(r"\bmix\b", r"\bmix\b.*album"),
        TitlePattern::new(r"\bremix\b.*\d"),
        TitlePattern::new(r"\bbeat\b.*\d"),
        TitlePattern::new(r"\binstrumental\b.*\d"),
        TitlePattern::new(r"\bkaraoke\b"),
        TitlePattern::new(r"\bcover\b.*\d"),
        TitlePattern::new(r"\blive\b.*\d"),
        TitlePattern::new(r"\bconcert\b.*\d"),
        TitlePattern::new(r"\btutorial\b"),
        TitlePattern::new(r"\bhow\s+to\b"),
        TitlePattern::new(r"\blyrics?\s+video\b"),
        TitlePattern::new(r"\bfan\s+made\b"),
    ];

    static ref HIGH_QUALITY_PATTERNS: Vec<TitlePattern> = vec![
        TitlePattern::new(r"\bofficial\b"),
        TitlePattern::new(r"\boriginal\b"),
        TitlePattern::new(r"\balbum\b"),
        TitlePattern::new(r"\bstudio\b.*version"),
        TitlePattern::new(r"\bfull\s+song\b"),
        TitlePattern::new(r"\bcomplete\b"),
        TitlePattern::new(r"\bdeluxe\b"),
        TitlePattern::new(r"\bremastered\b"),
    ];
}

/// Whether the candidate looks like long-form content (lectures, devotional
/// music, podcasts) that should not be penalised for running long.
pub fn is_long_form(title: &str, channel: &str, duration_secs: i64) -> bool {
    let title = title.to_lowercase();
    let channel = channel.to_lowercase();

    LONG_FORM_TITLE_KEYWORDS.iter().any(|kw| title.contains(kw))
        || LONG_FORM_CHANNEL_KEYWORDS.iter().any(|kw| channel.contains(kw))
        || duration_secs > LONG_FORM_MIN_SECS
}

/// Score a candidate in `[0, 1]`.
///
/// Total for every input: empty strings are fine, and a zero or negative
/// duration (or zero popularity) means "unknown" and skips that adjustment.
///
/// ```
/// use autoqueue::quality::score_track;
///
/// let good = score_track("Artist - Song (Official Audio)", "Artist Records", 215, 2_000_000);
/// let bad = score_track("song reaction #shorts", "", 30, 10);
/// assert!(good > bad);
/// assert!((0.0..=1.0).contains(&bad));
/// ```
pub fn score_track(title: &str, channel: &str, duration_secs: i64, popularity: u64) -> f64 {
    let title_lower = title.to_lowercase();
    let channel_lower = channel.to_lowercase();

    let score = BASE_SCORE
        + duration_adjustment(is_long_form(title, channel, duration_secs), duration_secs)
        + title_adjustment(&title_lower)
        + channel_adjustment(&channel_lower)
        + popularity_adjustment(popularity);

    score.clamp(0.0, 1.0)
}

fn duration_adjustment(long_form: bool, duration_secs: i64) -> f64 {
    if duration_secs <= 0 {
        return 0.0;
    }

    if long_form {
        match duration_secs {
            d if d >= 300 => 0.2,
            d if d >= 120 => 0.1,
            d if d < 60 => -0.3,
            _ => 0.0,
        }
    } else {
        match duration_secs {
            d if (120..=480).contains(&d) => 0.2,
            d if d < 60 => -0.3,
            d if d > 600 => -0.1,
            _ => 0.0,
        }
    }
}

fn title_adjustment(title_lower: &str) -> f64 {
    let count = |patterns: &[TitlePattern]| {
        patterns.iter().filter(|p| p.matches(title_lower)).count() as f64
    };

    PATTERN_STEP * (count(HIGH_QUALITY_PATTERNS.as_slice()) - count(LOW_QUALITY_PATTERNS.as_slice()))
}

fn channel_adjustment(channel_lower: &str) -> f64 {
    if GOOD_CHANNEL_KEYWORDS.iter().any(|kw| channel_lower.contains(kw)) {
        0.1
    } else if BAD_CHANNEL_KEYWORDS.iter().any(|kw| channel_lower.contains(kw)) {
        -0.1
    } else {
        0.0
    }
}

const fn popularity_adjustment(popularity: u64) -> f64 {
    match popularity {
        0 => 0.0,
        p if p > HIGH_POPULARITY => 0.05,
        p if p < LOW_POPULARITY => -0.05,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_neutral_input_scores_base() {
        assert!(approx(score_track("", "", 0, 0), BASE_SCORE));
        assert!(approx(score_track("", "", -40, 0), BASE_SCORE));
    }

    #[test]
    fn test_standard_duration_bands() {
        assert!(approx(score_track("x", "", 200, 0), 0.7));
        assert!(approx(score_track("x", "", 30, 0), 0.2));
        assert!(approx(score_track("x", "", 700, 0), 0.4));
        assert!(approx(score_track("x", "", 90, 0), 0.5));
    }

    #[test]
    fn test_long_form_has_no_upper_penalty() {
        // Over 15 minutes classifies as long-form on its own
        assert!(approx(score_track("x", "", 3600, 0), 0.7));
        assert!(approx(score_track("Lecture on harmony", "", 200, 0), 0.6));
        assert!(is_long_form("x", "The Daily Podcast", 100));
        assert!(!is_long_form("x", "", 900));
    }

    #[test]
    fn test_title_patterns_stack() {
        // Two low-quality hits: reaction + review
        assert!(approx(score_track("reaction review", "", 0, 0), 0.2));
        // Two high-quality hits: official + remastered
        assert!(approx(score_track("official remastered", "", 0, 0), 0.8));
    }

    #[test]
    fn test_numbered_variants_only_penalised_with_digits() {
        assert!(approx(score_track("song live", "", 0, 0), BASE_SCORE));
        assert!(approx(score_track("song live 2019", "", 0, 0), 0.35));
        assert!(approx(score_track("mix album", "", 0, 0), 0.65));
        assert!(approx(score_track("summer mix", "", 0, 0), 0.35));
    }

    #[test]
    fn test_channel_and_popularity() {
        assert!(approx(score_track("x", "Sony Music", 0, 0), 0.6));
        assert!(approx(score_track("x", "Best Covers", 0, 0), 0.4));
        assert!(approx(score_track("x", "", 0, 5_000_000), 0.55));
        assert!(approx(score_track("x", "", 0, 10), 0.45));
    }

    #[test]
    fn test_result_is_clamped() {
        let worst = score_track("#shorts reaction review compilation meme status tutorial", "", 10, 5);
        assert!(approx(worst, 0.0));

        let best = score_track(
            "official original album full song complete deluxe remastered",
            "official records",
            300,
            9_000_000,
        );
        assert!(approx(best, 1.0));
    }
}
