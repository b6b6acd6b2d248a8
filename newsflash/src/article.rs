//! The normalized article record shared by every pipeline stage, plus the
//! placeholder sentinels that stand in for fields a source page did not yield.

/// Title used when no headline could be extracted. Candidates carrying it are
/// dropped before persistence.
pub const NO_TITLE: &str = "No Title";

/// Subject used when no topic could be extracted.
pub const UNKNOWN_SUBJECT: &str = "Unknown";

/// Alternate placeholder seen in the wild for both titles and subjects.
pub const NOT_APPLICABLE: &str = "n/a";

/// Publication time used when no timestamp could be extracted.
pub const NO_TIME: &str = "No Time";

/// Display value for ongoing live coverage.
pub const LIVE: &str = "Live";

/// Marker character a live-coverage timestamp starts with on source pages.
pub const LIVE_MARKER: char = '.';

/// One article as extracted from a source page. Identity is `link`;
/// records are immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub subject: String,
    pub publication_time: String,
    pub link: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        subject: impl Into<String>,
        publication_time: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            subject: subject.into(),
            publication_time: publication_time.into(),
            link: link.into(),
        }
    }
}

/// True when a title is one of the placeholder values that must never be
/// shown to a subscriber.
pub fn is_title_placeholder(title: &str) -> bool {
    title == NO_TITLE || title == NOT_APPLICABLE
}

/// True when a subject is a placeholder rather than a real topic name.
/// These are stored with the article but excluded from the subscribable list.
pub fn is_subject_placeholder(subject: &str) -> bool {
    subject == UNKNOWN_SUBJECT || subject == NOT_APPLICABLE
}

/// Collapse a raw publication-time string to `Live` when it carries the
/// live-coverage marker; otherwise return it unchanged.
pub fn normalize_publication_time(raw: &str) -> String {
    if raw.starts_with(LIVE_MARKER) {
        LIVE.to_string()
    } else {
        raw.to_string()
    }
}
