// 🔧 Badge Normalizer - raw scraped fields / bare names → canonical Badge
// Normalization is deterministic and idempotent: the same input always
// yields the same record, so repeated fetches of one badge converge.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::badge::Badge;
use crate::classifier::Classifier;
use crate::fetch::RawBadge;
use crate::scoring::ScoringTable;
use crate::store::BadgeStore;

// ============================================================================
// DATE PARSING
// ============================================================================

/// Date formats seen on public badge pages, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",   // 2023-01-15
    "%B %d, %Y",  // January 15, 2023
    "%B %e, %Y",  // January 5, 2023 (single-digit day)
    "%d %B %Y",   // 15 January 2023
    "%m/%d/%Y",   // 01/15/2023
];

/// Parse free-form date text. Unparsable text is "date unknown", never an
/// error: many badge pages omit or malform their dates.
pub fn parse_badge_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim().trim_matches(|c| c == '.' || c == ',');
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    warn!(text = trimmed, "unparsable badge date, treating as unknown");
    None
}

/// Split a combined date banner ("Issued January 15, 2023 Expires January
/// 15, 2026") into (issued, expires). Either half may be absent, and the
/// halves may appear in either order.
pub fn parse_dates_banner(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let lower = text.to_lowercase();
    let issued_at = lower.find("issued");
    let expires_at = lower.find("expires");

    let segment = |start: Option<usize>, keyword_len: usize, end: Option<usize>| -> Option<&str> {
        let start = start?;
        let from = start + keyword_len;
        let to = end.filter(|&e| e > from).unwrap_or(text.len());
        // Offsets come from the lowercased copy; get() refuses a slice that
        // would split a multi-byte character in the original
        let mut piece = text.get(from..to)?.trim();
        for prefix in ["on ", "On "] {
            piece = piece.strip_prefix(prefix).unwrap_or(piece).trim();
        }
        Some(piece)
    };

    // Either keyword may come first; each segment runs to wherever the
    // other keyword starts, or to end-of-text when it is alone or last
    let after = |start: Option<usize>, other: Option<usize>| -> Option<usize> {
        other.filter(|&o| start.is_some_and(|s| o > s))
    };

    let issued = segment(issued_at, "issued".len(), after(issued_at, expires_at))
        .and_then(parse_badge_date);
    let expires = segment(expires_at, "expires".len(), after(expires_at, issued_at))
        .and_then(parse_badge_date);

    (issued, expires)
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Convert raw scraped fields into a canonical, scored badge.
///
/// Category resolution order: the store's name → category table, then the
/// classifier's in-memory table, then the keyword heuristic. A heuristic
/// result is offered back to the store for learning; a name that already
/// has a curated mapping is left alone.
pub fn normalize_fetched(
    raw: &RawBadge,
    classifier: &mut Classifier,
    scoring: &ScoringTable,
    store: &mut dyn BadgeStore,
) -> Result<Badge> {
    let name = raw.name.trim();
    if name.is_empty() {
        bail!("badge page carried no certification name");
    }

    let (banner_issued, banner_expires) = match &raw.dates_banner {
        Some(banner) => parse_dates_banner(banner),
        None => (None, None),
    };
    let issued = raw
        .issued
        .as_deref()
        .and_then(parse_badge_date)
        .or(banner_issued);
    let expires = raw
        .expires
        .as_deref()
        .and_then(parse_badge_date)
        .or(banner_expires);

    let category = match store.get_category(name)? {
        Some(category) => category,
        None => match classifier.known_match(name) {
            Some(category) => category,
            None => {
                let category = classifier.classify(name);
                // Learn the heuristic pair so later lookups are table hits
                store.put_category(name, category)?;
                classifier.learn(name, category);
                category
            }
        },
    };

    let holder = raw
        .holder
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    let identity = if raw.url.trim().is_empty() {
        Badge::synthesize_identity(name, holder.as_deref())
    } else {
        raw.url.trim().to_string()
    };

    debug!(name, category = %category, "normalized fetched badge");

    Ok(Badge {
        identity: Some(identity),
        name: name.to_string(),
        holder,
        issued,
        expires,
        category,
        points: scoring.points_for(category),
    })
}

/// Build a hypothetical badge from a bare certification name: no identity,
/// no holder, no dates. "Does not expire" is the absence default, so a
/// hypothetical is always valid; the resolver is responsible for marking it
/// as not yet earned. Never persisted, never triggers learning.
pub fn hypothetical(name: &str, classifier: &Classifier, scoring: &ScoringTable) -> Badge {
    let category = classifier.classify(name);
    Badge {
        identity: None,
        name: name.trim().to_string(),
        holder: None,
        issued: None,
        expires: None,
        category,
        points: scoring.points_for(category),
    }
}

// ============================================================================
// TESTS
// ============================================================================
