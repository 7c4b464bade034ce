// 🧭 Query Resolver - single-shot request classification and routing
// Three terminal branches (total-points, badge-by-url, hypothetical) plus an
// explicit "unrecognized" fallback. The resolver never guesses between a
// badge lookup and a hypothetical.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::badge::{Badge, Category};
use crate::classifier::Classifier;
use crate::fetch::{BadgeFetcher, FetchError, RawBadge};
use crate::normalizer;
use crate::scoring::{fmt_points, ScoringTable, Totals};
use crate::store::BadgeStore;

// ============================================================================
// ANSWER SURFACE
// ============================================================================

/// Terminal outcome of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerKind {
    Total,
    Badge,
    Hypothetical,
    FetchError,
    Unrecognized,
}

/// The single query-facing result shape, consumed by the CLI/agent shell.
///
/// Point fields are populated only for point-bearing kinds: an error kind
/// never carries a number that could be mistaken for a score.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub kind: AnswerKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_points: Option<f64>,

    /// Human-readable explanation, always present
    pub message: String,
}

impl Answer {
    fn bare(kind: AnswerKind, message: String) -> Self {
        Answer {
            kind,
            name: None,
            category: None,
            points: None,
            valid: None,
            effective_points: None,
            message,
        }
    }
}

/// Result of importing a profile's badges (sync or offline file)
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub imported: usize,
    pub skipped: usize,
    pub totals: Totals,
}

// ============================================================================
// REQUEST CLASSIFICATION
// ============================================================================

/// What the incoming text asks for. Single-shot: one classification per
/// request, no intermediate states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    TotalPoints,
    BadgeByUrl(String),
    Hypothetical(String),
    Unrecognized,
}

/// Pull a badge URL out of free text, if one is present
pub fn extract_badge_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ')' | '(')))
        .find(|token| {
            (token.starts_with("http://") || token.starts_with("https://"))
                && token.contains("credly.com")
                && token.contains("/badges/")
        })
        .map(str::to_string)
}

fn wants_total(lower: &str) -> bool {
    (lower.contains("total") && lower.contains("point"))
        || lower.contains("how many points do i have")
}

/// Phrasings that mark a what-if question about an unearned certification.
/// Only phrasings that carry a name slot belong here: a bare "how many
/// points" is aggregate-sounding, and guessing between the two branches is
/// forbidden, so it falls through to unrecognized instead.
const HYPOTHETICAL_MARKERS: &[&str] = &["points for", "if i get", "if i earn"];

/// Strip question phrasing down to the certification name it asks about.
/// Classification is substring-based, so leftovers are harmless; this only
/// keeps the echoed name readable.
fn extract_cert_name(text: &str) -> String {
    let lower = text.to_lowercase();

    for marker in ["points for ", "if i get ", "if i earn "] {
        if let Some(at) = lower.find(marker) {
            // Byte offsets into `lower` are only safe on `text` for ASCII;
            // get() falls through instead of slicing mid-character
            let Some(rest) = text.get(at + marker.len()..) else {
                continue;
            };
            let cut = rest
                .find(|c: char| matches!(c, ',' | '?'))
                .unwrap_or(rest.len());
            let name = rest[..cut].trim();
            if !name.is_empty() {
                return name.trim_end_matches('.').to_string();
            }
        }
    }

    text.trim().trim_end_matches(['?', '.', '!']).trim().to_string()
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct Resolver<S: BadgeStore, F: BadgeFetcher> {
    store: S,
    fetcher: F,
    classifier: Classifier,
    scoring: ScoringTable,
}

impl<S: BadgeStore, F: BadgeFetcher> Resolver<S, F> {
    /// Build a resolver over a store and a fetch collaborator. The
    /// classifier is seeded from the store's name → category table.
    pub fn new(store: S, fetcher: F, scoring: ScoringTable) -> Result<Self> {
        let classifier = Classifier::from_mappings(store.all_categories()?);
        info!(mappings = classifier.mapping_count(), "resolver ready");
        Ok(Resolver {
            store,
            fetcher,
            classifier,
            scoring,
        })
    }

    /// Classify the incoming text into one of the closed request kinds.
    /// Priority: URL > aggregate phrasing > certification name > fallback.
    pub fn classify_request(&self, text: &str) -> Request {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Request::Unrecognized;
        }

        if let Some(url) = extract_badge_url(trimmed) {
            return Request::BadgeByUrl(url);
        }

        let lower = trimmed.to_lowercase();
        if wants_total(&lower) {
            return Request::TotalPoints;
        }

        if HYPOTHETICAL_MARKERS.iter().any(|m| lower.contains(m)) {
            return Request::Hypothetical(extract_cert_name(trimmed));
        }

        // Bare text that names a certification (table or keyword hit) is a
        // hypothetical; anything else is explicitly unrecognized.
        let name = extract_cert_name(trimmed);
        if self.classifier.known_match(&name).is_some()
            || self.classifier.keyword_match(&name).is_some()
        {
            return Request::Hypothetical(name);
        }

        Request::Unrecognized
    }

    /// Answer a query end to end. Store failures propagate as errors; fetch
    /// failures are a distinct answer kind, not an error.
    pub fn answer(&mut self, query: &str) -> Result<Answer> {
        match self.classify_request(query) {
            Request::TotalPoints => self.total(),
            Request::BadgeByUrl(url) => self.badge_by_url(&url),
            Request::Hypothetical(name) => Ok(self.hypothetical(&name)),
            Request::Unrecognized => Ok(Answer::bare(
                AnswerKind::Unrecognized,
                "Unrecognized query: ask for your total points, a badge URL, \
                 or the points for a certification name."
                    .to_string(),
            )),
        }
    }

    // ========================================================================
    // TERMINAL BRANCHES
    // ========================================================================

    fn total(&self) -> Result<Answer> {
        let badges = self.store.all_badges()?;
        let totals = self.scoring.totals(&badges, today());

        let mut message = format!(
            "Total valid points: {} ({} of {} badges valid)",
            fmt_points(totals.total),
            totals.valid_count,
            totals.badge_count,
        );
        for line in &totals.lines {
            message.push_str(&format!(
                "\n  {}: {} badges, {} points",
                line.category,
                line.count,
                fmt_points(line.effective_points),
            ));
        }

        Ok(Answer {
            kind: AnswerKind::Total,
            name: None,
            category: None,
            points: Some(totals.total),
            valid: None,
            effective_points: Some(totals.total),
            message,
        })
    }

    fn badge_by_url(&mut self, url: &str) -> Result<Answer> {
        if let Some(badge) = self.store.get_badge(url)? {
            return Ok(self.badge_answer(&badge));
        }

        let raw = match self.fetcher.fetch_badge(url) {
            Ok(raw) => raw,
            Err(err) => return Ok(fetch_error_answer(url, &err)),
        };

        let badge = match normalizer::normalize_fetched(
            &raw,
            &mut self.classifier,
            &self.scoring,
            &mut self.store,
        ) {
            Ok(badge) => badge,
            Err(err) => {
                warn!(url, error = %err, "fetched page did not normalize");
                return Ok(fetch_error_answer(url, &FetchError::PageStructure(url.to_string())));
            }
        };

        self.store.put_badge(&badge)?;
        Ok(self.badge_answer(&badge))
    }

    fn badge_answer(&self, badge: &Badge) -> Answer {
        let score = self.scoring.score(badge, today());

        let message = match (score.valid, badge.expires) {
            (true, Some(expiry)) => format!(
                "{} is valid until {} and worth {} points.",
                badge.name,
                expiry,
                fmt_points(score.points),
            ),
            (true, None) => format!(
                "{} does not expire and is worth {} points.",
                badge.name,
                fmt_points(score.points),
            ),
            (false, Some(expiry)) => format!(
                "{} expired on {} (would have been worth {} points).",
                badge.name,
                expiry,
                fmt_points(score.points),
            ),
            // Validity only fails on a past expiry date
            (false, None) => format!(
                "{} is expired (would have been worth {} points).",
                badge.name,
                fmt_points(score.points),
            ),
        };

        Answer {
            kind: AnswerKind::Badge,
            name: Some(badge.name.clone()),
            category: Some(badge.category),
            points: Some(score.points),
            valid: Some(score.valid),
            effective_points: Some(score.effective_points),
            message,
        }
    }

    fn hypothetical(&self, name: &str) -> Answer {
        let badge = normalizer::hypothetical(name, &self.classifier, &self.scoring);

        Answer {
            kind: AnswerKind::Hypothetical,
            name: Some(badge.name.clone()),
            category: Some(badge.category),
            points: Some(badge.points),
            // Not yet earned: validity and effective credit do not apply
            valid: None,
            effective_points: None,
            message: format!(
                "Not yet earned: {} would be worth {} points ({}).",
                badge.name,
                fmt_points(badge.points),
                badge.category,
            ),
        }
    }

    // ========================================================================
    // PROFILE IMPORT (library/CLI operation, not a query branch)
    // ========================================================================

    /// Fetch every badge on a profile page and upsert it into the store
    pub fn sync_profile(&mut self, profile_url: &str) -> Result<ProfileSummary> {
        let raws = self.fetcher.fetch_profile(profile_url)?;
        info!(profile_url, badges = raws.len(), "profile fetched");
        self.import_raw(&raws)
    }

    /// Normalize and store a batch of raw badge records (the scraper's
    /// offline output). Records that fail to normalize are skipped, not
    /// fatal: one malformed card should not abort a profile import.
    pub fn import_raw(&mut self, raws: &[RawBadge]) -> Result<ProfileSummary> {
        let mut imported = Vec::new();
        let mut skipped = 0;

        for raw in raws {
            match normalizer::normalize_fetched(
                raw,
                &mut self.classifier,
                &self.scoring,
                &mut self.store,
            ) {
                Ok(badge) => {
                    self.store.put_badge(&badge)?;
                    imported.push(badge);
                }
                Err(err) => {
                    warn!(url = %raw.url, error = %err, "skipping badge that did not normalize");
                    skipped += 1;
                }
            }
        }

        Ok(ProfileSummary {
            imported: imported.len(),
            skipped,
            totals: self.scoring.totals(&imported, today()),
        })
    }

    /// Shared access for the CLI shell
    pub fn store(&self) -> &S {
        &self.store
    }
}

fn fetch_error_answer(url: &str, err: &FetchError) -> Answer {
    Answer::bare(
        AnswerKind::FetchError,
        format!("Could not retrieve badge at {url}: {err}."),
    )
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::cell::{Cell, RefCell};

    const URL: &str = "https://www.credly.com/badges/e192db17/public_url";

    /// Scripted fetch collaborator: fixed responses, call counting
    struct ScriptedFetcher {
        badge: RefCell<Option<RawBadge>>,
        profile: Vec<RawBadge>,
        fail: bool,
        calls: Cell<usize>,
    }

    impl ScriptedFetcher {
        fn returning(raw: RawBadge) -> Self {
            ScriptedFetcher {
                badge: RefCell::new(Some(raw)),
                profile: Vec::new(),
                fail: false,
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            ScriptedFetcher {
                badge: RefCell::new(None),
                profile: Vec::new(),
                fail: true,
                calls: Cell::new(0),
            }
        }

        fn with_profile(profile: Vec<RawBadge>) -> Self {
            ScriptedFetcher {
                badge: RefCell::new(None),
                profile,
                fail: false,
                calls: Cell::new(0),
            }
        }
    }

    impl BadgeFetcher for ScriptedFetcher {
        fn fetch_badge(&self, url: &str) -> Result<RawBadge, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(FetchError::Network(url.to_string()));
            }
            self.badge
                .borrow()
                .clone()
                .ok_or_else(|| FetchError::PageStructure(url.to_string()))
        }

        fn fetch_profile(&self, url: &str) -> Result<Vec<RawBadge>, FetchError> {
            if self.fail {
                return Err(FetchError::Network(url.to_string()));
            }
            Ok(self.profile.clone())
        }
    }

    fn raw(name: &str, expires: Option<&str>) -> RawBadge {
        RawBadge {
            url: URL.to_string(),
            name: name.to_string(),
            holder: Some("Jane Roe".to_string()),
            issued: Some("2023-01-15".to_string()),
            expires: expires.map(str::to_string),
            dates_banner: None,
        }
    }

    fn resolver(fetcher: ScriptedFetcher) -> Resolver<SqliteStore, ScriptedFetcher> {
        Resolver::new(
            SqliteStore::open_in_memory().unwrap(),
            fetcher,
            ScoringTable::builtin(),
        )
        .unwrap()
    }

    // ------------------------------------------------------------------
    // request classification
    // ------------------------------------------------------------------

    #[test]
    fn test_classify_request_url() {
        let resolver = resolver(ScriptedFetcher::failing());
        assert_eq!(
            resolver.classify_request(&format!("How many credit points can I get for {URL}")),
            Request::BadgeByUrl(URL.to_string())
        );
    }

    #[test]
    fn test_classify_request_total() {
        let resolver = resolver(ScriptedFetcher::failing());
        assert_eq!(
            resolver.classify_request("What are my total points?"),
            Request::TotalPoints
        );
        assert_eq!(
            resolver.classify_request("how many points do I have"),
            Request::TotalPoints
        );
    }

    #[test]
    fn test_classify_request_hypothetical_phrasing() {
        let resolver = resolver(ScriptedFetcher::failing());
        assert_eq!(
            resolver.classify_request("How many points for Underwater Basket Weaving?"),
            Request::Hypothetical("Underwater Basket Weaving".to_string())
        );
    }

    #[test]
    fn test_classify_request_bare_cert_name() {
        let resolver = resolver(ScriptedFetcher::failing());
        assert_eq!(
            resolver.classify_request("AWS Developer Associate"),
            Request::Hypothetical("AWS Developer Associate".to_string())
        );
    }

    #[test]
    fn test_aggregate_phrasing_is_never_guessed_as_a_cert_name() {
        let mut resolver = resolver(ScriptedFetcher::failing());
        assert_eq!(
            resolver.classify_request("How many points have I earned?"),
            Request::Unrecognized
        );
        assert_eq!(resolver.classify_request("how many points?"), Request::Unrecognized);

        let answer = resolver.answer("How many points have I earned?").unwrap();
        assert_eq!(answer.kind, AnswerKind::Unrecognized);
        assert_eq!(answer.points, None);
    }

    #[test]
    fn test_classify_request_unrecognized() {
        let resolver = resolver(ScriptedFetcher::failing());
        assert_eq!(resolver.classify_request("hello there"), Request::Unrecognized);
        assert_eq!(resolver.classify_request("   "), Request::Unrecognized);
    }

    #[test]
    fn test_extract_badge_url_trims_punctuation() {
        let text = format!("check {URL}, please");
        assert_eq!(extract_badge_url(&text), Some(URL.to_string()));
        assert_eq!(extract_badge_url("https://example.com/badges/x"), None);
    }

    // ------------------------------------------------------------------
    // badge-by-url
    // ------------------------------------------------------------------

    #[test]
    fn test_badge_by_url_fetches_persists_and_scores() {
        let fetcher = ScriptedFetcher::returning(raw(
            "AWS Certified Developer Associate",
            Some("2999-01-15"),
        ));
        let mut resolver = resolver(fetcher);

        let answer = resolver.answer(URL).unwrap();
        assert_eq!(answer.kind, AnswerKind::Badge);
        assert_eq!(answer.category, Some(Category::Associate));
        assert_eq!(answer.points, Some(5.0));
        assert_eq!(answer.valid, Some(true));
        assert_eq!(answer.effective_points, Some(5.0));

        // Persisted under its URL identity
        assert!(resolver.store().get_badge(URL).unwrap().is_some());
    }

    #[test]
    fn test_badge_by_url_uses_cache_before_fetch() {
        let fetcher = ScriptedFetcher::returning(raw(
            "AWS Certified Developer Associate",
            Some("2999-01-15"),
        ));
        let mut resolver = resolver(fetcher);

        resolver.answer(URL).unwrap();
        resolver.answer(URL).unwrap();
        assert_eq!(resolver.fetcher.calls.get(), 1);
    }

    #[test]
    fn test_expired_badge_scores_zero_and_names_lost_value() {
        let fetcher = ScriptedFetcher::returning(raw(
            "AWS Certified Developer Associate",
            Some("2024-01-15"),
        ));
        let mut resolver = resolver(fetcher);

        let answer = resolver.answer(URL).unwrap();
        assert_eq!(answer.kind, AnswerKind::Badge);
        assert_eq!(answer.valid, Some(false));
        assert_eq!(answer.effective_points, Some(0.0));
        assert!(answer.message.contains("expired on 2024-01-15"));
        assert!(answer.message.contains("5"));
    }

    #[test]
    fn test_unknown_category_badge_without_expiry() {
        let mut no_expiry = raw("Scrum Master Level I", None);
        no_expiry.issued = None;
        let mut resolver = resolver(ScriptedFetcher::returning(no_expiry));

        let answer = resolver.answer(URL).unwrap();
        assert_eq!(answer.category, Some(Category::Other));
        assert_eq!(answer.valid, Some(true));
        assert_eq!(answer.effective_points, Some(2.5));
    }

    #[test]
    fn test_fetch_error_is_distinct_and_writes_nothing() {
        let mut resolver = resolver(ScriptedFetcher::failing());

        let answer = resolver.answer(URL).unwrap();
        assert_eq!(answer.kind, AnswerKind::FetchError);
        assert_eq!(answer.points, None);
        assert_eq!(answer.effective_points, None);
        assert!(answer.message.contains("Could not retrieve badge"));

        assert!(resolver.store().all_badges().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // total-points
    // ------------------------------------------------------------------

    #[test]
    fn test_total_points_over_store() {
        let mut resolver = resolver(ScriptedFetcher::with_profile(vec![
            raw("AWS Certified Developer Associate", Some("2999-01-15")),
            RawBadge {
                url: "https://www.credly.com/badges/second/public_url".to_string(),
                name: "AWS Certified Security Specialty".to_string(),
                holder: None,
                issued: None,
                expires: Some("2024-01-15".to_string()),
                dates_banner: None,
            },
        ]));
        resolver.sync_profile("https://www.credly.com/users/jane/badges").unwrap();

        let answer = resolver.answer("total points").unwrap();
        assert_eq!(answer.kind, AnswerKind::Total);
        // Specialty badge expired: only the Associate 5 counts
        assert_eq!(answer.points, Some(5.0));
        assert!(answer.message.contains("1 of 2 badges valid"));
    }

    #[test]
    fn test_total_points_empty_store() {
        let mut resolver = resolver(ScriptedFetcher::failing());
        let answer = resolver.answer("total points").unwrap();
        assert_eq!(answer.points, Some(0.0));
    }

    // ------------------------------------------------------------------
    // hypothetical
    // ------------------------------------------------------------------

    #[test]
    fn test_hypothetical_is_marked_unearned_and_not_persisted() {
        let mut resolver = resolver(ScriptedFetcher::failing());

        let answer = resolver.answer("AWS Developer Associate").unwrap();
        assert_eq!(answer.kind, AnswerKind::Hypothetical);
        assert_eq!(answer.category, Some(Category::Associate));
        assert_eq!(answer.points, Some(5.0));
        assert_eq!(answer.valid, None);
        assert_eq!(answer.effective_points, None);
        assert!(answer.message.contains("Not yet earned"));

        assert!(resolver.store().all_badges().unwrap().is_empty());
    }

    #[test]
    fn test_hypothetical_unknown_cert_scores_other() {
        let mut resolver = resolver(ScriptedFetcher::failing());
        let answer = resolver
            .answer("How many points for Underwater Basket Weaving?")
            .unwrap();
        assert_eq!(answer.kind, AnswerKind::Hypothetical);
        assert_eq!(answer.category, Some(Category::Other));
        assert_eq!(answer.points, Some(2.5));
    }

    // ------------------------------------------------------------------
    // profile import
    // ------------------------------------------------------------------

    #[test]
    fn test_sync_profile_imports_and_summarizes() {
        let bad_card = RawBadge {
            url: "https://www.credly.com/badges/empty/public_url".to_string(),
            name: "   ".to_string(),
            holder: None,
            issued: None,
            expires: None,
            dates_banner: None,
        };
        let mut resolver = resolver(ScriptedFetcher::with_profile(vec![
            raw("AWS Certified Developer Associate", Some("2999-01-15")),
            bad_card,
        ]));

        let summary = resolver
            .sync_profile("https://www.credly.com/users/jane/badges")
            .unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.totals.total, 5.0);
        assert_eq!(resolver.store().all_badges().unwrap().len(), 1);
    }

    // ------------------------------------------------------------------
    // answer serialization
    // ------------------------------------------------------------------

    #[test]
    fn test_answer_kind_serializes_kebab_case() {
        let answer = Answer::bare(AnswerKind::FetchError, "x".to_string());
        let json = serde_json::to_string(&answer).unwrap();
        assert!(json.contains("\"fetch-error\""));
        // Unpopulated point fields stay off the wire
        assert!(!json.contains("points"));
    }
}
