// 🌐 Fetch Boundary - external badge/profile retrieval
// The browser-automation layer lives outside this crate. The core only sees
// "raw badge fields in, fetch failures out" through this trait.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// RAW FIELDS
// ============================================================================

/// Raw scraped fields for one badge, before normalization.
///
/// Everything except `url` and `name` is best-effort: public badge pages
/// frequently omit or malform dates, and the holder line is optional.
/// Dates may arrive as separate fields or as the page's combined
/// "Issued ... Expires ..." banner text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBadge {
    /// Public badge URL (the badge's identity once persisted)
    pub url: String,

    /// Certification title as it appears on the page
    pub name: String,

    #[serde(default)]
    pub holder: Option<String>,

    /// Issue date text, any format the page uses
    #[serde(default)]
    pub issued: Option<String>,

    /// Expiry date text, any format the page uses
    #[serde(default)]
    pub expires: Option<String>,

    /// Combined date banner ("Issued January 15, 2023 Expires January 15, 2026")
    /// used when the scraper could not split the dates apart
    #[serde(default)]
    pub dates_banner: Option<String>,
}

// ============================================================================
// FETCH ERRORS
// ============================================================================

/// Failure modes of the external fetch collaborator. Surfaced to callers as
/// a distinct query outcome; the core never retries (retry policy, if any,
/// belongs to the collaborator).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network failure fetching {0}")]
    Network(String),

    #[error("page structure not recognized at {0}")]
    PageStructure(String),

    #[error("rate limited by the badge service")]
    RateLimited,

    #[error("no fetch collaborator configured")]
    Backend,
}

// ============================================================================
// FETCHER TRAIT
// ============================================================================

/// External collaborator that retrieves badge pages.
///
/// A call may block on network and page rendering; any timeout is owned by
/// the implementation, not by this crate.
pub trait BadgeFetcher {
    /// Fetch one badge page and extract its raw fields
    fn fetch_badge(&self, url: &str) -> Result<RawBadge, FetchError>;

    /// Fetch a profile page and extract raw fields for every badge on it
    fn fetch_profile(&self, url: &str) -> Result<Vec<RawBadge>, FetchError>;
}

/// Placeholder fetcher for deployments without a scraper wired in: every
/// cache miss surfaces as a fetch-error answer instead of a crash.
pub struct NoFetcher;

impl BadgeFetcher for NoFetcher {
    fn fetch_badge(&self, _url: &str) -> Result<RawBadge, FetchError> {
        Err(FetchError::Backend)
    }

    fn fetch_profile(&self, _url: &str) -> Result<Vec<RawBadge>, FetchError> {
        Err(FetchError::Backend)
    }
}
