// Credpoints - Core Library
// Badge normalization and scoring engine: turns scraped Credly badges or
// bare certification names into deterministic, cached, point-scored records.

pub mod badge;
pub mod classifier;
pub mod fetch;
pub mod normalizer;
pub mod resolver;
pub mod scoring;
pub mod store;

// Re-export commonly used types
pub use badge::{Badge, Category};
pub use classifier::{normalize_name, Classifier, KeywordRule, DEFAULT_MAPPINGS, KEYWORD_RULES};
pub use fetch::{BadgeFetcher, FetchError, NoFetcher, RawBadge};
pub use normalizer::{hypothetical, normalize_fetched, parse_badge_date, parse_dates_banner};
pub use resolver::{
    extract_badge_url, Answer, AnswerKind, ProfileSummary, Request, Resolver,
};
pub use scoring::{fmt_points, BreakdownLine, Score, ScoringTable, Totals};
pub use store::{BadgeStore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
