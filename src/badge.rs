// 🎓 Badge Model - Canonical certification records
// One normalized record per certification, scored by category

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// CATEGORY
// ============================================================================

/// Scoring category for a certification.
///
/// Closed set: every certification name resolves to exactly one of these,
/// with `Other` as the guaranteed fallback, so scoring is always possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Foundational,
    Associate,
    Professional,
    Specialty,
    /// Anything the classifier cannot place ("Other/Unknown")
    #[serde(rename = "Other/Unknown")]
    Other,
}

impl Category {
    /// All categories, in scoring-table order
    pub const ALL: [Category; 5] = [
        Category::Foundational,
        Category::Associate,
        Category::Professional,
        Category::Specialty,
        Category::Other,
    ];

    /// Human-readable name for display and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Foundational => "Foundational",
            Category::Associate => "Associate",
            Category::Professional => "Professional",
            Category::Specialty => "Specialty",
            Category::Other => "Other/Unknown",
        }
    }

    /// Parse a persisted category name back into the enum
    pub fn parse(text: &str) -> Option<Category> {
        match text.trim().to_lowercase().as_str() {
            "foundational" => Some(Category::Foundational),
            "associate" => Some(Category::Associate),
            "professional" => Some(Category::Professional),
            "specialty" => Some(Category::Specialty),
            "other/unknown" | "other" | "unknown" => Some(Category::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BADGE
// ============================================================================

/// A normalized certification record.
///
/// `identity` is the badge's public URL when it came from a fetch, or a
/// synthesized key derived from name+holder when no URL exists. Hypothetical
/// badges (not yet earned) carry no identity and are never persisted.
///
/// Validity is NOT a stored field: it is recomputed from `expires` against
/// the current date on every read, so a cached record's validity always
/// reflects current time rather than time-of-capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    /// Unique key for persistence (None = hypothetical, never stored)
    pub identity: Option<String>,

    /// Certification title, free text
    pub name: String,

    /// Credentialed person's display name
    pub holder: Option<String>,

    /// Date the certification was earned
    pub issued: Option<NaiveDate>,

    /// Date the certification lapses (None = does not expire)
    pub expires: Option<NaiveDate>,

    /// Scoring category, resolved by the classifier at normalization time
    pub category: Category,

    /// Scoring-table lookup for `category`, fixed at classification time
    pub points: f64,
}

impl Badge {
    /// Derived validity: no expiry, or expiry on/after the given date
    pub fn is_valid(&self, on: NaiveDate) -> bool {
        match self.expires {
            None => true,
            Some(expiry) => expiry >= on,
        }
    }

    /// Synthesize a stable identity for a badge with no public URL.
    /// Same name+holder always yields the same key.
    pub fn synthesize_identity(name: &str, holder: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.trim().to_lowercase());
        hasher.update("|");
        hasher.update(holder.unwrap_or("").trim().to_lowercase());
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================
