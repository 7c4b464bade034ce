// 🏷️ Category Classifier - name → category resolution
// Deterministic priority: exact table match > longest table substring >
// keyword rule > Other/Unknown. Classification is total by construction.

use crate::badge::Category;

// ============================================================================
// NAME NORMALIZATION
// ============================================================================

/// Canonical form used for all table lookups: collapsed whitespace,
/// ASCII-lowercased. Certification titles arrive with inconsistent casing
/// and spacing depending on whether they were scraped or user-typed.
pub fn normalize_name(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// KEYWORD RULES
// ============================================================================

/// Fallback keyword rule, applied only when no table entry matches
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub keyword: &'static str,
    pub category: Category,
    /// Higher priority wins; ties are impossible within the fixed table
    pub priority: i32,
}

/// Keyword precedence table. Order here is documentation; matching sorts by
/// priority, so adding a rule out of order cannot change behavior.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule { keyword: "practitioner", category: Category::Foundational, priority: 60 },
    KeywordRule { keyword: "foundational", category: Category::Foundational, priority: 55 },
    KeywordRule { keyword: "professional", category: Category::Professional, priority: 50 },
    KeywordRule { keyword: "specialty", category: Category::Specialty, priority: 40 },
    KeywordRule { keyword: "advanced", category: Category::Specialty, priority: 35 },
    KeywordRule { keyword: "associate", category: Category::Associate, priority: 30 },
    // Hashicorp certifications score with the Associate bucket
    KeywordRule { keyword: "hashicorp", category: Category::Associate, priority: 25 },
];

// ============================================================================
// DEFAULT NAME → CATEGORY TABLE
// ============================================================================

/// Curated seed mappings. These are inserted into the store's
/// category_mappings table on first setup and loaded back into the
/// classifier at startup.
pub const DEFAULT_MAPPINGS: &[(&str, Category)] = &[
    ("aws certified cloud practitioner", Category::Foundational),
    ("cloud practitioner", Category::Foundational),
    ("aws certified solutions architect associate", Category::Associate),
    ("solutions architect associate", Category::Associate),
    ("aws certified developer associate", Category::Associate),
    ("developer associate", Category::Associate),
    ("aws certified sysops administrator associate", Category::Associate),
    ("sysops administrator associate", Category::Associate),
    ("sysops associate", Category::Associate),
    ("aws certified solutions architect professional", Category::Professional),
    ("solutions architect professional", Category::Professional),
    ("aws certified devops engineer professional", Category::Professional),
    ("devops engineer professional", Category::Professional),
    ("devops professional", Category::Professional),
    ("aws certified advanced networking specialty", Category::Specialty),
    ("advanced networking specialty", Category::Specialty),
    ("aws certified security specialty", Category::Specialty),
    ("security specialty", Category::Specialty),
    ("aws certified machine learning specialty", Category::Specialty),
    ("machine learning specialty", Category::Specialty),
    ("aws certified database specialty", Category::Specialty),
    ("database specialty", Category::Specialty),
    ("aws certified data analytics specialty", Category::Specialty),
    ("data analytics specialty", Category::Specialty),
    ("aws certified sap on aws specialty", Category::Specialty),
    ("sap on aws specialty", Category::Specialty),
];

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Maps free-text certification names to scoring categories.
///
/// The known-name table is append-only: `learn` never overwrites an existing
/// entry, so a curated mapping can't be clobbered by a heuristic one.
/// Classification itself is read-only and always succeeds: every input must
/// be scoreable, so the final fallback is `Category::Other`.
pub struct Classifier {
    /// Normalized name → category, sorted longest-entry-first so that
    /// substring matching deterministically prefers the most specific entry
    known: Vec<(String, Category)>,
}

impl Classifier {
    /// Create an empty classifier (keyword rules only)
    pub fn new() -> Self {
        Classifier { known: Vec::new() }
    }

    /// Create a classifier seeded with the curated default table
    pub fn with_defaults() -> Self {
        Self::from_mappings(
            DEFAULT_MAPPINGS
                .iter()
                .map(|(name, category)| (name.to_string(), *category)),
        )
    }

    /// Create a classifier from an explicit mapping set (normally the
    /// store's category_mappings table)
    pub fn from_mappings<I>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (String, Category)>,
    {
        let mut classifier = Classifier::new();
        for (name, category) in mappings {
            classifier.learn(&name, category);
        }
        classifier
    }

    /// Add a mapping to the in-memory table. Existing entries are kept
    /// as-is: learning never remaps a known name.
    pub fn learn(&mut self, name: &str, category: Category) {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return;
        }
        if self.known.iter().any(|(entry, _)| *entry == normalized) {
            return;
        }
        self.known.push((normalized, category));
        // Longest first; lexicographic tie-break keeps ordering stable
        self.known.sort_by(|a, b| {
            b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0))
        });
    }

    /// Table-only lookup: exact normalized match first, then the longest
    /// table entry contained in the name. Returns None on a full table miss.
    pub fn known_match(&self, name: &str) -> Option<Category> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return None;
        }

        if let Some((_, category)) = self.known.iter().find(|(entry, _)| *entry == normalized) {
            return Some(*category);
        }

        self.known
            .iter()
            .find(|(entry, _)| normalized.contains(entry.as_str()))
            .map(|(_, category)| *category)
    }

    /// Keyword fallback, fixed precedence. Separate from `known_match` so
    /// callers can tell a curated hit from a heuristic one.
    pub fn keyword_match(&self, name: &str) -> Option<Category> {
        let normalized = normalize_name(name);
        KEYWORD_RULES
            .iter()
            .filter(|rule| normalized.contains(rule.keyword))
            .max_by_key(|rule| rule.priority)
            .map(|rule| rule.category)
    }

    /// Classify a certification name. Total: always returns a category.
    pub fn classify(&self, name: &str) -> Category {
        self.known_match(name)
            .or_else(|| self.keyword_match(name))
            .unwrap_or(Category::Other)
    }

    /// Number of known-name mappings loaded
    pub fn mapping_count(&self) -> usize {
        self.known.len()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TESTS
// ============================================================================
