// ⭐ Scoring Table & Engine - category → points, expiry-aware
// The table is loaded once at startup (built-in defaults or a JSON config
// file) and immutable afterwards. Validity is recomputed on every read.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::badge::{Badge, Category};

// ============================================================================
// SCORING TABLE
// ============================================================================

/// Fixed category → point mapping.
///
/// Every `Category` variant MUST have an entry; construction enforces this,
/// so a miss inside `points_for` is a programming-invariant violation
/// (classifier/table mismatch) and aborts rather than silently scoring 0.
#[derive(Debug, Clone)]
pub struct ScoringTable {
    points: HashMap<Category, f64>,
}

impl ScoringTable {
    /// Built-in point values:
    /// Foundational=10, Associate=5, Professional=10, Specialty=10,
    /// Other/Unknown=2.5
    pub fn builtin() -> Self {
        let mut points = HashMap::new();
        points.insert(Category::Foundational, 10.0);
        points.insert(Category::Associate, 5.0);
        points.insert(Category::Professional, 10.0);
        points.insert(Category::Specialty, 10.0);
        points.insert(Category::Other, 2.5);
        ScoringTable { points }
    }

    /// Load a scoring table from a JSON file of the shape
    /// `{"Foundational": 10, "Associate": 5, ...}`.
    ///
    /// The config must cover every category and may not name unknown ones;
    /// a partial table is a startup error, never a silent default.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read scoring config: {:?}", path.as_ref()))?;

        let raw: HashMap<String, f64> =
            serde_json::from_str(&content).context("Failed to parse scoring config JSON")?;

        let mut points = HashMap::new();
        for (name, value) in &raw {
            let category = match Category::parse(name) {
                Some(category) => category,
                None => bail!("Unknown category in scoring config: {name:?}"),
            };
            if points.insert(category, *value).is_some() {
                bail!("Duplicate category in scoring config: {name:?}");
            }
        }

        for category in Category::ALL {
            if !points.contains_key(&category) {
                bail!("Scoring config is missing category: {}", category);
            }
        }

        Ok(ScoringTable { points })
    }

    /// Point value for a category. Pure lookup, no state.
    pub fn points_for(&self, category: Category) -> f64 {
        match self.points.get(&category) {
            Some(points) => *points,
            // Unreachable for any table built through this module; if it
            // fires, the table and the classifier's category set diverged.
            None => panic!("scoring table has no entry for category {category}"),
        }
    }

    // ========================================================================
    // SCORING ENGINE
    // ========================================================================

    /// Score a badge at a given date. `effective_points` is what the badge
    /// contributes to a total: 0 when expired. The stored record is never
    /// trusted for validity; it is recomputed from `expires` here.
    pub fn score(&self, badge: &Badge, on: NaiveDate) -> Score {
        let valid = badge.is_valid(on);
        Score {
            points: badge.points,
            valid,
            effective_points: if valid { badge.points } else { 0.0 },
        }
    }

    /// Sum of effective points over a badge set, recomputed fresh from the
    /// full set each call. No incremental running total is kept: a badge
    /// whose expiry silently passed must drop out without any write.
    pub fn total_points(&self, badges: &[Badge], on: NaiveDate) -> f64 {
        badges
            .iter()
            .map(|badge| self.score(badge, on).effective_points)
            .sum()
    }

    /// Per-category totals for summary output
    pub fn totals(&self, badges: &[Badge], on: NaiveDate) -> Totals {
        let mut by_category: HashMap<Category, BreakdownLine> = HashMap::new();

        let mut valid_count = 0;
        for badge in badges {
            let score = self.score(badge, on);
            let line = by_category
                .entry(badge.category)
                .or_insert_with(|| BreakdownLine {
                    category: badge.category,
                    count: 0,
                    valid_count: 0,
                    effective_points: 0.0,
                });
            line.count += 1;
            if score.valid {
                line.valid_count += 1;
                line.effective_points += score.effective_points;
                valid_count += 1;
            }
        }

        // Summary lines come out in fixed category order
        let lines = Category::ALL
            .iter()
            .filter_map(|category| by_category.remove(category))
            .collect();

        Totals {
            total: self.total_points(badges, on),
            badge_count: badges.len(),
            valid_count,
            lines,
        }
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// SCORE TYPES
// ============================================================================

/// Scoring result for one badge at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub points: f64,
    pub valid: bool,
    pub effective_points: f64,
}

/// One category's share of a badge set
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownLine {
    pub category: Category,
    pub count: usize,
    pub valid_count: usize,
    pub effective_points: f64,
}

/// Aggregate over the full badge set at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub total: f64,
    pub badge_count: usize,
    pub valid_count: usize,
    pub lines: Vec<BreakdownLine>,
}

/// Render a point value without a spurious trailing ".0" (5, not 5.0;
/// but 2.5 stays 2.5)
pub fn fmt_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{:.0}", points)
    } else {
        format!("{}", points)
    }
}

// ============================================================================
// TESTS
// ============================================================================
