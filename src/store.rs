// 🗄️ Badge Store - keyed persistence boundary
// The core only depends on the BadgeStore trait; SqliteStore is the
// shipped implementation. Badges are upserted by identity (re-fetch
// overwrites), never deleted here. The name → category table is seeded
// with the curated defaults on first setup and is append-only.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::badge::{Badge, Category};
use crate::classifier::{normalize_name, DEFAULT_MAPPINGS};

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Keyed persistence for normalized badges and the name → category table.
///
/// Consulted before any fetch, updated after any successful fetch.
pub trait BadgeStore {
    /// Look up a badge by identity (its public URL, normally)
    fn get_badge(&self, identity: &str) -> Result<Option<Badge>>;

    /// Insert or overwrite a badge by identity. Fails for hypothetical
    /// badges, which have no identity by construction.
    fn put_badge(&mut self, badge: &Badge) -> Result<()>;

    /// Every stored badge, in stable order
    fn all_badges(&self) -> Result<Vec<Badge>>;

    /// Exact lookup in the name → category table (normalized name key)
    fn get_category(&self, name: &str) -> Result<Option<Category>>;

    /// Append a name → category mapping. Existing mappings win: a learned
    /// heuristic pair never overwrites a curated one.
    fn put_category(&mut self, name: &str, category: Category) -> Result<()>;

    /// Full name → category table, for seeding the classifier at startup
    fn all_categories(&self) -> Result<Vec<(String, Category)>>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a file-backed store
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open badge database: {:?}", path.as_ref()))?;
        let store = SqliteStore { conn };
        store.setup()?;
        Ok(store)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = SqliteStore { conn };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<()> {
        // WAL for crash recovery; a no-op on in-memory connections
        let _ = self.conn.pragma_update(None, "journal_mode", "WAL");

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS badges (
                identity TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                holder TEXT,
                issued TEXT,
                expires TEXT,
                category TEXT NOT NULL,
                points REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS category_mappings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cert_name TEXT UNIQUE NOT NULL,
                category TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_badges_name ON badges(name)",
            [],
        )?;

        self.seed_default_mappings()?;

        Ok(())
    }

    /// Insert the curated default mappings when the table is empty
    fn seed_default_mappings(&self) -> Result<()> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM category_mappings", [], |row| row.get(0))?;

        if count == 0 {
            let mut stmt = self.conn.prepare(
                "INSERT OR IGNORE INTO category_mappings (cert_name, category) VALUES (?1, ?2)",
            )?;
            for (name, category) in DEFAULT_MAPPINGS {
                stmt.execute(params![name, category.as_str()])?;
            }
            info!(mappings = DEFAULT_MAPPINGS.len(), "seeded default category mappings");
        }

        Ok(())
    }

    fn row_to_badge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Badge> {
        let identity: String = row.get(0)?;
        let issued: Option<String> = row.get(3)?;
        let expires: Option<String> = row.get(4)?;
        let category_text: String = row.get(5)?;

        // A category written by this crate always parses back; anything else
        // is row corruption. Scored as Other/Unknown, loudly.
        let category = Category::parse(&category_text).unwrap_or_else(|| {
            warn!(
                identity = %identity,
                category = %category_text,
                "unrecognized stored category, scoring as Other/Unknown"
            );
            Category::Other
        });

        Ok(Badge {
            identity: Some(identity),
            name: row.get(1)?,
            holder: row.get(2)?,
            issued: issued.and_then(|text| parse_stored_date(&text)),
            expires: expires.and_then(|text| parse_stored_date(&text)),
            category,
            points: row.get(6)?,
        })
    }
}

/// Stored dates are ISO (`%Y-%m-%d`); anything else in an old row is
/// treated as "date unknown" rather than failing the whole read
fn parse_stored_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn date_to_stored(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

impl BadgeStore for SqliteStore {
    fn get_badge(&self, identity: &str) -> Result<Option<Badge>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, name, holder, issued, expires, category, points
             FROM badges WHERE identity = ?1",
        )?;

        let badge = stmt
            .query_map(params![identity], Self::row_to_badge)?
            .next()
            .transpose()?;

        debug!(identity, hit = badge.is_some(), "badge lookup");
        Ok(badge)
    }

    fn put_badge(&mut self, badge: &Badge) -> Result<()> {
        let Some(identity) = badge.identity.as_deref() else {
            bail!("hypothetical badge has no identity and cannot be persisted");
        };

        self.conn.execute(
            "INSERT INTO badges (identity, name, holder, issued, expires, category, points, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, CURRENT_TIMESTAMP)
             ON CONFLICT(identity) DO UPDATE SET
                name = excluded.name,
                holder = excluded.holder,
                issued = excluded.issued,
                expires = excluded.expires,
                category = excluded.category,
                points = excluded.points,
                updated_at = CURRENT_TIMESTAMP",
            params![
                identity,
                badge.name,
                badge.holder,
                date_to_stored(badge.issued),
                date_to_stored(badge.expires),
                badge.category.as_str(),
                badge.points,
            ],
        )?;

        info!(identity, name = %badge.name, category = %badge.category, "stored badge");
        Ok(())
    }

    fn all_badges(&self) -> Result<Vec<Badge>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, name, holder, issued, expires, category, points
             FROM badges ORDER BY points DESC, name",
        )?;

        let badges = stmt
            .query_map([], Self::row_to_badge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(badges)
    }

    fn get_category(&self, name: &str) -> Result<Option<Category>> {
        let normalized = normalize_name(name);
        let mut stmt = self
            .conn
            .prepare("SELECT category FROM category_mappings WHERE cert_name = ?1")?;

        let category = stmt
            .query_map(params![normalized], |row| row.get::<_, String>(0))?
            .next()
            .transpose()?
            .and_then(|text| Category::parse(&text));

        Ok(category)
    }

    fn put_category(&mut self, name: &str, category: Category) -> Result<()> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            bail!("cannot map an empty certification name");
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO category_mappings (cert_name, category) VALUES (?1, ?2)",
            params![normalized, category.as_str()],
        )?;

        if inserted > 0 {
            info!(name = %normalized, category = %category, "learned category mapping");
        }
        Ok(())
    }

    fn all_categories(&self) -> Result<Vec<(String, Category)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cert_name, category FROM category_mappings ORDER BY cert_name")?;

        let mappings = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let category_text: String = row.get(1)?;
                Ok((name, category_text))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter_map(|(name, text)| Category::parse(&text).map(|category| (name, category)))
            .collect();

        Ok(mappings)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_badge(identity: &str, name: &str, category: Category, points: f64) -> Badge {
        Badge {
            identity: Some(identity.to_string()),
            name: name.to_string(),
            holder: Some("Jane Roe".to_string()),
            issued: NaiveDate::from_ymd_opt(2023, 1, 15),
            expires: NaiveDate::from_ymd_opt(2026, 1, 15),
            category,
            points,
        }
    }

    #[test]
    fn test_put_get_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let badge = sample_badge(
            "https://www.credly.com/badges/abc/public_url",
            "AWS Certified Developer Associate",
            Category::Associate,
            5.0,
        );

        store.put_badge(&badge).unwrap();
        let loaded = store
            .get_badge("https://www.credly.com/badges/abc/public_url")
            .unwrap()
            .unwrap();
        assert_eq!(loaded, badge);
    }

    #[test]
    fn test_get_badge_miss() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_badge("https://nowhere").unwrap().is_none());
    }

    #[test]
    fn test_put_badge_upserts_on_refetch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let url = "https://www.credly.com/badges/abc/public_url";

        store
            .put_badge(&sample_badge(url, "Old Title", Category::Other, 2.5))
            .unwrap();

        let mut refetched = sample_badge(
            url,
            "AWS Certified Security Specialty",
            Category::Specialty,
            10.0,
        );
        refetched.expires = NaiveDate::from_ymd_opt(2027, 3, 1);
        store.put_badge(&refetched).unwrap();

        let loaded = store.get_badge(url).unwrap().unwrap();
        assert_eq!(loaded.name, "AWS Certified Security Specialty");
        assert_eq!(loaded.category, Category::Specialty);
        assert_eq!(loaded.expires, NaiveDate::from_ymd_opt(2027, 3, 1));
        assert_eq!(store.all_badges().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupted_category_column_scores_as_other() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let url = "https://www.credly.com/badges/abc/public_url";
        store
            .put_badge(&sample_badge(url, "Mystery Cert", Category::Associate, 5.0))
            .unwrap();

        store
            .conn
            .execute(
                "UPDATE badges SET category = 'Wizard' WHERE identity = ?1",
                params![url],
            )
            .unwrap();

        let loaded = store.get_badge(url).unwrap().unwrap();
        assert_eq!(loaded.category, Category::Other);
    }

    #[test]
    fn test_hypothetical_badge_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut badge = sample_badge("x", "Dreamed Cert", Category::Other, 2.5);
        badge.identity = None;

        assert!(store.put_badge(&badge).is_err());
    }

    #[test]
    fn test_default_mappings_are_seeded() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(
            store.get_category("aws certified developer associate").unwrap(),
            Some(Category::Associate)
        );
        assert_eq!(store.all_categories().unwrap().len(), DEFAULT_MAPPINGS.len());
    }

    #[test]
    fn test_get_category_normalizes_lookup_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(
            store.get_category("  AWS  Certified Developer   ASSOCIATE ").unwrap(),
            Some(Category::Associate)
        );
    }

    #[test]
    fn test_put_category_never_overwrites() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .put_category("kubernetes administrator", Category::Professional)
            .unwrap();
        store
            .put_category("kubernetes administrator", Category::Other)
            .unwrap();

        assert_eq!(
            store.get_category("kubernetes administrator").unwrap(),
            Some(Category::Professional)
        );
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("badges.db");
        let url = "https://www.credly.com/badges/abc/public_url";

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .put_badge(&sample_badge(url, "AWS Certified Developer Associate", Category::Associate, 5.0))
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_badge(url).unwrap().is_some());
        // Reopening must not duplicate the seed rows
        assert_eq!(store.all_categories().unwrap().len(), DEFAULT_MAPPINGS.len());
    }
}
