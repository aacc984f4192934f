//! Local persistent mirror of catalog records.
//!
//! One SQLite row per game, keyed by the remote id. Rows keep their insertion
//! order, the genre list is stored as an opaque JSON blob, and the local-only
//! `favorite`/`opened` flags live next to the remote fields.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::{
    error::StoreResult,
    models::{Game, GameUpdate, Genre},
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS games (
    row_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id          INTEGER NOT NULL UNIQUE,
    slug             TEXT,
    name             TEXT,
    released         TEXT,
    background_image TEXT,
    rating           REAL,
    metacritic       REAL,
    description      TEXT,
    reddit_url       TEXT,
    reddit_name      TEXT,
    website          TEXT,
    genres           TEXT,
    favorite         INTEGER NOT NULL DEFAULT 0,
    opened           INTEGER NOT NULL DEFAULT 0,
    synced_at        INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS games_favorite ON games (favorite);
";

const SELECT_GAME: &str = "SELECT game_id, slug, name, released, background_image, rating, \
     metacritic, description, reddit_url, reddit_name, website, genres, favorite, opened \
     FROM games";

/// Handle to the local store. Clones share one connection.
#[derive(Clone)]
pub struct GameStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl GameStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        };
        store.migrate()?;
        debug!("opened game store at {}", path.display());
        Ok(store)
    }

    /// Store that lives only as long as the handle.
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert every game whose id is not stored yet; existing rows are left
    /// untouched. Each row commits on its own, so a failure part-way keeps the
    /// earlier inserts. Returns the number of rows inserted.
    pub fn save_batch(&self, games: &[Game]) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let synced_at = Utc::now().timestamp();
        let mut inserted = 0;
        for game in games {
            let genres = game
                .genres
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let changed = conn.execute(
                "INSERT OR IGNORE INTO games (game_id, slug, name, released, background_image, \
                 rating, metacritic, description, reddit_url, reddit_name, website, genres, \
                 favorite, opened, synced_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    game.id,
                    game.slug,
                    game.name,
                    game.released,
                    game.background_image,
                    game.rating,
                    game.metacritic,
                    game.description,
                    game.reddit_url,
                    game.reddit_name,
                    game.website,
                    genres,
                    game.favorite,
                    game.opened,
                    synced_at,
                ],
            )?;
            if changed == 0 {
                debug!(game_id = game.id, "game already stored, skipping");
            }
            inserted += changed;
        }
        Ok(inserted)
    }

    /// Every complete record in insertion order.
    pub fn fetch_all(&self) -> StoreResult<Vec<Game>> {
        self.query_games(&format!("{SELECT_GAME} ORDER BY row_id"), [])
    }

    /// One page (1-based) of [`fetch_all`](Self::fetch_all). Incomplete rows
    /// still occupy their slot in the page window.
    pub fn fetch_page(&self, page: u32, page_size: u32) -> StoreResult<Vec<Game>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        self.query_games(
            &format!("{SELECT_GAME} ORDER BY row_id LIMIT ?1 OFFSET ?2"),
            params![i64::from(page_size), offset],
        )
    }

    /// Complete records flagged as favorite, in insertion order.
    pub fn fetch_favorites(&self) -> StoreResult<Vec<Game>> {
        self.query_games(
            &format!("{SELECT_GAME} WHERE favorite = 1 ORDER BY row_id"),
            [],
        )
    }

    /// The record stored under `id`, if present and complete.
    pub fn fetch_by_id(&self, id: i64) -> StoreResult<Option<Game>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("{SELECT_GAME} WHERE game_id = ?1"),
                params![id],
                GameRow::from_row,
            )
            .optional()?;
        Ok(row.and_then(GameRow::into_game))
    }

    /// Merge `update` into the row stored under `id`. Returns `false` when no
    /// such row exists.
    pub fn update_by_id(&self, id: i64, update: &GameUpdate) -> StoreResult<bool> {
        let genres = update
            .genres
            .as_ref()
            .filter(|genres| !genres.is_empty())
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE games SET \
                 slug = COALESCE(?2, slug), \
                 name = COALESCE(?3, name), \
                 released = COALESCE(?4, released), \
                 background_image = COALESCE(?5, background_image), \
                 rating = COALESCE(?6, rating), \
                 metacritic = COALESCE(?7, metacritic), \
                 description = COALESCE(?8, description), \
                 reddit_url = COALESCE(?9, reddit_url), \
                 reddit_name = COALESCE(?10, reddit_name), \
                 website = COALESCE(?11, website), \
                 genres = COALESCE(?12, genres), \
                 favorite = ?13, \
                 opened = (opened OR ?14), \
                 synced_at = ?15 \
             WHERE game_id = ?1",
            params![
                id,
                non_empty(&update.slug),
                non_empty(&update.name),
                non_empty(&update.released),
                non_empty(&update.background_image),
                update.rating,
                update.metacritic,
                non_empty(&update.description),
                non_empty(&update.reddit_url),
                non_empty(&update.reddit_name),
                non_empty(&update.website),
                genres,
                update.favorite,
                update.opened,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Remove the row stored under `id`. Returns whether a row was removed.
    pub fn delete_by_id(&self, id: i64) -> StoreResult<bool> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM games WHERE game_id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Remove every row, returning how many were removed.
    pub fn delete_all(&self) -> StoreResult<usize> {
        Ok(self.conn.lock().execute("DELETE FROM games", [])?)
    }

    /// Number of stored rows, complete or not.
    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    fn query_games<P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Vec<Game>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, GameRow::from_row)?;

        let mut games = Vec::new();
        for row in rows {
            if let Some(game) = row?.into_game() {
                games.push(game);
            }
        }
        Ok(games)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Raw column values before the completeness check.
struct GameRow {
    id: i64,
    slug: Option<String>,
    name: Option<String>,
    released: Option<String>,
    background_image: Option<String>,
    rating: Option<f64>,
    metacritic: Option<f64>,
    description: Option<String>,
    reddit_url: Option<String>,
    reddit_name: Option<String>,
    website: Option<String>,
    genres: Option<String>,
    favorite: bool,
    opened: bool,
}

impl GameRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            released: row.get(3)?,
            background_image: row.get(4)?,
            rating: row.get(5)?,
            metacritic: row.get(6)?,
            description: row.get(7)?,
            reddit_url: row.get(8)?,
            reddit_name: row.get(9)?,
            website: row.get(10)?,
            genres: row.get(11)?,
            favorite: row.get(12)?,
            opened: row.get(13)?,
        })
    }

    /// `None` for rows missing a mandatory field or carrying an unreadable
    /// genre blob.
    fn into_game(self) -> Option<Game> {
        let (Some(slug), Some(name), Some(released), Some(background_image)) =
            (self.slug, self.name, self.released, self.background_image)
        else {
            debug!(game_id = self.id, "skipping incomplete stored game");
            return None;
        };

        let genres = match self.genres.as_deref() {
            Some(blob) => match serde_json::from_str::<Vec<Genre>>(blob) {
                Ok(genres) => Some(genres),
                Err(err) => {
                    warn!(game_id = self.id, "skipping stored game with unreadable genres: {err}");
                    return None;
                }
            },
            None => None,
        };

        Some(Game {
            id: self.id,
            slug: Some(slug),
            name: Some(name),
            released: Some(released),
            background_image: Some(background_image),
            rating: self.rating,
            metacritic: self.metacritic,
            genres,
            description: self.description,
            reddit_url: self.reddit_url,
            reddit_name: self.reddit_name,
            website: self.website,
            favorite: self.favorite,
            opened: self.opened,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn sample_game(id: i64, name: &str) -> Game {
        Game {
            id,
            slug: Some(name.to_lowercase().replace(' ', "-")),
            name: Some(name.to_string()),
            released: Some("2015-05-18".to_string()),
            background_image: Some(format!("https://media.example/{id}.jpg")),
            rating: Some(4.66),
            metacritic: Some(92.0),
            genres: Some(vec![Genre {
                id: Some(5),
                name: Some("RPG".to_string()),
                slug: Some("role-playing-games-rpg".to_string()),
                background_image: Some(String::new()),
            }]),
            description: Some("<p>Monster hunting.</p>".to_string()),
            reddit_url: Some("https://www.reddit.com/r/witcher/".to_string()),
            reddit_name: Some("/r/witcher".to_string()),
            website: Some("https://thewitcher.com".to_string()),
            favorite: false,
            opened: false,
        }
    }

    #[test]
    fn batch_save_is_insert_once_per_id() -> Result<()> {
        let store = GameStore::in_memory()?;
        let games = vec![sample_game(3328, "The Witcher 3"), sample_game(3498, "GTA V")];

        assert_eq!(store.save_batch(&games)?, 2);
        assert_eq!(store.save_batch(&games)?, 0);
        assert_eq!(store.count()?, 2);

        let mut renamed = sample_game(3328, "Renamed");
        renamed.favorite = true;
        store.save_batch(&[renamed])?;
        let stored = store.fetch_by_id(3328)?.expect("stored game");
        assert_eq!(stored.name.as_deref(), Some("The Witcher 3"));
        assert!(!stored.favorite);
        Ok(())
    }

    #[test]
    fn fetch_all_keeps_insertion_order_and_skips_incomplete_rows() -> Result<()> {
        let store = GameStore::in_memory()?;
        let mut incomplete = sample_game(7, "No Cover");
        incomplete.background_image = None;
        store.save_batch(&[
            sample_game(900, "Zeta"),
            incomplete,
            sample_game(12, "Alpha"),
        ])?;

        let ids: Vec<_> = store.fetch_all()?.iter().map(|game| game.id).collect();
        assert_eq!(ids, vec![900, 12]);
        assert_eq!(store.count()?, 3);
        assert!(store.fetch_by_id(7)?.is_none());
        Ok(())
    }

    #[test]
    fn genres_round_trip_through_blob() -> Result<()> {
        let store = GameStore::in_memory()?;
        let game = sample_game(3328, "The Witcher 3");
        store.save_batch(std::slice::from_ref(&game))?;
        assert_eq!(store.fetch_by_id(3328)?, Some(game));
        Ok(())
    }

    #[test]
    fn unreadable_genre_blob_is_skipped() -> Result<()> {
        let store = GameStore::in_memory()?;
        store.save_batch(&[sample_game(1, "One"), sample_game(2, "Two")])?;
        store
            .conn
            .lock()
            .execute("UPDATE games SET genres = 'not json' WHERE game_id = 1", [])?;

        let ids: Vec<_> = store.fetch_all()?.iter().map(|game| game.id).collect();
        assert_eq!(ids, vec![2]);
        Ok(())
    }

    #[test]
    fn fetch_page_windows_by_insertion_order() -> Result<()> {
        let store = GameStore::in_memory()?;
        let games: Vec<_> = (1..=5)
            .map(|id| sample_game(id, &format!("Game {id}")))
            .collect();
        store.save_batch(&games)?;

        let page = |n| -> Result<Vec<i64>> {
            Ok(store.fetch_page(n, 2)?.iter().map(|game| game.id).collect())
        };
        assert_eq!(page(1)?, vec![1, 2]);
        assert_eq!(page(3)?, vec![5]);
        assert!(page(4)?.is_empty());
        Ok(())
    }

    #[test]
    fn update_merges_present_fields_only() -> Result<()> {
        let store = GameStore::in_memory()?;
        store.save_batch(&[sample_game(3328, "The Witcher 3")])?;

        let update = GameUpdate {
            name: Some("The Witcher 3: Wild Hunt".to_string()),
            description: Some(String::new()),
            rating: Some(4.7),
            favorite: true,
            ..GameUpdate::default()
        };
        assert!(store.update_by_id(3328, &update)?);

        let stored = store.fetch_by_id(3328)?.expect("stored game");
        assert_eq!(stored.name.as_deref(), Some("The Witcher 3: Wild Hunt"));
        assert_eq!(stored.description.as_deref(), Some("<p>Monster hunting.</p>"));
        assert_eq!(stored.rating, Some(4.7));
        assert_eq!(stored.slug.as_deref(), Some("the-witcher-3"));
        assert_eq!(stored.genres.as_ref().map(Vec::len), Some(1));
        assert!(stored.favorite);

        assert!(store.update_by_id(3328, &GameUpdate::favorite(false))?);
        assert!(!store.fetch_by_id(3328)?.expect("stored game").favorite);
        Ok(())
    }

    #[test]
    fn opened_flag_is_sticky() -> Result<()> {
        let store = GameStore::in_memory()?;
        store.save_batch(&[sample_game(1, "One")])?;

        let opened = GameUpdate {
            opened: true,
            ..GameUpdate::default()
        };
        store.update_by_id(1, &opened)?;
        store.update_by_id(1, &GameUpdate::favorite(true))?;
        let stored = store.fetch_by_id(1)?.expect("stored game");
        assert!(stored.opened);
        assert!(stored.favorite);
        Ok(())
    }

    #[test]
    fn update_of_unknown_id_is_a_no_op() -> Result<()> {
        let store = GameStore::in_memory()?;
        assert!(!store.update_by_id(42, &GameUpdate::favorite(true))?);
        assert_eq!(store.count()?, 0);
        Ok(())
    }

    #[test]
    fn favorites_and_deletes() -> Result<()> {
        let store = GameStore::in_memory()?;
        store.save_batch(&[
            sample_game(1, "One"),
            sample_game(2, "Two"),
            sample_game(3, "Three"),
        ])?;
        store.update_by_id(3, &GameUpdate::favorite(true))?;
        store.update_by_id(1, &GameUpdate::favorite(true))?;

        let favorites: Vec<_> = store.fetch_favorites()?.iter().map(|g| g.id).collect();
        assert_eq!(favorites, vec![1, 3]);

        assert!(store.delete_by_id(1)?);
        assert!(!store.delete_by_id(1)?);
        assert_eq!(store.fetch_favorites()?.len(), 1);

        assert_eq!(store.delete_all()?, 2);
        assert!(store.fetch_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn file_store_persists_across_handles() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data").join("games.db");
        {
            let store = GameStore::open(&path)?;
            store.save_batch(&[sample_game(3498, "GTA V")])?;
            store.update_by_id(3498, &GameUpdate::favorite(true))?;
        }

        let reopened = GameStore::open(&path)?;
        assert_eq!(reopened.path(), Some(path.as_path()));
        let favorites = reopened.fetch_favorites()?;
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, 3498);
        Ok(())
    }
}
