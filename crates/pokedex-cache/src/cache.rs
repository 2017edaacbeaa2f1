use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::models::{MoveRow, PokemonRow, RemoteKey};
use crate::query::ListQuery;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pokemon_list (
    name TEXT PRIMARY KEY,
    image_url TEXT NOT NULL,
    number INTEGER NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    detail TEXT,
    types TEXT NOT NULL DEFAULT '[]',
    hp INTEGER NOT NULL DEFAULT 0,
    attack INTEGER NOT NULL DEFAULT 0,
    defense INTEGER NOT NULL DEFAULT 0,
    special_attack INTEGER NOT NULL DEFAULT 0,
    special_defense INTEGER NOT NULL DEFAULT 0,
    speed INTEGER NOT NULL DEFAULT 0,
    cached_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pokemon_list_number ON pokemon_list(number);

-- One continuation record per listed item, keyed like pokemon_list.
-- prev_key/next_key are item offsets into the remote index.
CREATE TABLE IF NOT EXISTS remote_keys (
    name TEXT PRIMARY KEY,
    prev_key INTEGER,
    next_key INTEGER
);

-- Durable record of the user's favorites; survives clearing pokemon_list on refresh
CREATE TABLE IF NOT EXISTS favorites (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS moves (
    name TEXT PRIMARY KEY,
    url TEXT NOT NULL
);
"#;

const POKEMON_COLUMNS: &str = "name, image_url, number, is_favorite, detail, types, \
     hp, attack, defense, special_attack, special_defense, speed, cached_at";

/// Cache manager using SQLite
///
/// SQLite was chosen because:
/// - Zero-config embedded database
/// - Real transactions, so a refresh never exposes a half-cleared list
/// - Doesn't require a separate process
pub struct CacheManager {
    conn: Mutex<Connection>,
}

impl CacheManager {
    /// Open (or create) the cache database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        debug!("Opening cache at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// Throwaway in-memory cache, mostly for tests
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Run `f` inside a single SQLite transaction.
    ///
    /// Commits when `f` returns Ok, rolls back otherwise. Other readers of this
    /// cache block on the connection lock until the transaction is done, so they
    /// see either the old state or the new one, never the middle.
    /// The closure's error type only has to accept cache errors, so callers can
    /// mix in their own fallible steps and still use `?` on cache operations.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&CacheTx<'_>) -> std::result::Result<T, E>,
        E: From<CacheError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(CacheError::from)?;
        let out = f(&CacheTx { conn: &tx })?;
        tx.commit().map_err(CacheError::from)?;
        Ok(out)
    }

    fn with<T>(&self, f: impl FnOnce(&CacheTx<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&CacheTx { conn: &conn })
    }

    pub fn insert_pokemon(&self, rows: &[PokemonRow]) -> Result<()> {
        self.transaction(|tx| tx.insert_pokemon(rows))
    }

    pub fn clear_pokemon(&self) -> Result<()> {
        self.with(|tx| tx.clear_pokemon())
    }

    pub fn get_pokemon(&self, name: &str) -> Result<Option<PokemonRow>> {
        self.with(|tx| tx.get_pokemon(name))
    }

    pub fn update_pokemon_detail(&self, name: &str, detail: &serde_json::Value) -> Result<bool> {
        self.with(|tx| tx.update_pokemon_detail(name, detail))
    }

    pub fn set_favorite(&self, name: &str, is_favorite: bool) -> Result<bool> {
        self.transaction(|tx| tx.set_favorite(name, is_favorite))
    }

    pub fn is_favorite(&self, name: &str) -> Result<bool> {
        self.with(|tx| tx.is_favorite(name))
    }

    pub fn query_pokemon(
        &self,
        query: &ListQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PokemonRow>> {
        self.with(|tx| tx.query_pokemon(query, limit, offset))
    }

    pub fn count_pokemon(&self, query: &ListQuery) -> Result<usize> {
        self.with(|tx| tx.count_pokemon(query))
    }

    pub fn insert_remote_keys(&self, keys: &[RemoteKey]) -> Result<()> {
        self.transaction(|tx| tx.insert_remote_keys(keys))
    }

    pub fn remote_key(&self, name: &str) -> Result<Option<RemoteKey>> {
        self.with(|tx| tx.remote_key(name))
    }

    pub fn furthest_remote_key(&self) -> Result<Option<RemoteKey>> {
        self.with(|tx| tx.furthest_remote_key())
    }

    pub fn clear_remote_keys(&self) -> Result<()> {
        self.with(|tx| tx.clear_remote_keys())
    }

    pub fn insert_moves(&self, moves: &[MoveRow]) -> Result<()> {
        self.transaction(|tx| tx.insert_moves(moves))
    }

    pub fn moves(&self, limit: usize, offset: usize) -> Result<Vec<MoveRow>> {
        self.with(|tx| tx.moves(limit, offset))
    }

    pub fn count_moves(&self) -> Result<usize> {
        self.with(|tx| tx.count_moves())
    }

    pub fn clear_moves(&self) -> Result<()> {
        self.with(|tx| tx.clear_moves())
    }
}

/// Cache operations bound to one connection, handed out by [`CacheManager::transaction`]
pub struct CacheTx<'c> {
    conn: &'c Connection,
}

impl CacheTx<'_> {
    /// Insert or replace rows by name
    pub fn insert_pokemon(&self, rows: &[PokemonRow]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT OR REPLACE INTO pokemon_list ({}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            POKEMON_COLUMNS
        ))?;

        for row in rows {
            let detail = row.detail.as_ref().map(serde_json::to_string).transpose()?;
            let types = serde_json::to_string(&row.types)?;
            stmt.execute(params![
                row.name,
                row.image_url,
                row.number,
                row.is_favorite,
                detail,
                types,
                row.hp,
                row.attack,
                row.defense,
                row.special_attack,
                row.special_defense,
                row.speed,
                row.cached_at.timestamp(),
            ])?;
        }

        Ok(())
    }

    pub fn clear_pokemon(&self) -> Result<()> {
        self.conn.execute("DELETE FROM pokemon_list", [])?;
        Ok(())
    }

    pub fn get_pokemon(&self, name: &str) -> Result<Option<PokemonRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pokemon_list WHERE name = ?1", POKEMON_COLUMNS),
                params![name],
                pokemon_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Attach a freshly fetched detail blob. Returns false if no such row exists.
    pub fn update_pokemon_detail(&self, name: &str, detail: &serde_json::Value) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE pokemon_list SET detail = ?1 WHERE name = ?2",
            params![serde_json::to_string(detail)?, name],
        )?;
        Ok(changed > 0)
    }

    /// Flip the favorite flag on a cached row. Returns false (and records nothing)
    /// when the name isn't cached.
    pub fn set_favorite(&self, name: &str, is_favorite: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE pokemon_list SET is_favorite = ?1 WHERE name = ?2",
            params![is_favorite, name],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        if is_favorite {
            self.conn.execute(
                "INSERT OR IGNORE INTO favorites (name) VALUES (?1)",
                params![name],
            )?;
        } else {
            self.conn
                .execute("DELETE FROM favorites WHERE name = ?1", params![name])?;
        }
        Ok(true)
    }

    /// Favorite status as last set by the user, whether or not the row is currently cached
    pub fn is_favorite(&self, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM favorites WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn query_pokemon(
        &self,
        query: &ListQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PokemonRow>> {
        let (sql, values) = query.page_sql(POKEMON_COLUMNS, limit, offset);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), pokemon_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_pokemon(&self, query: &ListQuery) -> Result<usize> {
        let (sql, values) = query.count_sql();
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn insert_remote_keys(&self, keys: &[RemoteKey]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO remote_keys (name, prev_key, next_key) VALUES (?1, ?2, ?3)",
        )?;
        for key in keys {
            stmt.execute(params![key.name, key.prev_key, key.next_key])?;
        }
        Ok(())
    }

    pub fn remote_key(&self, name: &str) -> Result<Option<RemoteKey>> {
        let key = self
            .conn
            .query_row(
                "SELECT name, prev_key, next_key FROM remote_keys WHERE name = ?1",
                params![name],
                remote_key_from_row,
            )
            .optional()?;
        Ok(key)
    }

    /// The key that reaches furthest into the remote index. A key with no
    /// successor (end reached) outranks any offset.
    pub fn furthest_remote_key(&self) -> Result<Option<RemoteKey>> {
        let key = self
            .conn
            .query_row(
                "SELECT name, prev_key, next_key FROM remote_keys \
                 ORDER BY next_key IS NULL DESC, next_key DESC LIMIT 1",
                [],
                remote_key_from_row,
            )
            .optional()?;
        Ok(key)
    }

    pub fn clear_remote_keys(&self) -> Result<()> {
        self.conn.execute("DELETE FROM remote_keys", [])?;
        Ok(())
    }

    pub fn insert_moves(&self, moves: &[MoveRow]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR REPLACE INTO moves (name, url) VALUES (?1, ?2)")?;
        for mv in moves {
            stmt.execute(params![mv.name, mv.url])?;
        }
        Ok(())
    }

    pub fn moves(&self, limit: usize, offset: usize) -> Result<Vec<MoveRow>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, url FROM moves ORDER BY name ASC LIMIT ?1 OFFSET ?2")?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok(MoveRow {
                    name: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_moves(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM moves", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear_moves(&self) -> Result<()> {
        self.conn.execute("DELETE FROM moves", [])?;
        Ok(())
    }
}

fn json_column<T: serde::de::DeserializeOwned>(idx: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn remote_key_from_row(row: &Row<'_>) -> rusqlite::Result<RemoteKey> {
    Ok(RemoteKey {
        name: row.get(0)?,
        prev_key: row.get(1)?,
        next_key: row.get(2)?,
    })
}

fn pokemon_from_row(row: &Row<'_>) -> rusqlite::Result<PokemonRow> {
    let detail: Option<String> = row.get(4)?;
    let detail = match detail.as_deref() {
        Some(text) if !text.trim().is_empty() => Some(json_column(4, text)?),
        _ => None,
    };

    let types: Option<String> = row.get(5)?;
    let types = match types.as_deref() {
        Some(text) if !text.trim().is_empty() => json_column(5, text)?,
        _ => Vec::new(),
    };

    let cached_at: i64 = row.get(12)?;

    Ok(PokemonRow {
        name: row.get(0)?,
        image_url: row.get(1)?,
        number: row.get(2)?,
        is_favorite: row.get(3)?,
        detail,
        types,
        hp: row.get(6)?,
        attack: row.get(7)?,
        defense: row.get(8)?,
        special_attack: row.get(9)?,
        special_defense: row.get(10)?,
        speed: row.get(11)?,
        cached_at: DateTime::<Utc>::from_timestamp(cached_at, 0).unwrap_or_default(),
    })
}
