use std::collections::HashMap;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::ingredient::{name_key, ConversionFact, Ingredient};
use crate::domain::unit::Unit;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "ingredient_registry_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingredient (
    id TEXT PRIMARY KEY,
    default_id TEXT,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL,
    category TEXT,
    brand TEXT,
    is_custom INTEGER NOT NULL CHECK (is_custom IN (0, 1)),
    is_favorite INTEGER NOT NULL DEFAULT 0 CHECK (is_favorite IN (0, 1)),
    last_used_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversion_fact (
    ingredient_id TEXT NOT NULL REFERENCES ingredient(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    from_amount REAL NOT NULL CHECK (from_amount > 0),
    from_unit TEXT NOT NULL,
    to_amount REAL NOT NULL CHECK (to_amount > 0),
    to_unit TEXT NOT NULL,
    PRIMARY KEY (ingredient_id, position)
);
"#,
    },
    Migration {
        version: 2,
        name: "ingredient_lookup_indexes_v1",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_ingredient_name_key ON ingredient(name_key, id);
CREATE INDEX IF NOT EXISTS idx_ingredient_default_id ON ingredient(default_id);
CREATE INDEX IF NOT EXISTS idx_ingredient_custom ON ingredient(is_custom);
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        log::debug!("applying migration {} ({})", migration.version, migration.name);
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.name,
                format_timestamp(&OffsetDateTime::now_utc())?
            ],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn format_timestamp(value: &OffsetDateTime) -> Result<String> {
    value
        .format(&Rfc3339)
        .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
}

fn parse_timestamp(index: usize, raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn encode_unit(unit: &Unit) -> Result<String> {
    serde_json::to_string(unit).map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
}

fn decode_unit(index: usize, raw: &str) -> Result<Unit> {
    serde_json::from_str(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

const INGREDIENT_COLUMNS: &str = "id, default_id, name, category, brand, is_custom, is_favorite, \
                                  last_used_at, created_at";

fn ingredient_from_row(row: &Row<'_>) -> Result<Ingredient> {
    let last_used_at: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Ingredient {
        id: row.get(0)?,
        default_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        brand: row.get(4)?,
        is_custom: row.get(5)?,
        is_favorite: row.get(6)?,
        last_used_at: last_used_at
            .as_deref()
            .map(|raw| parse_timestamp(7, raw))
            .transpose()?,
        created_at: parse_timestamp(8, &created_at)?,
        facts: Vec::new(),
    })
}

fn fact_from_row(row: &Row<'_>) -> Result<(String, ConversionFact)> {
    let ingredient_id: String = row.get(0)?;
    let from_unit: String = row.get(2)?;
    let to_unit: String = row.get(4)?;
    let fact = ConversionFact::new(
        row.get(1)?,
        decode_unit(2, &from_unit)?,
        row.get(3)?,
        decode_unit(4, &to_unit)?,
    )
    .map_err(|err| rusqlite::Error::FromSqlConversionFailure(1, Type::Real, Box::new(err)))?;
    Ok((ingredient_id, fact))
}

/// All ingredients with their facts, ordered by case-insensitive name and
/// then instance id so callers see a stable iteration order.
pub fn list_ingredients(conn: &Connection) -> Result<Vec<Ingredient>> {
    let mut facts: HashMap<String, Vec<ConversionFact>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            r#"
SELECT ingredient_id, from_amount, from_unit, to_amount, to_unit
FROM conversion_fact
ORDER BY ingredient_id, position
"#,
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let (ingredient_id, fact) = fact_from_row(row)?;
            facts.entry(ingredient_id).or_default().push(fact);
        }
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {INGREDIENT_COLUMNS} FROM ingredient ORDER BY name_key ASC, id ASC"
    ))?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut ingredient = ingredient_from_row(row)?;
        ingredient.facts = facts.remove(&ingredient.id).unwrap_or_default();
        result.push(ingredient);
    }
    Ok(result)
}

pub fn get_ingredient(conn: &Connection, id: &str) -> Result<Option<Ingredient>> {
    let found = conn
        .query_row(
            &format!("SELECT {INGREDIENT_COLUMNS} FROM ingredient WHERE id = ?1"),
            params![id],
            ingredient_from_row,
        )
        .optional()?;
    let Some(mut ingredient) = found else {
        return Ok(None);
    };
    ingredient.facts = list_facts(conn, id)?;
    Ok(Some(ingredient))
}

pub fn list_facts(conn: &Connection, ingredient_id: &str) -> Result<Vec<ConversionFact>> {
    let mut stmt = conn.prepare(
        r#"
SELECT ingredient_id, from_amount, from_unit, to_amount, to_unit
FROM conversion_fact
WHERE ingredient_id = ?1
ORDER BY position
"#,
    )?;
    let mut rows = stmt.query(params![ingredient_id])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(fact_from_row(row)?.1);
    }
    Ok(result)
}

/// Ids of ingredients whose id starts with `prefix` or whose name matches
/// `name` case-insensitively.
pub fn find_ingredient_ids(conn: &Connection, prefix: &str, name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id FROM ingredient
WHERE substr(id, 1, length(?1)) = ?1 OR name_key = ?2
ORDER BY name_key ASC, id ASC
"#,
    )?;
    let mut rows = stmt.query(params![prefix, name_key(name)])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(row.get(0)?);
    }
    Ok(result)
}

pub fn insert_ingredient(conn: &Connection, ingredient: &Ingredient) -> Result<()> {
    let last_used_at = ingredient
        .last_used_at
        .as_ref()
        .map(format_timestamp)
        .transpose()?;
    conn.execute(
        r#"
INSERT INTO ingredient (
    id, default_id, name, name_key, category, brand,
    is_custom, is_favorite, last_used_at, created_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#,
        params![
            ingredient.id,
            ingredient.default_id,
            ingredient.name,
            ingredient.name_key(),
            ingredient.category,
            ingredient.brand,
            ingredient.is_custom,
            ingredient.is_favorite,
            last_used_at,
            format_timestamp(&ingredient.created_at)?
        ],
    )?;
    replace_facts(conn, &ingredient.id, &ingredient.facts)
}

/// Rewrites the dataset-owned columns of an existing row and its fact set.
/// `is_custom`, `is_favorite` and `last_used_at` are left as stored.
pub fn update_descriptor_fields(conn: &Connection, ingredient: &Ingredient) -> Result<bool> {
    let changed = conn.execute(
        r#"
UPDATE ingredient
SET default_id = ?2, name = ?3, name_key = ?4, category = ?5, brand = ?6
WHERE id = ?1
"#,
        params![
            ingredient.id,
            ingredient.default_id,
            ingredient.name,
            ingredient.name_key(),
            ingredient.category,
            ingredient.brand
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    replace_facts(conn, &ingredient.id, &ingredient.facts)?;
    Ok(true)
}

pub fn replace_facts(conn: &Connection, ingredient_id: &str, facts: &[ConversionFact]) -> Result<()> {
    conn.execute(
        "DELETE FROM conversion_fact WHERE ingredient_id = ?1",
        params![ingredient_id],
    )?;
    let mut stmt = conn.prepare(
        r#"
INSERT INTO conversion_fact (
    ingredient_id, position, from_amount, from_unit, to_amount, to_unit
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
    )?;
    for (position, fact) in facts.iter().enumerate() {
        stmt.execute(params![
            ingredient_id,
            position as i64,
            fact.from_amount(),
            encode_unit(fact.from_unit())?,
            fact.to_amount(),
            encode_unit(fact.to_unit())?
        ])?;
    }
    Ok(())
}

pub fn set_favorite(conn: &Connection, id: &str, favorite: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ingredient SET is_favorite = ?2 WHERE id = ?1",
        params![id, favorite],
    )?;
    Ok(changed > 0)
}

pub fn set_last_used(conn: &Connection, id: &str, used_at: &OffsetDateTime) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ingredient SET last_used_at = ?2 WHERE id = ?1",
        params![id, format_timestamp(used_at)?],
    )?;
    Ok(changed > 0)
}

pub fn delete_ingredient(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM ingredient WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngredientCounts {
    pub total: i64,
    pub custom: i64,
    pub favorites: i64,
    pub facts: i64,
}

impl IngredientCounts {
    pub fn defaults(&self) -> i64 {
        self.total - self.custom
    }
}

pub fn count_ingredients(conn: &Connection) -> Result<IngredientCounts> {
    let (total, custom, favorites): (i64, i64, i64) = conn.query_row(
        r#"
SELECT COUNT(*), COALESCE(SUM(is_custom), 0), COALESCE(SUM(is_favorite), 0)
FROM ingredient
"#,
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let facts: i64 = conn.query_row("SELECT COUNT(*) FROM conversion_fact", [], |row| row.get(0))?;
    Ok(IngredientCounts {
        total,
        custom,
        favorites,
        facts,
    })
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO meta (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests;
