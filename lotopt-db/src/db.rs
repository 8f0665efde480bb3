use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::models::{Draw, Game, StoredDraw, Tier};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    game       TEXT NOT NULL,
    tier       TEXT NOT NULL,
    draw_date  TEXT NOT NULL,
    n1         INTEGER NOT NULL,
    n2         INTEGER NOT NULL,
    n3         INTEGER NOT NULL,
    n4         INTEGER NOT NULL,
    n5         INTEGER NOT NULL,
    n6         INTEGER,
    bonus      INTEGER,
    PRIMARY KEY (game, tier, draw_date)
);
";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lotopt.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

/// Insère un tirage. Avec `replace`, un tirage existant (même jeu, tirage, date) est écrasé.
/// Retourne `true` si une ligne a été écrite.
pub fn insert_draw(conn: &Connection, stored: &StoredDraw, replace: bool) -> Result<bool> {
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT OR IGNORE" };
    let mains = &stored.draw.mains;
    let changed = conn.execute(
        &format!(
            "{verb} INTO draws (game, tier, draw_date, n1, n2, n3, n4, n5, n6, bonus)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        rusqlite::params![
            stored.game.code(),
            stored.tier.code(),
            stored.date.format(DATE_FORMAT).to_string(),
            mains.first().copied(),
            mains.get(1).copied(),
            mains.get(2).copied(),
            mains.get(3).copied(),
            mains.get(4).copied(),
            mains.get(5).copied(),
            stored.draw.bonus,
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

/// Derniers tirages d'un jeu, du plus récent au plus ancien.
/// `as_of` exclut les tirages postérieurs à la date donnée.
pub fn fetch_history(
    conn: &Connection,
    game: Game,
    tier: Tier,
    limit: u32,
    as_of: Option<NaiveDate>,
) -> Result<Vec<StoredDraw>> {
    let as_of = as_of
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "9999-12-31".to_string());
    let mut stmt = conn.prepare(
        "SELECT draw_date, n1, n2, n3, n4, n5, n6, bonus
         FROM draws WHERE game = ?1 AND tier = ?2 AND draw_date <= ?3
         ORDER BY draw_date DESC LIMIT ?4"
    )?;
    let rows = stmt.query_map(
        rusqlite::params![game.code(), tier.code(), as_of, limit],
        |row| {
            let date: String = row.get(0)?;
            let mut mains = vec![
                row.get::<_, u8>(1)?,
                row.get::<_, u8>(2)?,
                row.get::<_, u8>(3)?,
                row.get::<_, u8>(4)?,
                row.get::<_, u8>(5)?,
            ];
            if let Some(n6) = row.get::<_, Option<u8>>(6)? {
                mains.push(n6);
            }
            let bonus: Option<u8> = row.get(7)?;
            Ok((date, mains, bonus))
        },
    )?.collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(date, mains, bonus)| {
            let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .with_context(|| format!("Date corrompue en base : '{}'", date))?;
            let draw = Draw::new(&game.spec(), mains, bonus)
                .with_context(|| format!("Tirage {} du {} invalide en base", game, date))?;
            Ok(StoredDraw { game, tier, date, draw })
        })
        .collect()
}

pub fn count_draws(conn: &Connection, game: Option<Game>) -> Result<u32> {
    let count: u32 = match game {
        Some(g) => conn.query_row(
            "SELECT COUNT(*) FROM draws WHERE game = ?1",
            [g.code()],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?,
    };
    Ok(count)
}

/// Dates des `n` derniers tirages, la plus récente d'abord.
pub fn latest_dates(conn: &Connection, game: Game, tier: Tier, n: u32) -> Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT draw_date FROM draws WHERE game = ?1 AND tier = ?2
         ORDER BY draw_date DESC LIMIT ?3"
    )?;
    let dates = stmt.query_map(rusqlite::params![game.code(), tier.code(), n], |row| {
        row.get::<_, String>(0)
    })?.collect::<Result<Vec<_>, _>>()?;
    dates.iter()
        .map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT)
            .with_context(|| format!("Date corrompue en base : '{}'", d)))
        .collect()
}

pub fn has_draw(conn: &Connection, game: Game, tier: Tier, date: NaiveDate) -> Result<bool> {
    let found: Option<i64> = conn.query_row(
        "SELECT 1 FROM draws WHERE game = ?1 AND tier = ?2 AND draw_date = ?3",
        rusqlite::params![game.code(), tier.code(), date.format(DATE_FORMAT).to_string()],
        |row| row.get(0),
    ).optional()?;
    Ok(found.is_some())
}
