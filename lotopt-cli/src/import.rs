use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use lotopt_db::rusqlite::Connection;

use lotopt_db::db::{fetch_history, insert_draw};
use lotopt_db::models::{Draw, Game, StoredDraw, Tier};

// %y avant %Y : "03/05/24" serait sinon lu comme l'an 24.
const DATE_FORMATS: [&str; 4] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y"];
const REQUIRED: [&str; 8] = ["game", "draw_date", "tier", "n1", "n2", "n3", "n4", "n5"];

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .with_context(|| format!("Format de date invalide: '{}'", raw))
}

/// Index des colonnes, en-têtes insensibles à la casse.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let missing: Vec<&str> = REQUIRED.iter().copied().filter(|c| !map.contains_key(*c)).collect();
        if !missing.is_empty() {
            bail!("Colonnes manquantes dans le CSV : {}", missing.join(", "));
        }
        Ok(Columns(map))
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> &'r str {
        self.0
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }

    fn number(&self, record: &csv::StringRecord, name: &str) -> Option<u8> {
        self.get(record, name).parse::<u8>().ok()
    }
}

enum Row {
    Draw(StoredDraw),
    Skip(String),
}

fn parse_record(record: &csv::StringRecord, cols: &Columns) -> Result<Row> {
    let game: Game = match cols.get(record, "game").parse() {
        Ok(g) => g,
        Err(e) => return Ok(Row::Skip(e)),
    };
    let tier = match game {
        Game::MegaMillions | Game::Powerball => Tier::Jackpot,
        Game::IllinoisLotto => match cols.get(record, "tier").parse::<Tier>() {
            Ok(t) => t,
            Err(e) => return Ok(Row::Skip(e)),
        },
    };
    let date = parse_date(cols.get(record, "draw_date"))?;

    let spec = game.spec();
    let columns: &[&str] = match game {
        Game::IllinoisLotto => &["n1", "n2", "n3", "n4", "n5", "n6"],
        _ => &["n1", "n2", "n3", "n4", "n5"],
    };
    let mains: Vec<u8> = columns.iter().filter_map(|c| cols.number(record, c)).collect();
    if mains.len() != spec.main_pick {
        return Ok(Row::Skip(format!("{} : {} boules au lieu de {}", game, mains.len(), spec.main_pick)));
    }
    let bonus = spec.bonus_max.and_then(|_| cols.number(record, "bonus"));

    let draw = Draw::new(&spec, mains, bonus)
        .with_context(|| format!("Tirage {} du {} invalide", game, date))?;
    Ok(Row::Draw(StoredDraw { game, tier, date, draw }))
}

#[derive(Debug, Default)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub duplicates: u32,
    pub errors: u32,
    pub by_game: HashMap<Game, u32>,
}

pub fn import_reader<R: Read>(conn: &Connection, input: R, replace: bool) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let cols = Columns::from_headers(reader.headers().context("En-têtes CSV illisibles")?)?;

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();
    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records;
        let record = match record_result {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Erreur lecture ligne {}: {}", line, e);
                result.errors += 1;
                continue;
            }
        };
        match parse_record(&record, &cols) {
            Ok(Row::Draw(stored)) => match insert_draw(&tx, &stored, replace) {
                Ok(true) => {
                    result.inserted += 1;
                    *result.by_game.entry(stored.game).or_insert(0) += 1;
                }
                Ok(false) => result.duplicates += 1,
                Err(e) => {
                    eprintln!("Erreur insertion ligne {}: {}", line, e);
                    result.errors += 1;
                }
            },
            Ok(Row::Skip(reason)) => {
                log::debug!("Ligne {} ignorée : {}", line, reason);
                result.skipped += 1;
            }
            Err(e) => {
                eprintln!("Erreur parsing ligne {}: {:#}", line, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}

pub fn import_csv(conn: &Connection, path: &Path, replace: bool) -> Result<ImportResult> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    import_reader(conn, file, replace)
}

const EXPORT_HEADER: [&str; 10] = ["game", "draw_date", "tier", "n1", "n2", "n3", "n4", "n5", "n6", "bonus"];

/// Tous les tirages d'un jeu, du plus ancien au plus récent, au format lu par `import_reader`.
pub fn export_writer<W: Write>(conn: &Connection, game: Game, output: W) -> Result<u32> {
    let mut stored = Vec::new();
    for &tier in game.tiers() {
        stored.extend(fetch_history(conn, game, tier, u32::MAX, None)?);
    }
    stored.sort_by(|a, b| a.date.cmp(&b.date).then(a.tier.cmp(&b.tier)));

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(EXPORT_HEADER)?;
    for row in &stored {
        let mut record = vec![
            game.code().to_string(),
            row.date.format("%Y-%m-%d").to_string(),
            row.tier.code().to_string(),
        ];
        let mut mains: Vec<String> = row.draw.mains.iter().map(|n| n.to_string()).collect();
        mains.resize(6, String::new());
        record.extend(mains);
        record.push(row.draw.bonus.map(|b| b.to_string()).unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush().context("Échec de l'écriture du CSV")?;
    Ok(stored.len() as u32)
}

pub fn export_csv(conn: &Connection, game: Game, path: &Path) -> Result<u32> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Impossible de créer {:?}", path))?;
    export_writer(conn, game, file)
}
