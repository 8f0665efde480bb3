mod display;
mod import;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lotopt_db::rusqlite::Connection;

use lotopt_db::db::{count_draws, db_path, fetch_history, insert_draw, latest_dates, migrate, open_db};
use lotopt_db::models::{Game, StoredDraw, Tier};
use lotopt_engine::config::{load_config, EngineConfig};
use lotopt_engine::history::HistoryWindow;
use lotopt_engine::parse::{format_history_blob, parse_draw};
use lotopt_engine::payload::{history_field, latest_field, Payload};
use lotopt_engine::phases::state::StateToken;
use lotopt_engine::phases::store::{JsonDirStore, PhaseStore};
use lotopt_engine::phases::Orchestrator;

use crate::display::{
    display_draws, display_import_summary, display_phase1, display_phase2, display_phase3,
    display_recent,
};

#[derive(Parser)]
#[command(name = "lotopt", about = "Générateur de grilles MM / PB / Lotto Illinois en trois phases")]
struct Cli {
    /// Fichier de configuration JSON du moteur
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Répertoire des états de phase
    #[arg(long, global = true, default_value = "data/states")]
    state_dir: PathBuf,

    /// Afficher le rapport en JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer des tirages depuis un CSV (game,draw_date,tier,n1..n6,bonus)
    Import {
        #[arg(short, long)]
        file: PathBuf,

        /// Écraser les tirages déjà présents
        #[arg(long)]
        replace: bool,
    },

    /// Exporter les tirages d'un jeu en CSV (même format que l'import)
    Export {
        #[arg(short, long)]
        game: Game,

        /// Fichier de sortie (sortie standard par défaut)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages d'un jeu
    History {
        #[arg(short, long)]
        game: Game,

        #[arg(short, long, default_value = "JP")]
        tier: Tier,

        #[arg(short, long, default_value = "20")]
        last: u32,

        /// Date pivot (AAAA-MM-JJ) : seuls les tirages antérieurs sont listés
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Ajouter un tirage manuellement
    Add {
        #[arg(short, long)]
        game: Game,

        #[arg(short, long, default_value = "JP")]
        tier: Tier,

        /// Date du tirage (AAAA-MM-JJ)
        #[arg(short, long)]
        date: NaiveDate,

        /// Tirage, ex. "[10,14,34,40,43], 5"
        #[arg(short, long)]
        numbers: String,
    },

    /// Phase 1 : évaluer un lot contre les derniers tirages
    Phase1 {
        /// Saisie JSON (LATEST_*, HIST_*_BLOB, FEED_*)
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Prendre les tirages cibles manquants en base (1 = le plus récent)
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Phase 2 : simulation et liste d'achat
    Phase2 {
        #[arg(short, long)]
        token: String,

        #[arg(short, long)]
        runs: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Phase 3 : confronter la liste d'achat aux tirages officiels
    Phase3 {
        #[arg(short, long)]
        token: String,

        #[arg(short, long)]
        payload: Option<PathBuf>,

        #[arg(long)]
        offset: Option<u32>,
    },

    /// Lister les derniers états enregistrés
    Recent {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { ref file, replace } => cmd_import(&conn, file, replace),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Export { game, ref file } => cmd_export(&conn, game, file.as_deref()),
        Command::History { game, tier, last, as_of } => cmd_history(&conn, game, tier, last, as_of),
        Command::Add { game, tier, date, ref numbers } => cmd_add(&conn, game, tier, date, numbers),
        Command::Phase1 { ref payload, offset } => cmd_phase1(&cli, &conn, payload.as_deref(), offset),
        Command::Phase2 { ref token, runs, seed } => cmd_phase2(&cli, token, runs, seed),
        Command::Phase3 { ref token, ref payload, offset } => cmd_phase3(&cli, &conn, token, payload.as_deref(), offset),
        Command::Recent { limit } => cmd_recent(&cli, limit),
    }
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Configuration illisible : {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.progress = !cli.json;
    Ok(config)
}

fn orchestrator(cli: &Cli, config: EngineConfig) -> Result<Orchestrator<JsonDirStore>> {
    let store = JsonDirStore::new(&cli.state_dir)
        .with_context(|| format!("Répertoire d'états inutilisable : {}", cli.state_dir.display()))?;
    Ok(Orchestrator::new(config, store))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_payload(path: Option<&Path>) -> Result<Payload> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("Impossible de lire {}", p.display()))?;
            Ok(Payload::from_json(&text).with_context(|| format!("Saisie JSON invalide : {}", p.display()))?)
        }
        None => Ok(Payload::default()),
    }
}

fn draw_text(stored: &StoredDraw) -> String {
    let mains = stored.draw.mains.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",");
    match stored.draw.bonus {
        Some(b) => format!("[{}], {}", mains, b),
        None => format!("[{}]", mains),
    }
}

/// Complète les champs `LATEST_*` absents avec le `offset`-ième tirage le plus récent.
/// Renvoie la date du tirage JP retenu par jeu.
fn fill_targets_from_db(
    conn: &Connection,
    payload: &mut Payload,
    games: &[Game],
    offset: u32,
) -> Result<Vec<(Game, NaiveDate)>> {
    if offset == 0 {
        bail!("L'offset commence à 1 (tirage le plus récent)");
    }
    let mut dates = Vec::new();
    for &game in games {
        for &tier in game.tiers() {
            let field = latest_field(game, tier);
            if payload.get(&field).is_some() {
                continue;
            }
            let Some(&date) = latest_dates(conn, game, tier, offset)?.get(offset as usize - 1) else {
                bail!("{} {} : moins de {} tirages en base", game, tier, offset);
            };
            let stored = fetch_history(conn, game, tier, 1, Some(date))?;
            let Some(target) = stored.first() else {
                bail!("{} {} : tirage du {} introuvable", game, tier, date);
            };
            payload.set(field, draw_text(target));
            if tier == Tier::Jackpot {
                dates.push((game, date));
            }
        }
    }
    Ok(dates)
}

/// Complète les champs `HIST_*_BLOB` absents depuis la base, antérieurs au tirage cible.
fn fill_history_from_db(
    conn: &Connection,
    payload: &mut Payload,
    config: &EngineConfig,
    target_dates: &[(Game, NaiveDate)],
) -> Result<()> {
    for &game in &config.games {
        let field = history_field(game);
        if payload.get(&field).is_some() {
            continue;
        }
        let as_of = target_dates
            .iter()
            .find(|(g, _)| *g == game)
            .and_then(|(_, d)| d.pred_opt());
        let mut stored = fetch_history(conn, game, Tier::Jackpot, config.history_cap as u32 + 1, as_of)?;

        // Sans date connue, le tirage cible peut être le plus récent en base.
        if as_of.is_none() {
            let target = payload
                .get(&latest_field(game, Tier::Jackpot))
                .and_then(|text| parse_draw(&latest_field(game, Tier::Jackpot), text, &game.spec()).ok());
            if stored.first().map(|s| &s.draw) == target.as_ref() && target.is_some() {
                stored.remove(0);
            }
        }
        stored.truncate(config.history_cap);
        if stored.is_empty() {
            continue;
        }
        let window = HistoryWindow::from_newest(stored.into_iter().map(|s| s.draw).collect(), config.history_cap);
        log::info!("{} : {} tirages d'historique pris en base", game, window.len());
        payload.set(field, format_history_blob(&window));
    }
    Ok(())
}

fn cmd_import(conn: &Connection, file: &Path, replace: bool) -> Result<()> {
    let result = import::import_csv(conn, file, replace)?;
    display_import_summary(&result);
    Ok(())
}

/// Historique daté, plus ancien d'abord : `AAAA-MM-JJ<TAB>n1-…-nk [bonus]`.
/// `parse_history_blob` ignore la date en tête de ligne.
fn dated_blob(stored: &[StoredDraw]) -> String {
    let mut out = String::new();
    for row in stored.iter().rev() {
        let window = HistoryWindow::from_newest(vec![row.draw.clone()], 1);
        out.push_str(&format!("{}\t{}", row.date.format("%Y-%m-%d"), format_history_blob(&window)));
    }
    out
}

fn cmd_export(conn: &Connection, game: Game, file: Option<&Path>) -> Result<()> {
    let written = match file {
        Some(path) => {
            let n = import::export_csv(conn, game, path)?;
            println!("{} tirages {} exportés vers {}", n, game, path.display());
            n
        }
        None => import::export_writer(conn, game, std::io::stdout().lock())?,
    };
    log::info!("Export {} : {} tirages", game, written);
    Ok(())
}

fn cmd_history(conn: &Connection, game: Game, tier: Tier, last: u32, as_of: Option<NaiveDate>) -> Result<()> {
    if count_draws(conn, Some(game))? == 0 {
        println!("Aucun tirage {} en base. Lancez d'abord : lotopt import --file <csv>", game);
        return Ok(());
    }
    let pivot = match as_of {
        Some(date) => Some(date.pred_opt().with_context(|| format!("Date pivot invalide : {}", date))?),
        None => None,
    };
    let stored = fetch_history(conn, game, tier, last, pivot)?;
    display_draws(&stored);

    println!("\n{}", history_field(game));
    print!("{}", dated_blob(&stored));
    Ok(())
}

fn cmd_add(conn: &Connection, game: Game, tier: Tier, date: NaiveDate, numbers: &str) -> Result<()> {
    if !game.tiers().contains(&tier) {
        bail!("{} n'a pas de tirage {}", game, tier);
    }
    let draw = parse_draw("numbers", numbers, &game.spec())?;
    let stored = StoredDraw { game, tier, date, draw };
    display_draws(std::slice::from_ref(&stored));
    if insert_draw(conn, &stored, false)? {
        println!("Tirage inséré avec succès.");
    } else {
        println!("Ce tirage existe déjà (doublon ignoré).");
    }
    Ok(())
}

fn cmd_phase1(cli: &Cli, conn: &Connection, payload: Option<&Path>, offset: Option<u32>) -> Result<()> {
    let config = engine_config(cli)?;
    let mut payload = read_payload(payload)?;
    let target_dates = match offset {
        Some(n) => fill_targets_from_db(conn, &mut payload, &config.games, n)?,
        None => Vec::new(),
    };
    fill_history_from_db(conn, &mut payload, &config, &target_dates)?;

    let inputs = payload.phase1_inputs(&config.games, config.history_cap)?;
    let report = orchestrator(cli, config)?.evaluate(inputs)?;
    if cli.json {
        return print_json(&report);
    }
    display_phase1(&report);
    Ok(())
}

fn cmd_phase2(cli: &Cli, token: &str, runs: Option<usize>, seed: Option<u64>) -> Result<()> {
    let mut config = engine_config(cli)?;
    if let Some(runs) = runs {
        config.runs = runs;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    let report = orchestrator(cli, config)?.simulate(&StateToken::from(token))?;
    if cli.json {
        return print_json(&report);
    }
    display_phase2(&report);
    Ok(())
}

fn cmd_phase3(cli: &Cli, conn: &Connection, token: &str, payload: Option<&Path>, offset: Option<u32>) -> Result<()> {
    let config = engine_config(cli)?;
    let orch = orchestrator(cli, config)?;
    let token = StateToken::from(token);
    let games = orch.store().load(&token)?.games();

    let mut payload = read_payload(payload)?;
    if let Some(n) = offset {
        fill_targets_from_db(conn, &mut payload, &games, n)?;
    }
    let targets = payload.targets(&games)?;
    let report = orch.confirm(&token, &targets)?;
    if cli.json {
        return print_json(&report);
    }
    display_phase3(&report);
    Ok(())
}

fn cmd_recent(cli: &Cli, limit: usize) -> Result<()> {
    let store = JsonDirStore::new(&cli.state_dir)?;
    let tokens = store.recent(limit)?;
    if cli.json {
        return print_json(&tokens);
    }
    display_recent(&tokens);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotopt_db::models::Draw;
    use lotopt_engine::parse::parse_history_blob;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn add(conn: &Connection, game: Game, tier: Tier, day: u32, mains: Vec<u8>, bonus: Option<u8>) {
        let stored = StoredDraw {
            game,
            tier,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            draw: Draw::new(&game.spec(), mains, bonus).unwrap(),
        };
        insert_draw(conn, &stored, false).unwrap();
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["lotopt", "--json", "phase2", "--token", "abc", "--runs", "5"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Phase2 { runs: Some(5), .. }));

        let cli = Cli::try_parse_from(["lotopt", "history", "--game", "il", "--tier", "m1"]).unwrap();
        assert!(matches!(cli.command, Command::History { game: Game::IllinoisLotto, tier: Tier::Million1, last: 20, as_of: None }));

        assert!(Cli::try_parse_from(["lotopt", "history", "--game", "xx"]).is_err());
    }

    #[test]
    fn test_fill_targets_and_history_from_db() {
        let conn = memory_db();
        for day in 1..=5u32 {
            let d = day as u8;
            add(&conn, Game::MegaMillions, Tier::Jackpot, day, vec![d, d + 10, d + 20, d + 30, d + 40], Some(d));
        }
        let mut payload = Payload::default();
        let dates = fill_targets_from_db(&conn, &mut payload, &[Game::MegaMillions], 2).unwrap();
        assert_eq!(dates, vec![(Game::MegaMillions, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())]);
        assert_eq!(payload.get("LATEST_MM"), Some("[4,14,24,34,44], 4"));

        let config = EngineConfig { games: vec![Game::MegaMillions], ..EngineConfig::default() };
        fill_history_from_db(&conn, &mut payload, &config, &dates).unwrap();
        let inputs = payload.phase1_inputs(&config.games, config.history_cap).unwrap();
        // tirages du 1er au 3 mars seulement
        assert_eq!(inputs[0].history.len(), 3);
        assert_eq!(inputs[0].history.draws()[0].mains[0], 3);
    }

    #[test]
    fn test_history_skips_target_without_date() {
        let conn = memory_db();
        for day in 1..=3u32 {
            let d = day as u8;
            add(&conn, Game::Powerball, Tier::Jackpot, day, vec![d, d + 10, d + 20, d + 30, d + 40], Some(d));
        }
        let mut payload = Payload::default();
        payload.set("LATEST_PB", "[3,13,23,33,43], 3");
        let config = EngineConfig { games: vec![Game::Powerball], ..EngineConfig::default() };
        fill_history_from_db(&conn, &mut payload, &config, &[]).unwrap();
        let inputs = payload.phase1_inputs(&config.games, config.history_cap).unwrap();
        assert_eq!(inputs[0].history.len(), 2);
    }

    #[test]
    fn test_history_as_of_and_dated_blob() {
        let conn = memory_db();
        for day in 1..=5u32 {
            let d = day as u8;
            add(&conn, Game::Powerball, Tier::Jackpot, day, vec![d, d + 10, d + 20, d + 30, d + 40], Some(d));
        }
        let cli = Cli::try_parse_from(["lotopt", "history", "--game", "pb", "--as-of", "2024-03-04", "--last", "2"]).unwrap();
        let Command::History { as_of, last, .. } = cli.command else {
            panic!("sous-commande inattendue");
        };
        assert_eq!(as_of, NaiveDate::from_ymd_opt(2024, 3, 4));

        let pivot = as_of.and_then(|d| d.pred_opt());
        let stored = fetch_history(&conn, Game::Powerball, Tier::Jackpot, last, pivot).unwrap();
        let blob = dated_blob(&stored);
        assert_eq!(blob, "2024-03-02\t02-12-22-32-42 02\n2024-03-03\t03-13-23-33-43 03\n");

        let window = parse_history_blob(&blob, &Game::Powerball.spec(), 20);
        assert_eq!(window.len(), 2);
        assert_eq!(window.draws()[0].mains[0], 3);
    }

    #[test]
    fn test_export_parses() {
        let cli = Cli::try_parse_from(["lotopt", "export", "--game", "il", "--file", "out.csv"]).unwrap();
        assert!(matches!(cli.command, Command::Export { game: Game::IllinoisLotto, file: Some(_) }));
        let cli = Cli::try_parse_from(["lotopt", "export", "--game", "mm"]).unwrap();
        assert!(matches!(cli.command, Command::Export { file: None, .. }));
    }

    #[test]
    fn test_offset_out_of_range() {
        let conn = memory_db();
        add(&conn, Game::Powerball, Tier::Jackpot, 1, vec![1, 2, 3, 4, 5], Some(1));
        let mut payload = Payload::default();
        assert!(fill_targets_from_db(&conn, &mut payload, &[Game::Powerball], 3).is_err());
        assert!(fill_targets_from_db(&conn, &mut payload, &[Game::Powerball], 0).is_err());
    }
}
