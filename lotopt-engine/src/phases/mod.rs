//! Enchaînement des trois phases :
//! 1. évaluation d'un lot contre les derniers tirages,
//! 2. simulation de N lots après promotion du tirage JP, puis liste d'achat,
//! 3. confrontation de la liste d'achat aux tirages officiels.

pub mod aggregate;
pub mod buylist;
pub mod state;
pub mod store;

use std::collections::BTreeMap;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use lotopt_db::models::{Draw, Game, Tier};

use crate::band::{estimate_band, SumBand};
use crate::batch::{build_batch, Batch};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::payload::{latest_field, GameInput};
use crate::patterns::pattern_library;
use crate::pools::{build_pools, Pools};
use crate::scorer::{bonus_hit, matched_mains, score, summarize, HitSummary, ScoreBucket};

use aggregate::{simulate_runs, AggregateStats};
use buylist::{build_buy_list, BuyList};
use state::{EvaluatedGame, PhaseState, RecommendedGame, StateToken};
use store::PhaseStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierHits {
    pub tier: Tier,
    pub target: Draw,
    pub summary: HitSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase1Game {
    pub game: Game,
    pub band: SumBand,
    pub pools: Pools,
    pub batch: Batch,
    pub hits: Vec<TierHits>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase1Report {
    pub token: StateToken,
    pub games: Vec<Phase1Game>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase2Game {
    pub game: Game,
    /// Fourchette recalculée après promotion du tirage JP.
    pub band: SumBand,
    pub pools: Pools,
    pub stats: AggregateStats,
    pub buy_list: BuyList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase2Report {
    pub token: StateToken,
    pub source: StateToken,
    pub seed: u64,
    pub games: Vec<Phase2Game>,
}

/// Détail d'une ligne de la liste d'achat contre un tirage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowDetail {
    pub row: usize,
    pub mains: Vec<u8>,
    pub bonus: Option<u8>,
    pub matched: Vec<u8>,
    pub bonus_hit: bool,
    pub bucket: Option<ScoreBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierResult {
    pub tier: Tier,
    pub target: Draw,
    pub summary: HitSummary,
    pub rows: Vec<RowDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase3Game {
    pub game: Game,
    pub tiers: Vec<TierResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase3Report {
    pub token: StateToken,
    pub games: Vec<Phase3Game>,
}

fn progress_bar(len: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|s| s.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn require_targets(game: Game, targets: &[(Tier, Draw)]) -> Result<()> {
    for &tier in game.tiers() {
        if !targets.iter().any(|(t, _)| *t == tier) {
            return Err(EngineError::MissingTarget { game, field: latest_field(game, tier) });
        }
    }
    Ok(())
}

pub struct Orchestrator<S: PhaseStore> {
    config: EngineConfig,
    store: S,
}

impl<S: PhaseStore> Orchestrator<S> {
    pub fn new(config: EngineConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn base_seed(&self) -> u64 {
        self.config.seed.unwrap_or_else(|| rand::rng().random())
    }

    /// Phase 1 : un lot par jeu, évalué contre chaque tirage cible.
    pub fn evaluate(&self, inputs: Vec<GameInput>) -> Result<Phase1Report> {
        let mut by_game: BTreeMap<Game, GameInput> = inputs.into_iter().map(|i| (i.game, i)).collect();
        let mut rng = StdRng::seed_from_u64(self.base_seed());

        let mut evaluated = Vec::with_capacity(self.config.games.len());
        let mut games = Vec::with_capacity(self.config.games.len());
        for &game in &self.config.games {
            let input = by_game.remove(&game).ok_or_else(|| EngineError::MissingTarget {
                game,
                field: latest_field(game, Tier::Jackpot),
            })?;
            require_targets(game, &input.targets)?;

            let spec = game.spec();
            let pools = build_pools(&spec, &input.history, &input.feed);
            let band = estimate_band(game, &input.history, self.config.min_band_history);
            let library = pattern_library(spec.family());
            let batch = build_batch(&spec, &pools, band, &library, self.config.batch_size, &self.config, &mut rng);
            log::info!(
                "{} : fourchette {}, {} VIP, {} LRR, {} grilles ({} complétées)",
                game, band, pools.vip.len(), pools.lrr.len(), batch.tickets.len(), batch.notes.padded
            );

            let hits = input
                .targets
                .iter()
                .map(|(tier, target)| TierHits {
                    tier: *tier,
                    target: target.clone(),
                    summary: summarize(&batch.tickets, target),
                })
                .collect();

            evaluated.push(EvaluatedGame {
                game,
                history: input.history,
                feed: input.feed,
                targets: input.targets,
                band,
            });
            games.push(Phase1Game { game, band, pools, batch, hits });
        }

        let token = self.store.save(&PhaseState::Evaluated {
            created_at: chrono::Local::now(),
            games: evaluated,
        })?;
        log::info!("Phase 1 enregistrée : {}", token);
        Ok(Phase1Report { token, games })
    }

    /// Phase 2 : promotion du tirage JP, puis `runs` lots indépendants par jeu.
    pub fn simulate(&self, token: &StateToken) -> Result<Phase2Report> {
        let evaluated = match self.store.load(token)? {
            PhaseState::Evaluated { games, .. } => games,
            PhaseState::Recommended { .. } => {
                return Err(EngineError::state_not_found(token.as_str(), "attendu un état de phase 1, reçu une phase 2"))
            }
        };

        let seed = self.base_seed();
        let progress = progress_bar((self.config.runs * evaluated.len()) as u64, self.config.progress);

        let mut recommended = Vec::with_capacity(evaluated.len());
        let mut games = Vec::with_capacity(evaluated.len());
        for entry in evaluated {
            let game = entry.game;
            let spec = game.spec();
            let primary = entry.primary_target().cloned().ok_or_else(|| EngineError::MissingTarget {
                game,
                field: latest_field(game, Tier::Jackpot),
            })?;

            let history = entry.history.promoted(primary);
            let pools = build_pools(&spec, &history, &entry.feed);
            let band = estimate_band(game, &history, self.config.min_band_history);
            let library = pattern_library(spec.family());

            progress.set_message(game.code());
            let simulation = simulate_runs(&spec, &pools, band, &library, &entry.targets, &self.config, seed, &progress);
            let buy_list = build_buy_list(&spec, &simulation, &pools, band, self.config.buy_list_size(spec.family()));
            log::info!(
                "{} : {} lots, {} grilles distinctes, liste d'achat de {}",
                game, simulation.stats.runs, simulation.stats.unique_tickets, buy_list.len()
            );

            recommended.push(RecommendedGame {
                game,
                band,
                tiers: entry.targets.iter().map(|(t, _)| *t).collect(),
                buy_list: buy_list.clone(),
            });
            games.push(Phase2Game { game, band, pools, stats: simulation.stats, buy_list });
        }
        progress.finish_and_clear();

        let next = self.store.save(&PhaseState::Recommended {
            created_at: chrono::Local::now(),
            source: token.clone(),
            seed,
            games: recommended,
        })?;
        log::info!("Phase 2 enregistrée : {} (graine {})", next, seed);
        Ok(Phase2Report { token: next, source: token.clone(), seed, games })
    }

    /// Phase 3 : la liste d'achat contre les tirages officiels. Lecture seule.
    pub fn confirm(&self, token: &StateToken, targets: &BTreeMap<Game, Vec<(Tier, Draw)>>) -> Result<Phase3Report> {
        let recommended = match self.store.load(token)? {
            PhaseState::Recommended { games, .. } => games,
            PhaseState::Evaluated { .. } => {
                return Err(EngineError::state_not_found(token.as_str(), "attendu un état de phase 2, reçu une phase 1"))
            }
        };

        let mut games = Vec::with_capacity(recommended.len());
        for entry in recommended {
            let game = entry.game;
            let draws = targets.get(&game).ok_or_else(|| EngineError::MissingTarget {
                game,
                field: latest_field(game, Tier::Jackpot),
            })?;

            let mut tiers = Vec::with_capacity(entry.tiers.len());
            for &tier in &entry.tiers {
                let target = draws
                    .iter()
                    .find(|(t, _)| *t == tier)
                    .map(|(_, d)| d)
                    .ok_or_else(|| EngineError::MissingTarget { game, field: latest_field(game, tier) })?;

                let mut summary = HitSummary::default();
                let rows = entry
                    .buy_list
                    .tickets
                    .iter()
                    .enumerate()
                    .map(|(i, ticket)| {
                        let bucket = score(&ticket.mains, ticket.bonus, target);
                        if let Some(b) = bucket {
                            summary.record(b, i + 1);
                        }
                        RowDetail {
                            row: i + 1,
                            mains: ticket.mains.clone(),
                            bonus: ticket.bonus,
                            matched: matched_mains(&ticket.mains, target),
                            bonus_hit: bonus_hit(ticket.bonus, target),
                            bucket,
                        }
                    })
                    .collect();
                tiers.push(TierResult { tier, target: target.clone(), summary, rows });
            }
            games.push(Phase3Game { game, tiers });
        }

        Ok(Phase3Report { token: token.clone(), games })
    }
}
