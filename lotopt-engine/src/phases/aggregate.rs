use std::collections::BTreeMap;

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use lotopt_db::models::{Draw, GameSpec, Tier};

use crate::band::SumBand;
use crate::batch::{build_batch, Batch, BatchNotes};
use crate::config::EngineConfig;
use crate::patterns::Pattern;
use crate::pools::Pools;
use crate::scorer::{summarize, ScoreBucket};

/// Cumul des gains contre un tirage cible, sur tous les lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTally {
    pub tier: Tier,
    pub counts: BTreeMap<ScoreBucket, usize>,
    /// (lot, ligne), tous deux en base 1.
    pub positions: BTreeMap<ScoreBucket, Vec<(usize, usize)>>,
}

impl TierTally {
    fn new(tier: Tier) -> Self {
        Self { tier, counts: BTreeMap::new(), positions: BTreeMap::new() }
    }

    pub fn count(&self, bucket: ScoreBucket) -> usize {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketKey {
    pub mains: Vec<u8>,
    pub bonus: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub runs: usize,
    pub tickets: usize,
    pub tiers: Vec<TierTally>,
    pub number_frequency: BTreeMap<u8, usize>,
    pub bonus_frequency: BTreeMap<u8, usize>,
    pub unique_tickets: usize,
    /// Plus grand nombre d'apparitions d'une même grille.
    pub most_common_repeat: usize,
    pub notes: BatchNotes,
}

impl AggregateStats {
    fn new(tiers: &[Tier]) -> Self {
        Self {
            runs: 0,
            tickets: 0,
            tiers: tiers.iter().map(|&t| TierTally::new(t)).collect(),
            number_frequency: BTreeMap::new(),
            bonus_frequency: BTreeMap::new(),
            unique_tickets: 0,
            most_common_repeat: 0,
            notes: BatchNotes::default(),
        }
    }

    /// Numéros triés par fréquence décroissante, puis par valeur.
    pub fn ranked_numbers(&self) -> Vec<(u8, usize)> {
        rank(&self.number_frequency)
    }

    pub fn ranked_bonus(&self) -> Vec<(u8, usize)> {
        rank(&self.bonus_frequency)
    }
}

fn rank(freq: &BTreeMap<u8, usize>) -> Vec<(u8, usize)> {
    let mut ranked: Vec<(u8, usize)> = freq.iter().map(|(&n, &c)| (n, c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

/// Résultat brut d'une simulation : statistiques + occurrences de chaque grille.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub stats: AggregateStats,
    pub ticket_counts: BTreeMap<TicketKey, usize>,
}

impl Simulation {
    fn new(tiers: &[Tier]) -> Self {
        Self { stats: AggregateStats::new(tiers), ticket_counts: BTreeMap::new() }
    }

    /// Ajoute le lot `run` (base 0) aux cumuls.
    fn record(&mut self, run: usize, batch: &Batch, targets: &[(Tier, Draw)]) {
        let stats = &mut self.stats;
        stats.runs += 1;
        stats.tickets += batch.tickets.len();
        stats.notes.merge(&batch.notes);

        for (tally, (_, target)) in stats.tiers.iter_mut().zip(targets) {
            let summary = summarize(&batch.tickets, target);
            for (bucket, rows) in summary.positions {
                *tally.counts.entry(bucket).or_insert(0) += rows.len();
                tally
                    .positions
                    .entry(bucket)
                    .or_default()
                    .extend(rows.into_iter().map(|row| (run + 1, row)));
            }
        }

        for ticket in &batch.tickets {
            for &n in &ticket.mains {
                *stats.number_frequency.entry(n).or_insert(0) += 1;
            }
            if let Some(b) = ticket.bonus {
                *stats.bonus_frequency.entry(b).or_insert(0) += 1;
            }
            let key = TicketKey { mains: ticket.mains.clone(), bonus: ticket.bonus };
            *self.ticket_counts.entry(key).or_insert(0) += 1;
        }
        stats.unique_tickets = self.ticket_counts.len();
        stats.most_common_repeat = self.ticket_counts.values().copied().max().unwrap_or(0);
    }
}

/// Lance `config.runs` lots indépendants en parallèle. Le lot `i` utilise la graine
/// `base_seed + i` ; les résultats sont fusionnés dans l'ordre des lots.
#[allow(clippy::too_many_arguments)]
pub fn simulate_runs(
    spec: &GameSpec,
    pools: &Pools,
    band: SumBand,
    library: &[Pattern],
    targets: &[(Tier, Draw)],
    config: &EngineConfig,
    base_seed: u64,
    progress: &ProgressBar,
) -> Simulation {
    let batches: Vec<Batch> = (0..config.runs)
        .into_par_iter()
        .map(|run| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(run as u64));
            let batch = build_batch(spec, pools, band, library, config.batch_size, config, &mut rng);
            progress.inc(1);
            batch
        })
        .collect();

    let tiers: Vec<Tier> = targets.iter().map(|(t, _)| *t).collect();
    let mut simulation = Simulation::new(&tiers);
    for (run, batch) in batches.iter().enumerate() {
        simulation.record(run, batch, targets);
    }
    simulation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::estimate_band;
    use crate::history::{make_test_history, FeedHints};
    use crate::patterns::pattern_library;
    use crate::pools::build_pools;
    use lotopt_db::models::Game;

    fn setup(game: Game) -> (GameSpec, Pools, SumBand, Vec<Pattern>) {
        let spec = game.spec();
        let history = make_test_history(game, 20);
        let feed = FeedHints {
            hot: vec![10, 40, 6, 17, 24, 18, 16, 49],
            overdue: vec![53, 3, 40, 15, 51, 9, 66, 37, 6],
            bonus_hot: vec![1, 24, 2],
            bonus_overdue: vec![4, 6, 15],
        };
        let pools = build_pools(&spec, &history, &feed);
        let band = estimate_band(game, &history, 8);
        (spec, pools, band, pattern_library(spec.family()))
    }

    fn small_config() -> EngineConfig {
        EngineConfig { runs: 8, batch_size: 20, ..EngineConfig::default() }
    }

    #[test]
    fn test_simulation_counts() {
        let (spec, pools, band, library) = setup(Game::MegaMillions);
        let targets = vec![(Tier::Jackpot, Draw { mains: vec![10, 14, 34, 40, 43], bonus: Some(5) })];
        let config = small_config();
        let sim = simulate_runs(&spec, &pools, band, &library, &targets, &config, 7, &ProgressBar::hidden());

        assert_eq!(sim.stats.runs, 8);
        assert_eq!(sim.stats.tickets, 160);
        assert_eq!(sim.stats.number_frequency.values().sum::<usize>(), 160 * 5);
        assert_eq!(sim.stats.bonus_frequency.values().sum::<usize>(), 160);
        assert_eq!(sim.ticket_counts.values().sum::<usize>(), 160);
        assert_eq!(sim.stats.unique_tickets, sim.ticket_counts.len());
        assert!(sim.stats.most_common_repeat >= 1);

        let tally = &sim.stats.tiers[0];
        for (bucket, positions) in &tally.positions {
            assert_eq!(tally.count(*bucket), positions.len());
            assert!(positions.iter().all(|&(run, row)| (1..=8).contains(&run) && (1..=20).contains(&row)));
        }
    }

    #[test]
    fn test_simulation_reproducible_with_seed() {
        let (spec, pools, band, library) = setup(Game::IllinoisLotto);
        let targets = vec![
            (Tier::Jackpot, Draw { mains: vec![1, 4, 5, 10, 18, 49], bonus: None }),
            (Tier::Million1, Draw { mains: vec![6, 8, 10, 18, 26, 27], bonus: None }),
        ];
        let config = small_config();
        let a = simulate_runs(&spec, &pools, band, &library, &targets, &config, 99, &ProgressBar::hidden());
        let b = simulate_runs(&spec, &pools, band, &library, &targets, &config, 99, &ProgressBar::hidden());
        assert_eq!(a.ticket_counts, b.ticket_counts);
        assert_eq!(a.stats.tiers, b.stats.tiers);
        assert_eq!(a.stats.tiers.len(), 2);
        assert!(a.stats.bonus_frequency.is_empty());
    }

    #[test]
    fn test_ranked_numbers_order() {
        let mut stats = AggregateStats::new(&[Tier::Jackpot]);
        stats.number_frequency = BTreeMap::from([(3, 5), (1, 5), (7, 9), (2, 1)]);
        assert_eq!(stats.ranked_numbers(), vec![(7, 9), (1, 5), (3, 5), (2, 1)]);
    }
}
