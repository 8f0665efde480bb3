use rand::Rng;
use serde::{Deserialize, Serialize};

use lotopt_db::models::GameSpec;

use crate::band::SumBand;
use crate::config::EngineConfig;
use crate::generator::{Ticket, TicketGenerator};
use crate::patterns::Pattern;
use crate::pools::Pools;

/// Situations dégradées rencontrées pendant la construction d'un lot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchNotes {
    /// Motifs ignorés faute d'ancre (pool VIP ou LRR vide).
    pub skipped_patterns: usize,
    /// Grilles rendues hors fourchette après épuisement des essais.
    pub out_of_band: usize,
    /// Grilles aléatoires ajoutées pour atteindre la taille demandée.
    pub padded: usize,
}

impl BatchNotes {
    pub fn merge(&mut self, other: &BatchNotes) {
        self.skipped_patterns += other.skipped_patterns;
        self.out_of_band += other.out_of_band;
        self.padded += other.padded;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub tickets: Vec<Ticket>,
    pub notes: BatchNotes,
}

/// Construit un lot de `size` grilles en parcourant la bibliothèque de motifs en boucle.
pub fn build_batch<R: Rng + ?Sized>(
    spec: &GameSpec,
    pools: &Pools,
    band: SumBand,
    library: &[Pattern],
    size: usize,
    config: &EngineConfig,
    rng: &mut R,
) -> Batch {
    let mut notes = BatchNotes::default();
    let mut generator = TicketGenerator::new(*spec, pools, band, config.max_ticket_retries);

    let usable: Vec<&Pattern> = library
        .iter()
        .filter(|p| !p.anchor_pool(pools).is_empty())
        .collect();
    notes.skipped_patterns = library.len() - usable.len();

    let mut tickets = Vec::with_capacity(size);
    if !usable.is_empty() {
        let ceiling = size.saturating_mul(config.attempts_per_ticket.max(1));
        let mut attempts = 0;
        while tickets.len() < size && attempts < ceiling {
            let pattern = usable[attempts % usable.len()];
            attempts += 1;
            if let Some(ticket) = generator.generate(pattern, rng) {
                if !band.contains(ticket.sum) {
                    notes.out_of_band += 1;
                }
                tickets.push(ticket);
            }
        }
    }

    if tickets.len() < size {
        notes.padded = size - tickets.len();
        log::debug!(
            "Lot incomplet ({} / {}), complété par {} grilles aléatoires",
            tickets.len(), size, notes.padded
        );
        while tickets.len() < size {
            let ticket = generator.random_ticket(rng);
            if !band.contains(ticket.sum) {
                notes.out_of_band += 1;
            }
            tickets.push(ticket);
        }
    }

    Batch { tickets, notes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::band::estimate_band;
    use crate::generator::TicketSource;
    use crate::history::{make_test_history, FeedHints, HistoryWindow};
    use crate::patterns::pattern_library;
    use crate::pools::build_pools;
    use lotopt_db::models::Game;

    #[test]
    fn test_batch_has_exact_size() {
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for game in Game::ALL {
            let spec = game.spec();
            let history = make_test_history(game, 20);
            let feed = FeedHints { hot: vec![4, 8, 15, 16, 23], overdue: vec![8, 15, 42], ..FeedHints::default() };
            let pools = build_pools(&spec, &history, &feed);
            let band = estimate_band(game, &history, config.min_band_history);
            let library = pattern_library(spec.family());
            for size in [1, 7, 50] {
                let batch = build_batch(&spec, &pools, band, &library, size, &config, &mut rng);
                assert_eq!(batch.tickets.len(), size, "{game} taille {size}");
            }
        }
    }

    #[test]
    fn test_empty_anchor_pools_are_padded() {
        let config = EngineConfig::default();
        let spec = Game::MegaMillions.spec();
        let pools = build_pools(&spec, &HistoryWindow::new(20), &FeedHints::default());
        let library = pattern_library(spec.family());
        let mut rng = StdRng::seed_from_u64(1);

        let batch = build_batch(&spec, &pools, SumBand::default_for(Game::MegaMillions), &library, 50, &config, &mut rng);
        assert_eq!(batch.tickets.len(), 50);
        assert_eq!(batch.notes.skipped_patterns, 18);
        assert_eq!(batch.notes.padded, 50);
        assert!(batch.tickets.iter().all(|t| t.source == TicketSource::Padding));
        assert!(batch.tickets.iter().all(|t| t.mains.len() == 5 && t.bonus.is_some()));
    }

    #[test]
    fn test_only_lrr_patterns_used_when_vip_empty() {
        let config = EngineConfig::default();
        let spec = Game::IllinoisLotto.spec();
        let history = make_test_history(Game::IllinoisLotto, 20);
        let pools = build_pools(&spec, &history, &FeedHints::default());
        assert!(pools.vip.is_empty());
        let library = pattern_library(spec.family());
        let mut rng = StdRng::seed_from_u64(2);

        let batch = build_batch(&spec, &pools, estimate_band(Game::IllinoisLotto, &history, 8), &library, 20, &config, &mut rng);
        assert_eq!(batch.tickets.len(), 20);
        if pools.lrr.is_empty() {
            assert_eq!(batch.notes.padded, 20);
        } else {
            assert_eq!(batch.notes.skipped_patterns, 19);
            for ticket in &batch.tickets {
                if let TicketSource::Pattern { pattern, anchor } = &ticket.source {
                    assert!(matches!(pattern, Pattern::Lrr(_)));
                    assert!(pools.lrr.contains(anchor));
                }
            }
        }
    }

    fn out_of_band(batch: &Batch, band: SumBand) -> usize {
        batch.tickets.iter().filter(|t| !band.contains(t.sum)).count()
    }

    #[test]
    fn test_out_of_band_only_after_retries_exhausted() {
        let config = EngineConfig { max_ticket_retries: 3, ..EngineConfig::default() };
        let mut rng = StdRng::seed_from_u64(7);
        for game in Game::ALL {
            let spec = game.spec();
            let history = make_test_history(game, 20);
            let feed = FeedHints { hot: vec![4, 8, 15, 16, 23], overdue: vec![8, 15, 42], ..FeedHints::default() };
            let pools = build_pools(&spec, &history, &feed);
            let library = pattern_library(spec.family());
            let (lo, hi) = game.default_band();
            for band in [SumBand::new(lo, hi), SumBand::new(lo + 20, lo + 25), SumBand::new(5, 10)] {
                let batch = build_batch(&spec, &pools, band, &library, 40, &config, &mut rng);
                assert_eq!(batch.notes.out_of_band, out_of_band(&batch, band), "{game} {band}");
            }
        }
    }

    #[test]
    fn test_unreachable_band_counts_every_ticket() {
        let config = EngineConfig::default();
        let spec = Game::MegaMillions.spec();
        let history = make_test_history(Game::MegaMillions, 20);
        let pools = build_pools(&spec, &history, &FeedHints { hot: vec![8, 15], overdue: vec![8, 15], ..FeedHints::default() });
        let library = pattern_library(spec.family());
        let mut rng = StdRng::seed_from_u64(8);

        // somme minimale 1+2+3+4+5 = 15
        let band = SumBand::new(5, 10);
        let batch = build_batch(&spec, &pools, band, &library, 30, &config, &mut rng);
        assert_eq!(batch.tickets.len(), 30);
        assert_eq!(batch.notes.out_of_band, 30);
    }

    #[test]
    fn test_reachable_band_has_no_out_of_band() {
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        for game in Game::ALL {
            let spec = game.spec();
            let history = make_test_history(game, 20);
            let pools = build_pools(&spec, &history, &FeedHints { hot: vec![8, 15, 23], overdue: vec![8, 15, 42], ..FeedHints::default() });
            let library = pattern_library(spec.family());
            let band = SumBand::new(0, 1_000);
            let batch = build_batch(&spec, &pools, band, &library, 50, &config, &mut rng);
            assert_eq!(batch.notes.out_of_band, 0, "{game}");
            assert_eq!(out_of_band(&batch, band), 0, "{game}");
        }
    }

    #[test]
    fn test_notes_merge() {
        let mut a = BatchNotes { skipped_patterns: 1, out_of_band: 2, padded: 3 };
        a.merge(&BatchNotes { skipped_patterns: 1, out_of_band: 1, padded: 0 });
        assert_eq!(a, BatchNotes { skipped_patterns: 2, out_of_band: 3, padded: 3 });
    }
}
