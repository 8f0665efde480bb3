use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

use lotopt_db::models::GameSpec;

use crate::band::SumBand;
use crate::patterns::Pattern;
use crate::pools::Pools;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketSource {
    Pattern { pattern: Pattern, anchor: u8 },
    /// Grille aléatoire de complément (plafond de tentatives atteint).
    Padding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub mains: Vec<u8>,
    pub bonus: Option<u8>,
    pub sum: u32,
    pub source: TicketSource,
}

impl Ticket {
    pub fn new(mut mains: Vec<u8>, bonus: Option<u8>, source: TicketSource) -> Self {
        mains.sort_unstable();
        let sum = mains.iter().map(|&n| n as u32).sum();
        Self { mains, bonus, sum, source }
    }
}

/// Prend `count` numéros au hasard dans `pool`, hors de `chosen`.
fn sample_excluding<R: Rng + ?Sized>(
    pool: impl IntoIterator<Item = u8>,
    count: usize,
    chosen: &[u8],
    rng: &mut R,
) -> Vec<u8> {
    let mut candidates: Vec<u8> = pool.into_iter().filter(|n| !chosen.contains(n)).collect();
    candidates.shuffle(rng);
    candidates.truncate(count);
    candidates
}

/// Générateur de grilles pour un jeu, des pools et une fourchette donnés.
/// Les ancres VIP et LRR tournent en round-robin d'un appel à l'autre.
pub struct TicketGenerator<'a> {
    spec: GameSpec,
    pools: &'a Pools,
    band: SumBand,
    max_retries: usize,
    union: Vec<u8>,
    vip: Vec<u8>,
    lrr: Vec<u8>,
    bonus_pool: Vec<u8>,
    vip_cursor: usize,
    lrr_cursor: usize,
}

impl<'a> TicketGenerator<'a> {
    pub fn new(spec: GameSpec, pools: &'a Pools, band: SumBand, max_retries: usize) -> Self {
        Self {
            spec,
            pools,
            band,
            max_retries: max_retries.max(1),
            union: pools.union().into_iter().collect(),
            vip: pools.vip.iter().copied().collect(),
            lrr: pools.lrr.iter().copied().collect(),
            bonus_pool: pools.bonus.iter().copied().collect(),
            vip_cursor: 0,
            lrr_cursor: 0,
        }
    }

    pub fn band(&self) -> SumBand {
        self.band
    }

    fn next_anchor(&mut self, pattern: &Pattern) -> Option<u8> {
        let (list, cursor) = match pattern {
            Pattern::Vip(_) => (&self.vip, &mut self.vip_cursor),
            Pattern::Lrr(_) => (&self.lrr, &mut self.lrr_cursor),
        };
        if list.is_empty() {
            return None;
        }
        let anchor = list[*cursor % list.len()];
        *cursor += 1;
        Some(anchor)
    }

    fn draw_mains<R: Rng + ?Sized>(&self, anchor: u8, pattern: &Pattern, rng: &mut R) -> Vec<u8> {
        let k = self.spec.main_pick;
        let recipe = pattern.recipe();
        let mut chosen = vec![anchor];

        for (pool, count) in [
            (&self.pools.hot, recipe.hot),
            (&self.pools.overdue, recipe.overdue),
            (&self.pools.undrawn, recipe.undrawn),
        ] {
            let picked = sample_excluding(pool.iter().copied(), count as usize, &chosen, rng);
            chosen.extend(picked);
        }

        if chosen.len() < k {
            let picked = sample_excluding(self.union.iter().copied(), k - chosen.len(), &chosen, rng);
            chosen.extend(picked);
        }
        if chosen.len() < k {
            let picked = sample_excluding(1..=self.spec.main_max, k - chosen.len(), &chosen, rng);
            chosen.extend(picked);
        }

        // L'ancre reste en tête et n'est jamais retirée.
        while chosen.len() > k {
            let idx = rng.random_range(1..chosen.len());
            chosen.swap_remove(idx);
        }
        chosen
    }

    fn draw_bonus<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u8> {
        let max = self.spec.bonus_max?;
        match self.bonus_pool.choose(rng) {
            Some(&b) => Some(b),
            None => Some(rng.random_range(1..=max)),
        }
    }

    /// Tire jusqu'à `max_retries` grilles et garde la première dans la fourchette,
    /// sinon la plus proche. `None` si le pool d'ancre du motif est vide.
    pub fn generate<R: Rng + ?Sized>(&mut self, pattern: &Pattern, rng: &mut R) -> Option<Ticket> {
        let anchor = self.next_anchor(pattern)?;

        let mut best: Option<(u32, Vec<u8>)> = None;
        for _ in 0..self.max_retries {
            let mains = self.draw_mains(anchor, pattern, rng);
            let sum: u32 = mains.iter().map(|&n| n as u32).sum();
            let distance = self.band.distance(sum);
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, mains));
            }
            if distance == 0 {
                break;
            }
        }

        let (distance, mains) = best?;
        if distance > 0 {
            log::debug!(
                "Motif {} : somme hors fourchette {} après {} essais (écart {})",
                pattern, self.band, self.max_retries, distance
            );
        }
        let bonus = self.draw_bonus(rng);
        Some(Ticket::new(mains, bonus, TicketSource::Pattern { pattern: *pattern, anchor }))
    }

    /// Grille uniforme sur toute la plage, contrainte seulement par la fourchette.
    pub fn random_ticket<R: Rng + ?Sized>(&self, rng: &mut R) -> Ticket {
        let k = self.spec.main_pick;
        let mut best: Option<(u32, Vec<u8>)> = None;
        for _ in 0..self.max_retries {
            let mains = sample_excluding(1..=self.spec.main_max, k, &[], rng);
            let sum: u32 = mains.iter().map(|&n| n as u32).sum();
            let distance = self.band.distance(sum);
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, mains));
            }
            if distance == 0 {
                break;
            }
        }
        let mains = best.map(|(_, m)| m).unwrap_or_default();
        let bonus = self.draw_bonus(rng);
        Ticket::new(mains, bonus, TicketSource::Padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::band::estimate_band;
    use crate::history::{make_test_history, FeedHints, HistoryWindow};
    use crate::patterns::{pattern_library, Recipe};
    use crate::pools::build_pools;
    use lotopt_db::models::Game;

    fn mm_feed() -> FeedHints {
        FeedHints {
            hot: vec![10, 40, 6, 17, 24, 18, 16, 49],
            overdue: vec![53, 3, 40, 15, 51, 9, 66, 37],
            bonus_hot: vec![1, 24, 2],
            bonus_overdue: vec![4, 6, 15],
        }
    }

    fn assert_valid(ticket: &Ticket, spec: &GameSpec) {
        assert_eq!(ticket.mains.len(), spec.main_pick, "{:?}", ticket);
        assert!(ticket.mains.windows(2).all(|w| w[0] < w[1]), "boules non distinctes : {:?}", ticket);
        assert!(ticket.mains.iter().all(|&n| n >= 1 && n <= spec.main_max));
        assert_eq!(ticket.sum, ticket.mains.iter().map(|&n| n as u32).sum::<u32>());
        match spec.bonus_max {
            Some(max) => {
                let b = ticket.bonus.expect("bonus attendu");
                assert!(b >= 1 && b <= max);
            }
            None => assert_eq!(ticket.bonus, None),
        }
    }

    #[test]
    fn test_tickets_valid_for_every_game() {
        let mut rng = StdRng::seed_from_u64(42);
        for game in Game::ALL {
            let spec = game.spec();
            let history = make_test_history(game, 20);
            let feed = FeedHints {
                hot: vec![3, 7, 12, 25, 33],
                overdue: vec![7, 12, 41, 44],
                ..FeedHints::default()
            };
            let pools = build_pools(&spec, &history, &feed);
            let band = estimate_band(game, &history, 8);
            let mut generator = TicketGenerator::new(spec, &pools, band, 50);
            for pattern in pattern_library(spec.family()) {
                if let Some(ticket) = generator.generate(&pattern, &mut rng) {
                    assert_valid(&ticket, &spec);
                }
            }
        }
    }

    #[test]
    fn test_anchor_always_present_and_rotates() {
        let spec = Game::MegaMillions.spec();
        let pools = build_pools(&spec, &HistoryWindow::new(20), &FeedHints {
            hot: vec![5, 9, 20],
            overdue: vec![5, 9, 30],
            ..FeedHints::default()
        });
        let mut generator = TicketGenerator::new(spec, &pools, SumBand::new(15, 340), 50);
        let mut rng = StdRng::seed_from_u64(1);
        let pattern = Pattern::Vip(Recipe { hot: 1, overdue: 1, undrawn: 2 });

        let anchors: Vec<u8> = (0..4)
            .map(|_| {
                let ticket = generator.generate(&pattern, &mut rng).unwrap();
                let TicketSource::Pattern { anchor, .. } = ticket.source else {
                    panic!("source inattendue");
                };
                assert!(ticket.mains.contains(&anchor));
                anchor
            })
            .collect();
        assert_eq!(anchors, vec![5, 9, 5, 9]);
    }

    #[test]
    fn test_empty_anchor_pool_skips() {
        let spec = Game::MegaMillions.spec();
        let pools = build_pools(&spec, &HistoryWindow::new(20), &FeedHints::default());
        let mut generator = TicketGenerator::new(spec, &pools, SumBand::default_for(Game::MegaMillions), 50);
        let mut rng = StdRng::seed_from_u64(3);
        let recipe = Recipe { hot: 1, overdue: 0, undrawn: 3 };
        assert!(generator.generate(&Pattern::Vip(recipe), &mut rng).is_none());
        assert!(generator.generate(&Pattern::Lrr(recipe), &mut rng).is_none());
    }

    #[test]
    fn test_sums_inside_reachable_band() {
        let spec = Game::MegaMillions.spec();
        let pools = build_pools(&spec, &make_test_history(Game::MegaMillions, 20), &mm_feed());
        let band = SumBand::new(120, 220);
        let mut generator = TicketGenerator::new(spec, &pools, band, 50);
        let mut rng = StdRng::seed_from_u64(7);
        let mut total = 0;
        let mut inside = 0;
        for pattern in pattern_library(spec.family()).iter().filter(|p| matches!(p, Pattern::Vip(_))) {
            for _ in 0..5 {
                let ticket = generator.generate(pattern, &mut rng).unwrap();
                total += 1;
                if band.contains(ticket.sum) {
                    inside += 1;
                }
            }
        }
        assert!(inside * 10 >= total * 9, "{inside}/{total} grilles dans {band}");
    }

    #[test]
    fn test_unreachable_band_degrades_instead_of_failing() {
        let spec = Game::MegaMillions.spec();
        let pools = build_pools(&spec, &HistoryWindow::new(20), &mm_feed());
        let band = SumBand::new(5000, 6000);
        let mut generator = TicketGenerator::new(spec, &pools, band, 10);
        let mut rng = StdRng::seed_from_u64(11);
        let ticket = generator
            .generate(&Pattern::Vip(Recipe { hot: 1, overdue: 1, undrawn: 2 }), &mut rng)
            .unwrap();
        assert_valid(&ticket, &spec);
        assert!(!band.contains(ticket.sum));
    }

    #[test]
    fn test_oversized_recipe_is_trimmed_keeping_anchor() {
        let spec = Game::IllinoisLotto.spec();
        let feed = FeedHints {
            hot: vec![1, 2, 3],
            overdue: vec![3, 20, 21, 22, 23],
            ..FeedHints::default()
        };
        let pools = build_pools(&spec, &HistoryWindow::new(20), &feed);
        let mut generator = TicketGenerator::new(spec, &pools, SumBand::new(21, 300), 5);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let ticket = generator
                .generate(&Pattern::Vip(Recipe { hot: 0, overdue: 3, undrawn: 3 }), &mut rng)
                .unwrap();
            assert_valid(&ticket, &spec);
            assert!(ticket.mains.contains(&3));
        }
    }

    #[test]
    fn test_random_ticket_is_padding() {
        let spec = Game::Powerball.spec();
        let pools = build_pools(&spec, &HistoryWindow::new(20), &FeedHints::default());
        let generator = TicketGenerator::new(spec, &pools, SumBand::default_for(Game::Powerball), 50);
        let mut rng = StdRng::seed_from_u64(9);
        let ticket = generator.random_ticket(&mut rng);
        assert_valid(&ticket, &spec);
        assert_eq!(ticket.source, TicketSource::Padding);
    }
}
