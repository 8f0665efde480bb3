use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use lotopt_db::models::GameSpec;

use crate::history::{FeedHints, HistoryWindow};

const UNDRAWN_WINDOW: usize = 10;
const LRR_WINDOW: usize = 20;
const LRR_RECENT: usize = 5;
const BONUS_RECENT: usize = 10;

/// Les cinq pools de boules + le pool de bonus, dérivés une fois par (historique, flux).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pools {
    pub hot: BTreeSet<u8>,
    pub overdue: BTreeSet<u8>,
    pub undrawn: BTreeSet<u8>,
    /// Chaud ∩ en retard.
    pub vip: BTreeSet<u8>,
    /// Sortis exactement 2 fois sur les 20 derniers tirages, absents des 5 derniers.
    pub lrr: BTreeSet<u8>,
    pub bonus: BTreeSet<u8>,
}

impl Pools {
    /// Union chaud ∪ en retard ∪ non sortis, utilisée pour compléter une grille.
    pub fn union(&self) -> BTreeSet<u8> {
        self.hot
            .iter()
            .chain(self.overdue.iter())
            .chain(self.undrawn.iter())
            .copied()
            .collect()
    }
}

fn in_range(numbers: &[u8], max: u8) -> BTreeSet<u8> {
    numbers.iter().copied().filter(|&n| n >= 1 && n <= max).collect()
}

pub fn undrawn_pool(spec: &GameSpec, history: &HistoryWindow) -> BTreeSet<u8> {
    let seen: BTreeSet<u8> = history
        .recent(UNDRAWN_WINDOW)
        .iter()
        .flat_map(|d| d.mains.iter().copied())
        .collect();
    (1..=spec.main_max).filter(|n| !seen.contains(n)).collect()
}

pub fn lrr_pool(history: &HistoryWindow) -> BTreeSet<u8> {
    let mut counts: BTreeMap<u8, u32> = BTreeMap::new();
    for draw in history.recent(LRR_WINDOW) {
        for &n in &draw.mains {
            *counts.entry(n).or_insert(0) += 1;
        }
    }
    let recent: BTreeSet<u8> = history
        .recent(LRR_RECENT)
        .iter()
        .flat_map(|d| d.mains.iter().copied())
        .collect();
    counts
        .into_iter()
        .filter(|&(n, c)| c == 2 && !recent.contains(&n))
        .map(|(n, _)| n)
        .collect()
}

fn bonus_pool(spec: &GameSpec, history: &HistoryWindow, feed: &FeedHints) -> BTreeSet<u8> {
    let Some(max) = spec.bonus_max else {
        return BTreeSet::new();
    };
    let recent: BTreeSet<u8> = history
        .recent(BONUS_RECENT)
        .iter()
        .filter_map(|d| d.bonus)
        .collect();
    let mut pool = in_range(&feed.bonus_hot, max);
    pool.extend(in_range(&feed.bonus_overdue, max));
    pool.extend((1..=max).filter(|b| !recent.contains(b)));
    pool
}

/// Fonction pure : mêmes entrées, mêmes pools.
pub fn build_pools(spec: &GameSpec, history: &HistoryWindow, feed: &FeedHints) -> Pools {
    let hot = in_range(&feed.hot, spec.main_max);
    let overdue = in_range(&feed.overdue, spec.main_max);
    let vip = hot.intersection(&overdue).copied().collect();
    Pools {
        undrawn: undrawn_pool(spec, history),
        lrr: lrr_pool(history),
        bonus: bonus_pool(spec, history, feed),
        hot,
        overdue,
        vip,
    }
}
