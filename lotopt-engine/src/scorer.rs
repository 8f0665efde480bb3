use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use lotopt_db::models::Draw;

use crate::band::SumBand;
use crate::generator::Ticket;
use crate::pools::Pools;

/// Rang de gain d'une grille contre un tirage. Moins de 3 boules : pas de rang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreBucket {
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "3+Bonus")]
    ThreeBonus,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "4+Bonus")]
    FourBonus,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "5+Bonus")]
    FiveBonus,
    #[serde(rename = "6")]
    Six,
}

impl ScoreBucket {
    pub const ALL: [ScoreBucket; 7] = [
        ScoreBucket::Three,
        ScoreBucket::ThreeBonus,
        ScoreBucket::Four,
        ScoreBucket::FourBonus,
        ScoreBucket::Five,
        ScoreBucket::FiveBonus,
        ScoreBucket::Six,
    ];

    pub fn from_matches(matched: usize, bonus_hit: bool) -> Option<Self> {
        match (matched, bonus_hit) {
            (3, false) => Some(ScoreBucket::Three),
            (3, true) => Some(ScoreBucket::ThreeBonus),
            (4, false) => Some(ScoreBucket::Four),
            (4, true) => Some(ScoreBucket::FourBonus),
            (5, false) => Some(ScoreBucket::Five),
            (5, true) => Some(ScoreBucket::FiveBonus),
            (6, _) => Some(ScoreBucket::Six),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBucket::Three => "3",
            ScoreBucket::ThreeBonus => "3+Bonus",
            ScoreBucket::Four => "4",
            ScoreBucket::FourBonus => "4+Bonus",
            ScoreBucket::Five => "5",
            ScoreBucket::FiveBonus => "5+Bonus",
            ScoreBucket::Six => "6",
        }
    }
}

impl fmt::Display for ScoreBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Boules de la grille présentes dans le tirage.
pub fn matched_mains(mains: &[u8], target: &Draw) -> Vec<u8> {
    mains.iter().copied().filter(|n| target.mains.contains(n)).collect()
}

pub fn bonus_hit(bonus: Option<u8>, target: &Draw) -> bool {
    matches!((bonus, target.bonus), (Some(a), Some(b)) if a == b)
}

pub fn score(mains: &[u8], bonus: Option<u8>, target: &Draw) -> Option<ScoreBucket> {
    ScoreBucket::from_matches(matched_mains(mains, target).len(), bonus_hit(bonus, target))
}

/// Résultat d'un lot contre un tirage : nombre de grilles et lignes (base 1) par rang.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitSummary {
    pub counts: BTreeMap<ScoreBucket, usize>,
    pub positions: BTreeMap<ScoreBucket, Vec<usize>>,
}

impl HitSummary {
    pub fn record(&mut self, bucket: ScoreBucket, row: usize) {
        *self.counts.entry(bucket).or_insert(0) += 1;
        self.positions.entry(bucket).or_default().push(row);
    }

    pub fn count(&self, bucket: ScoreBucket) -> usize {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

pub fn summarize(tickets: &[Ticket], target: &Draw) -> HitSummary {
    let mut summary = HitSummary::default();
    for (i, ticket) in tickets.iter().enumerate() {
        if let Some(bucket) = score(&ticket.mains, ticket.bonus, target) {
            summary.record(bucket, i + 1);
        }
    }
    summary
}

/// Score secondaire d'une grille : appartenance aux pools, proximité du centre de la
/// fourchette et étalement.
pub fn ticket_heuristic(mains: &[u8], pools: &Pools, band: SumBand) -> f64 {
    let count_in = |set: &std::collections::BTreeSet<u8>| mains.iter().filter(|n| set.contains(n)).count() as f64;
    let sum: u32 = mains.iter().map(|&n| n as u32).sum();
    let width = band.width().max(1) as f64;
    let closeness = 1.0 - (sum as f64 - band.midpoint()).abs() / width;
    let spread = match (mains.iter().min(), mains.iter().max()) {
        (Some(&lo), Some(&hi)) => (hi - lo) as f64,
        _ => 0.0,
    };

    1.3 * count_in(&pools.hot)
        + 1.1 * count_in(&pools.overdue)
        + 1.6 * count_in(&pools.vip)
        + 0.8 * closeness
        + 0.2 * spread
}
