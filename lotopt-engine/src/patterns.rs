use serde::{Deserialize, Serialize};

use lotopt_db::models::Family;

use crate::pools::Pools;

/// Nombre de boules à tirer dans chaque pool, en plus de l'ancre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipe {
    pub hot: u8,
    pub overdue: u8,
    pub undrawn: u8,
}

/// Recette de génération d'une grille, ancrée sur un numéro VIP ou LRR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    Vip(Recipe),
    Lrr(Recipe),
}

impl Pattern {
    pub fn recipe(&self) -> &Recipe {
        match self {
            Pattern::Vip(r) | Pattern::Lrr(r) => r,
        }
    }

    pub fn anchor_kind(&self) -> &'static str {
        match self {
            Pattern::Vip(_) => "VIP",
            Pattern::Lrr(_) => "LRR",
        }
    }

    pub fn anchor_pool<'a>(&self, pools: &'a Pools) -> &'a std::collections::BTreeSet<u8> {
        match self {
            Pattern::Vip(_) => &pools.vip,
            Pattern::Lrr(_) => &pools.lrr,
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = self.recipe();
        write!(f, "{} h{} o{} u{}", self.anchor_kind(), r.hot, r.overdue, r.undrawn)
    }
}

const fn r(hot: u8, overdue: u8, undrawn: u8) -> Recipe {
    Recipe { hot, overdue, undrawn }
}

const FIVE_RECIPES: [Recipe; 9] = [
    r(1, 0, 3), r(1, 1, 2), r(1, 2, 1),
    r(2, 0, 2), r(2, 1, 1), r(3, 0, 1),
    r(0, 1, 3), r(0, 2, 2), r(0, 3, 1),
];

// (0, 3, 3) dépasse 6 boules avec l'ancre : la grille est rognée à la génération.
const SIX_RECIPES: [Recipe; 19] = [
    r(1, 0, 4), r(1, 1, 3), r(1, 2, 2), r(1, 3, 1),
    r(2, 0, 3), r(2, 1, 2), r(2, 2, 1), r(2, 3, 0),
    r(3, 0, 2), r(3, 1, 1), r(3, 2, 0),
    r(4, 0, 1), r(4, 1, 0), r(5, 0, 0),
    r(0, 1, 4), r(0, 2, 3), r(0, 3, 3), r(0, 4, 1), r(0, 5, 0),
];

/// Bibliothèque ordonnée : toutes les recettes ancrées VIP, puis les mêmes ancrées LRR.
pub fn pattern_library(family: Family) -> Vec<Pattern> {
    let recipes: &[Recipe] = match family {
        Family::FiveBonus => &FIVE_RECIPES,
        Family::Six => &SIX_RECIPES,
    };
    recipes
        .iter()
        .map(|&rec| Pattern::Vip(rec))
        .chain(recipes.iter().map(|&rec| Pattern::Lrr(rec)))
        .collect()
}
