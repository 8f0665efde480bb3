use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use lotopt_db::models::{Draw, Game, Tier};

use crate::band::SumBand;
use crate::history::{FeedHints, HistoryWindow};

use super::buylist::BuyList;

/// Jeton opaque renvoyé par un `PhaseStore`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateToken(pub String);

impl StateToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Phase lue dans le jeton `AAAAMMJJ-HHMMSS-<code>-<sel>`, `None` si le format diffère.
    pub fn kind(&self) -> Option<PhaseKind> {
        let code = self.0.split('-').nth(2)?;
        PhaseKind::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl std::fmt::Display for StateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateToken {
    fn from(s: &str) -> Self {
        StateToken(s.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseKind {
    Evaluated,
    Recommended,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 2] = [PhaseKind::Evaluated, PhaseKind::Recommended];

    pub fn number(&self) -> u8 {
        match self {
            PhaseKind::Evaluated => 1,
            PhaseKind::Recommended => 2,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PhaseKind::Evaluated => "p1",
            PhaseKind::Recommended => "p2",
        }
    }
}

/// Ce que la phase 1 transmet à la phase 2 pour un jeu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedGame {
    pub game: Game,
    pub history: HistoryWindow,
    pub feed: FeedHints,
    pub targets: Vec<(Tier, Draw)>,
    pub band: SumBand,
}

impl EvaluatedGame {
    pub fn primary_target(&self) -> Option<&Draw> {
        self.targets.iter().find(|(t, _)| *t == Tier::Jackpot).map(|(_, d)| d)
    }
}

/// Ce que la phase 2 transmet à la phase 3 pour un jeu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedGame {
    pub game: Game,
    pub band: SumBand,
    pub tiers: Vec<Tier>,
    pub buy_list: BuyList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase")]
pub enum PhaseState {
    Evaluated {
        created_at: DateTime<Local>,
        games: Vec<EvaluatedGame>,
    },
    Recommended {
        created_at: DateTime<Local>,
        /// Jeton de la phase 1 d'origine.
        source: StateToken,
        seed: u64,
        games: Vec<RecommendedGame>,
    },
}

impl PhaseState {
    pub fn kind(&self) -> PhaseKind {
        match self {
            PhaseState::Evaluated { .. } => PhaseKind::Evaluated,
            PhaseState::Recommended { .. } => PhaseKind::Recommended,
        }
    }

    pub fn created_at(&self) -> DateTime<Local> {
        match self {
            PhaseState::Evaluated { created_at, .. } | PhaseState::Recommended { created_at, .. } => *created_at,
        }
    }

    pub fn games(&self) -> Vec<Game> {
        match self {
            PhaseState::Evaluated { games, .. } => games.iter().map(|g| g.game).collect(),
            PhaseState::Recommended { games, .. } => games.iter().map(|g| g.game).collect(),
        }
    }
}
