//! Saisie brute d'une phase : une table de champs texte (`LATEST_MM`, `HIST_PB_BLOB`,
//! `FEED_IL`, …) décodée en valeurs typées par jeu.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lotopt_db::models::{Draw, Game, Tier};

use crate::error::{EngineError, Result};
use crate::history::{FeedHints, HistoryWindow};
use crate::parse::{parse_draw, parse_feed, parse_history_blob};

pub fn latest_field(game: Game, tier: Tier) -> String {
    match game {
        Game::IllinoisLotto => format!("LATEST_{}_{}", game.code(), tier.code()),
        _ => format!("LATEST_{}", game.code()),
    }
}

pub fn history_field(game: Game) -> String {
    format!("HIST_{}_BLOB", game.code())
}

pub fn feed_field(game: Game) -> String {
    format!("FEED_{}", game.code())
}

/// Entrées typées d'un jeu pour la phase 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInput {
    pub game: Game,
    pub history: HistoryWindow,
    pub feed: FeedHints,
    pub targets: Vec<(Tier, Draw)>,
}

impl GameInput {
    /// Tirage cible principal (JP), promu dans l'historique en phase 2.
    pub fn primary_target(&self) -> Option<&Draw> {
        self.targets.iter().find(|(t, _)| *t == Tier::Jackpot).map(|(_, d)| d)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub BTreeMap<String, String>);

impl Payload {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    fn game_targets(&self, game: Game) -> Result<Vec<(Tier, Draw)>> {
        let spec = game.spec();
        game.tiers()
            .iter()
            .map(|&tier| -> Result<(Tier, Draw)> {
                let field = latest_field(game, tier);
                let text = self
                    .get(&field)
                    .ok_or_else(|| EngineError::MissingTarget { game, field: field.clone() })?;
                Ok((tier, parse_draw(&field, text, &spec)?))
            })
            .collect()
    }

    /// Tirages cibles (`LATEST_*`) seulement, pour la phase 3.
    pub fn targets(&self, games: &[Game]) -> Result<BTreeMap<Game, Vec<(Tier, Draw)>>> {
        games
            .iter()
            .map(|&game| -> Result<(Game, Vec<(Tier, Draw)>)> { Ok((game, self.game_targets(game)?)) })
            .collect()
    }

    /// Historique et flux absents sont traités comme vides ; un tirage cible absent
    /// est une erreur.
    pub fn phase1_inputs(&self, games: &[Game], cap: usize) -> Result<Vec<GameInput>> {
        let mut inputs = Vec::with_capacity(games.len());
        for &game in games {
            let spec = game.spec();
            let targets = self.game_targets(game)?;
            let history = match self.get(&history_field(game)) {
                Some(blob) => parse_history_blob(blob, &spec, cap),
                None => HistoryWindow::new(cap),
            };
            let feed = self.get(&feed_field(game)).map(parse_feed).unwrap_or_default();
            log::debug!(
                "{} : {} tirages d'historique, {} chauds, {} en retard",
                game, history.len(), feed.hot.len(), feed.overdue.len()
            );
            inputs.push(GameInput { game, history, feed, targets });
        }
        Ok(inputs)
    }
}
