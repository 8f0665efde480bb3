use serde::{Deserialize, Serialize};

use lotopt_db::models::{Family, Game};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Jeux traités par chaque phase.
    pub games: Vec<Game>,
    /// Nombre de grilles par lot.
    pub batch_size: usize,
    /// Nombre de lots simulés en phase 2.
    pub runs: usize,
    /// Tentatives max pour ramener une grille dans la fourchette de somme.
    pub max_ticket_retries: usize,
    /// Plafond de tentatives de génération par grille demandée.
    pub attempts_per_ticket: usize,
    pub history_cap: usize,
    /// En dessous, la fourchette par défaut du jeu est utilisée.
    pub min_band_history: usize,
    pub buy_list_five: usize,
    pub buy_list_six: usize,
    pub seed: Option<u64>,
    pub progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            games: Game::ALL.to_vec(),
            batch_size: 50,
            runs: 100,
            max_ticket_retries: 50,
            attempts_per_ticket: 20,
            history_cap: 20,
            min_band_history: 8,
            buy_list_five: 10,
            buy_list_six: 15,
            seed: None,
            progress: false,
        }
    }
}

impl EngineConfig {
    pub fn buy_list_size(&self, family: Family) -> usize {
        match family {
            Family::FiveBonus => self.buy_list_five,
            Family::Six => self.buy_list_six,
        }
    }
}

pub fn save_config(config: &EngineConfig, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_config(path: &std::path::Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&json)?;
    Ok(config)
}
