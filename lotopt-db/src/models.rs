use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Game {
    MegaMillions,
    Powerball,
    IllinoisLotto,
}

/// Famille de jeu : 5 boules + numéro bonus, ou 6 boules sans bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family {
    FiveBonus,
    Six,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSpec {
    pub main_max: u8,
    pub main_pick: usize,
    pub bonus_max: Option<u8>,
}

impl GameSpec {
    pub fn family(&self) -> Family {
        match self.bonus_max {
            Some(_) => Family::FiveBonus,
            None => Family::Six,
        }
    }
}

impl Game {
    pub const ALL: [Game; 3] = [Game::MegaMillions, Game::Powerball, Game::IllinoisLotto];

    pub fn spec(&self) -> GameSpec {
        match self {
            Game::MegaMillions => GameSpec { main_max: 70, main_pick: 5, bonus_max: Some(25) },
            Game::Powerball => GameSpec { main_max: 69, main_pick: 5, bonus_max: Some(26) },
            Game::IllinoisLotto => GameSpec { main_max: 50, main_pick: 6, bonus_max: None },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Game::MegaMillions => "MM",
            Game::Powerball => "PB",
            Game::IllinoisLotto => "IL",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Game::MegaMillions => "Mega Millions",
            Game::Powerball => "Powerball",
            Game::IllinoisLotto => "Illinois Lotto",
        }
    }

    /// Tirages publiés à chaque date. Le premier est la cible principale.
    pub fn tiers(&self) -> &'static [Tier] {
        match self {
            Game::MegaMillions | Game::Powerball => &[Tier::Jackpot],
            Game::IllinoisLotto => &[Tier::Jackpot, Tier::Million1, Tier::Million2],
        }
    }

    /// Fourchette de somme par défaut (~50% central de la distribution théorique).
    pub fn default_band(&self) -> (u32, u32) {
        match self {
            Game::MegaMillions => (148, 207),
            Game::Powerball => (146, 204),
            Game::IllinoisLotto => (130, 176),
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MM" | "MEGA" | "MEGAMILLIONS" => Ok(Game::MegaMillions),
            "PB" | "POWERBALL" => Ok(Game::Powerball),
            "IL" | "LOTTO" | "ILLINOIS" => Ok(Game::IllinoisLotto),
            other => Err(format!("Jeu inconnu : '{}' (attendu MM, PB ou IL)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Jackpot,
    Million1,
    Million2,
}

impl Tier {
    pub fn code(&self) -> &'static str {
        match self {
            Tier::Jackpot => "JP",
            Tier::Million1 => "M1",
            Tier::Million2 => "M2",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "JP" => Ok(Tier::Jackpot),
            "M1" => Ok(Tier::Million1),
            "M2" => Ok(Tier::Million2),
            other => Err(format!("Tirage inconnu : '{}' (attendu JP, M1 ou M2)", other)),
        }
    }
}

/// Un tirage : boules principales triées + bonus éventuel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Draw {
    pub mains: Vec<u8>,
    pub bonus: Option<u8>,
}

impl Draw {
    pub fn new(spec: &GameSpec, mut mains: Vec<u8>, bonus: Option<u8>) -> Result<Self> {
        validate_draw(spec, &mains, bonus)?;
        mains.sort_unstable();
        Ok(Self { mains, bonus })
    }

    pub fn sum(&self) -> u32 {
        self.mains.iter().map(|&n| n as u32).sum()
    }
}

#[derive(Debug, Clone)]
pub struct StoredDraw {
    pub game: Game,
    pub tier: Tier,
    pub date: NaiveDate,
    pub draw: Draw,
}

pub fn validate_draw(spec: &GameSpec, mains: &[u8], bonus: Option<u8>) -> Result<()> {
    if mains.len() != spec.main_pick {
        bail!("Attendu {} boules, reçu {}", spec.main_pick, mains.len());
    }
    for &b in mains {
        if b < 1 || b > spec.main_max {
            bail!("Boule {} hors limites (1-{})", b, spec.main_max);
        }
    }
    for i in 0..mains.len() {
        for j in (i + 1)..mains.len() {
            if mains[i] == mains[j] {
                bail!("Boule en double : {}", mains[i]);
            }
        }
    }
    match (spec.bonus_max, bonus) {
        (Some(max), Some(b)) if b < 1 || b > max => bail!("Bonus {} hors limites (1-{})", b, max),
        (None, Some(b)) => bail!("Ce jeu n'a pas de numéro bonus (reçu {})", b),
        _ => {}
    }
    Ok(())
}
