use serde::{Deserialize, Serialize};

use lotopt_db::models::Game;

use crate::history::HistoryWindow;

/// Fourchette fermée de somme des boules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumBand {
    pub lo: u32,
    pub hi: u32,
}

impl SumBand {
    pub fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    pub fn default_for(game: Game) -> Self {
        let (lo, hi) = game.default_band();
        Self { lo, hi }
    }

    pub fn contains(&self, sum: u32) -> bool {
        self.lo <= sum && sum <= self.hi
    }

    /// 0 dans la fourchette, sinon l'écart au bord le plus proche.
    pub fn distance(&self, sum: u32) -> u32 {
        if sum < self.lo {
            self.lo - sum
        } else if sum > self.hi {
            sum - self.hi
        } else {
            0
        }
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lo as f64 + self.hi as f64)
    }

    pub fn width(&self) -> u32 {
        self.hi - self.lo
    }
}

impl std::fmt::Display for SumBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

/// Quantile par interpolation linéaire entre statistiques d'ordre (position p·(n−1)).
/// `sorted` doit être trié et non vide.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// 25e–75e centile des sommes de l'historique, ou la fourchette par défaut du jeu
/// si l'historique est trop court ou dégénéré.
pub fn estimate_band(game: Game, history: &HistoryWindow, min_history: usize) -> SumBand {
    if history.len() < min_history.max(1) {
        return SumBand::default_for(game);
    }
    let mut sums: Vec<f64> = history.sums().into_iter().map(|s| s as f64).collect();
    sums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let lo = quantile(&sums, 0.25) as u32;
    let hi = quantile(&sums, 0.75) as u32;
    if lo >= hi {
        log::debug!("{} : fourchette calculée dégénérée [{}, {}], défaut utilisé", game, lo, hi);
        return SumBand::default_for(game);
    }
    SumBand { lo, hi }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotopt_db::models::Draw;

    /// Historique dont chaque tirage a la somme demandée.
    fn window_with_sums(sums: &[u32]) -> HistoryWindow {
        let draws = sums
            .iter()
            .map(|&s| {
                // 4 boules fixes + une 5e qui ajuste la somme
                let base = [1u8, 2, 3, 4];
                let last = (s - 10) as u8;
                let mut mains = base.to_vec();
                mains.push(last);
                Draw { mains, bonus: None }
            })
            .collect();
        HistoryWindow::from_newest(draws, 20)
    }

    #[test]
    fn test_band_example() {
        let history = window_with_sums(&[120, 130, 140, 150, 160, 170, 180, 190]);
        let band = estimate_band(Game::MegaMillions, &history, 8);
        assert_eq!(band, SumBand::new(137, 172));
    }

    #[test]
    fn test_band_order_independent() {
        let history = window_with_sums(&[190, 120, 170, 140, 160, 130, 180, 150]);
        let band = estimate_band(Game::MegaMillions, &history, 8);
        assert_eq!(band, SumBand::new(137, 172));
    }

    #[test]
    fn test_short_history_uses_default() {
        let history = window_with_sums(&[120, 130, 140]);
        assert_eq!(estimate_band(Game::Powerball, &history, 8), SumBand::default_for(Game::Powerball));
        assert_eq!(
            estimate_band(Game::IllinoisLotto, &HistoryWindow::new(20), 8),
            SumBand::default_for(Game::IllinoisLotto)
        );
    }

    #[test]
    fn test_degenerate_history_uses_default() {
        let history = window_with_sums(&[150; 10]);
        assert_eq!(estimate_band(Game::MegaMillions, &history, 8), SumBand::default_for(Game::MegaMillions));
    }

    #[test]
    fn test_band_lo_le_hi_on_test_histories() {
        for game in Game::ALL {
            for n in 0..=20 {
                let band = estimate_band(game, &crate::history::make_test_history(game, n), 8);
                assert!(band.lo <= band.hi, "{game} n={n} : {band}");
            }
        }
    }

    #[test]
    fn test_distance_and_contains() {
        let band = SumBand::new(100, 150);
        assert!(band.contains(100));
        assert!(band.contains(150));
        assert!(!band.contains(151));
        assert_eq!(band.distance(90), 10);
        assert_eq!(band.distance(160), 10);
        assert_eq!(band.distance(120), 0);
        assert!((band.midpoint() - 125.0).abs() < 1e-9);
    }
}
