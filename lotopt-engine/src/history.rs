use serde::{Deserialize, Serialize};

use lotopt_db::models::Draw;

/// Fenêtre des derniers tirages d'un jeu. `draws[0]` = le plus récent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryWindow {
    draws: Vec<Draw>,
    cap: usize,
}

impl HistoryWindow {
    pub fn new(cap: usize) -> Self {
        Self { draws: Vec::new(), cap }
    }

    pub fn from_newest(mut draws: Vec<Draw>, cap: usize) -> Self {
        draws.truncate(cap);
        Self { draws, cap }
    }

    /// Ajoute un tirage en tête ("comme s'il avait déjà eu lieu") et tronque au plafond.
    pub fn promote(&mut self, draw: Draw) {
        self.draws.insert(0, draw);
        self.draws.truncate(self.cap);
    }

    pub fn promoted(&self, draw: Draw) -> Self {
        let mut next = self.clone();
        next.promote(draw);
        next
    }

    /// Les `n` tirages les plus récents (moins s'il n'y en a pas assez).
    pub fn recent(&self, n: usize) -> &[Draw] {
        &self.draws[..n.min(self.draws.len())]
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn sums(&self) -> Vec<u32> {
        self.draws.iter().map(Draw::sum).collect()
    }
}

/// Indications "chaud / en retard" fournies de l'extérieur.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedHints {
    pub hot: Vec<u8>,
    pub overdue: Vec<u8>,
    pub bonus_hot: Vec<u8>,
    pub bonus_overdue: Vec<u8>,
}

#[cfg(test)]
pub fn make_test_history(game: lotopt_db::models::Game, n: usize) -> HistoryWindow {
    let spec = game.spec();
    let draws = (0..n)
        .map(|i| {
            let mains: Vec<u8> = (0..spec.main_pick)
                .map(|j| ((i * 7 + j * 11) % spec.main_max as usize) as u8 + 1)
                .collect();
            let bonus = spec.bonus_max.map(|max| (i % max as usize) as u8 + 1);
            Draw::new(&spec, mains, bonus).expect("tirage de test valide")
        })
        .collect();
    HistoryWindow::from_newest(draws, 20)
}
