use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use lotopt_db::models::GameSpec;

use crate::band::SumBand;
use crate::pools::Pools;
use crate::scorer::ticket_heuristic;

use super::aggregate::{Simulation, TicketKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyTicket {
    pub mains: Vec<u8>,
    pub bonus: Option<u8>,
    /// Nombre d'apparitions de la grille sur l'ensemble des lots.
    pub occurrences: usize,
    /// Somme des fréquences de ses boules.
    pub frequency_mass: usize,
    pub score: f64,
    /// Grille composée à partir du classement des fréquences, pas observée telle quelle.
    pub from_frequency: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyList {
    pub tickets: Vec<BuyTicket>,
}

impl BuyList {
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

fn shared(a: &[u8], b: &[u8]) -> usize {
    a.iter().filter(|n| b.contains(n)).count()
}

/// Vrai si la grille partage au moins k−1 boules avec une grille déjà retenue.
fn too_close(mains: &[u8], chosen: &[BuyTicket], k: usize) -> bool {
    chosen.iter().any(|t| shared(mains, &t.mains) + 1 >= k)
}

fn compare(a: &BuyTicket, b: &BuyTicket) -> Ordering {
    b.frequency_mass
        .cmp(&a.frequency_mass)
        .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        .then(b.occurrences.cmp(&a.occurrences))
        .then(a.mains.cmp(&b.mains))
        .then(a.bonus.cmp(&b.bonus))
}

/// Liste d'achat : meilleures grilles observées, diversifiées, complétée au besoin par
/// des grilles formées des numéros les plus fréquents.
pub fn build_buy_list(
    spec: &GameSpec,
    simulation: &Simulation,
    pools: &Pools,
    band: SumBand,
    size: usize,
) -> BuyList {
    let k = spec.main_pick;
    let stats = &simulation.stats;
    let mass = |mains: &[u8]| -> usize {
        mains.iter().map(|n| stats.number_frequency.get(n).copied().unwrap_or(0)).sum()
    };
    let make = |key: &TicketKey, occurrences: usize, from_frequency: bool| BuyTicket {
        mains: key.mains.clone(),
        bonus: key.bonus,
        occurrences,
        frequency_mass: mass(&key.mains),
        score: ticket_heuristic(&key.mains, pools, band),
        from_frequency,
    };

    let mut candidates: Vec<BuyTicket> = simulation
        .ticket_counts
        .iter()
        .map(|(key, &count)| make(key, count, false))
        .collect();
    candidates.sort_by(compare);

    let mut chosen: Vec<BuyTicket> = Vec::with_capacity(size);
    for candidate in &candidates {
        if chosen.len() >= size {
            break;
        }
        if !too_close(&candidate.mains, &chosen, k) {
            chosen.push(candidate.clone());
        }
    }

    if chosen.len() < size {
        log::debug!("Liste d'achat : {} grilles diversifiées sur {}, complément par fréquences", chosen.len(), size);
        let mut ranked: Vec<u8> = stats.ranked_numbers().into_iter().map(|(n, _)| n).collect();
        ranked.extend((1..=spec.main_max).filter(|n| !stats.number_frequency.contains_key(n)));

        let mut bonus_ranked: Vec<u8> = stats.ranked_bonus().into_iter().map(|(b, _)| b).collect();
        if let Some(max) = spec.bonus_max {
            bonus_ranked.extend((1..=max).filter(|b| !stats.bonus_frequency.contains_key(b)));
        }

        // Tranches alignées d'abord, puis décalées.
        let mut slot = 0;
        'fill: for offset in 0..k {
            for group in ranked[offset.min(ranked.len())..].chunks_exact(k) {
                if chosen.len() >= size {
                    break 'fill;
                }
                let mut mains = group.to_vec();
                mains.sort_unstable();
                if too_close(&mains, &chosen, k) {
                    continue;
                }
                let bonus = spec.bonus_max.and_then(|_| bonus_ranked.get(slot % bonus_ranked.len().max(1)).copied());
                slot += 1;
                let key = TicketKey { mains, bonus };
                let occurrences = simulation.ticket_counts.get(&key).copied().unwrap_or(0);
                chosen.push(make(&key, occurrences, true));
            }
        }
    }

    // Dernier recours : meilleures grilles restantes sans contrainte de diversité.
    if chosen.len() < size {
        for candidate in &candidates {
            if chosen.len() >= size {
                break;
            }
            if !chosen.iter().any(|t| t.mains == candidate.mains && t.bonus == candidate.bonus) {
                chosen.push(candidate.clone());
            }
        }
    }

    BuyList { tickets: chosen }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::history::{FeedHints, HistoryWindow};
    use crate::phases::aggregate::AggregateStats;
    use crate::pools::build_pools;
    use lotopt_db::models::Game;

    fn simulation(tickets: &[(&[u8], Option<u8>, usize)]) -> Simulation {
        let mut number_frequency = BTreeMap::new();
        let mut bonus_frequency = BTreeMap::new();
        let mut ticket_counts = BTreeMap::new();
        for (mains, bonus, count) in tickets {
            for &n in mains.iter() {
                *number_frequency.entry(n).or_insert(0) += count;
            }
            if let Some(b) = bonus {
                *bonus_frequency.entry(*b).or_insert(0) += count;
            }
            ticket_counts.insert(TicketKey { mains: mains.to_vec(), bonus: *bonus }, *count);
        }
        let stats = AggregateStats {
            runs: 1,
            tickets: tickets.iter().map(|t| t.2).sum(),
            tiers: Vec::new(),
            number_frequency,
            bonus_frequency,
            unique_tickets: ticket_counts.len(),
            most_common_repeat: ticket_counts.values().copied().max().unwrap_or(0),
            notes: Default::default(),
        };
        Simulation { stats, ticket_counts }
    }

    fn empty_pools(game: Game) -> Pools {
        build_pools(&game.spec(), &HistoryWindow::new(20), &FeedHints::default())
    }

    #[test]
    fn test_ranked_by_frequency_mass_with_diversity() {
        let game = Game::MegaMillions;
        let sim = simulation(&[
            (&[1, 2, 3, 4, 5], Some(1), 3),
            (&[1, 2, 3, 4, 6], Some(2), 2),
            (&[10, 20, 30, 40, 50], Some(3), 1),
            (&[11, 21, 31, 41, 51], Some(4), 1),
        ]);
        let list = build_buy_list(&game.spec(), &sim, &empty_pools(game), SumBand::default_for(game), 3);
        assert_eq!(list.len(), 3);
        // [1,2,3,4,5] a la plus grosse masse ; [1,2,3,4,6] en partage 4 = k−1 et est rejetée
        assert_eq!(list.tickets[0].mains, vec![1, 2, 3, 4, 5]);
        assert_eq!(list.tickets[0].occurrences, 3);
        assert!(list.tickets.iter().all(|t| t.mains != vec![1, 2, 3, 4, 6]));
        assert!(list.tickets.iter().all(|t| !t.from_frequency));
    }

    #[test]
    fn test_pairwise_overlap_below_k_minus_one() {
        let game = Game::IllinoisLotto;
        let sim = simulation(&[
            (&[1, 2, 3, 4, 5, 6], None, 5),
            (&[1, 2, 3, 4, 5, 7], None, 4),
            (&[1, 2, 3, 4, 8, 9], None, 3),
            (&[1, 2, 3, 10, 11, 12], None, 2),
        ]);
        let list = build_buy_list(&game.spec(), &sim, &empty_pools(game), SumBand::default_for(game), 15);
        assert_eq!(list.len(), 15);
        for (i, a) in list.tickets.iter().enumerate() {
            assert_eq!(a.mains.len(), 6);
            assert_eq!(a.bonus, None);
            for b in &list.tickets[i + 1..] {
                assert!(shared(&a.mains, &b.mains) < 5, "{:?} / {:?}", a.mains, b.mains);
            }
        }
    }

    #[test]
    fn test_shortfall_filled_from_frequency_ranking() {
        let game = Game::Powerball;
        let sim = simulation(&[(&[5, 15, 25, 35, 45], Some(7), 10)]);
        let list = build_buy_list(&game.spec(), &sim, &empty_pools(game), SumBand::default_for(game), 10);
        assert_eq!(list.len(), 10);
        assert_eq!(list.tickets[0].mains, vec![5, 15, 25, 35, 45]);
        // la tranche alignée des 5 numéros les plus fréquents est la grille observée, rejetée
        let filler = &list.tickets[1];
        assert!(filler.from_frequency);
        assert_eq!(filler.mains, vec![1, 2, 3, 4, 6]);
        assert!(list.tickets.iter().all(|t| t.bonus.is_some()));
    }

    #[test]
    fn test_empty_simulation_still_fills() {
        let game = Game::MegaMillions;
        let sim = simulation(&[]);
        let list = build_buy_list(&game.spec(), &sim, &empty_pools(game), SumBand::default_for(game), 10);
        assert_eq!(list.len(), 10);
        assert_eq!(list.tickets[0].mains, vec![1, 2, 3, 4, 5]);
        assert_eq!(list.tickets[0].bonus, Some(1));
        assert_eq!(list.tickets[1].bonus, Some(2));
    }
}
