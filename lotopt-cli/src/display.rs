use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use crate::import::ImportResult;
use lotopt_db::models::{Game, StoredDraw};
use lotopt_engine::generator::TicketSource;
use lotopt_engine::phases::aggregate::AggregateStats;
use lotopt_engine::phases::buylist::BuyList;
use lotopt_engine::phases::state::StateToken;
use lotopt_engine::phases::{Phase1Report, Phase2Report, Phase3Report};
use lotopt_engine::pools::Pools;
use lotopt_engine::scorer::{HitSummary, ScoreBucket};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn bonus_text(bonus: Option<u8>) -> String {
    bonus.map(|b| format!("{:2}", b)).unwrap_or_else(|| "—".to_string())
}

fn pool_text(set: &std::collections::BTreeSet<u8>) -> String {
    if set.is_empty() {
        return "—".to_string();
    }
    set.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ")
}

pub fn display_draws(draws: &[StoredDraw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Date", "Jeu", "Tirage", "Boules", "Bonus", "Somme"]);
    for stored in draws {
        table.add_row(vec![
            stored.date.format("%Y-%m-%d").to_string(),
            stored.game.to_string(),
            stored.tier.to_string(),
            join_numbers(&stored.draw.mains),
            bonus_text(stored.draw.bonus),
            stored.draw.sum().to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    for game in Game::ALL {
        if let Some(n) = result.by_game.get(&game) {
            println!("    {:<14}  : {}", game.name(), n);
        }
    }
    println!("  Doublons ignorés  : {}", result.duplicates);
    println!("  Lignes écartées   : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

fn display_pools(pools: &Pools) {
    println!("  Chauds     : {}", pool_text(&pools.hot));
    println!("  En retard  : {}", pool_text(&pools.overdue));
    println!("  VIP        : {}", pool_text(&pools.vip));
    println!("  LRR        : {}", pool_text(&pools.lrr));
    println!("  Non sortis : {} numéros", pools.undrawn.len());
}

fn display_hits(label: &str, summary: &HitSummary) {
    if summary.total() == 0 {
        println!("  {label} : aucun gain (3 boules ou plus)");
        return;
    }
    let mut table = new_table(vec!["Rang", "Grilles", "Lignes"]);
    for bucket in ScoreBucket::ALL {
        let count = summary.count(bucket);
        if count == 0 {
            continue;
        }
        let rows = summary
            .positions
            .get(&bucket)
            .map(|p| p.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(bucket.label()).fg(Color::Green),
            Cell::new(count),
            Cell::new(rows),
        ]);
    }
    println!("  {label} :");
    println!("{table}");
}

pub fn display_phase1(report: &Phase1Report) {
    for game in &report.games {
        println!("\n── {} ── fourchette de somme {}", game.game.name(), game.band);
        display_pools(&game.pools);
        let notes = &game.batch.notes;
        if notes.skipped_patterns + notes.out_of_band + notes.padded > 0 {
            println!(
                "  Notes : {} motifs sans ancre, {} grilles hors fourchette, {} grilles complétées",
                notes.skipped_patterns, notes.out_of_band, notes.padded
            );
        }

        let mut table = new_table(vec!["#", "Boules", "Bonus", "Somme", "Motif"]);
        for (i, ticket) in game.batch.tickets.iter().enumerate() {
            let source = match &ticket.source {
                TicketSource::Pattern { pattern, anchor } => {
                    format!("{} (ancre {})", pattern, anchor)
                }
                TicketSource::Padding => "aléatoire".to_string(),
            };
            let sum = if game.band.contains(ticket.sum) {
                Cell::new(ticket.sum)
            } else {
                Cell::new(ticket.sum).fg(Color::Red)
            };
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(join_numbers(&ticket.mains)),
                Cell::new(bonus_text(ticket.bonus)),
                sum,
                Cell::new(source),
            ]);
        }
        println!("{table}");

        for hits in &game.hits {
            let label = format!("{} {} ({} + {})", game.game, hits.tier, join_numbers(&hits.target.mains), bonus_text(hits.target.bonus));
            display_hits(&label, &hits.summary);
        }
    }
    println!("\nJeton de phase 1 : {}", report.token);
}

fn display_stats(stats: &AggregateStats) {
    println!(
        "  {} lots, {} grilles, {} distinctes (max {} répétitions)",
        stats.runs, stats.tickets, stats.unique_tickets, stats.most_common_repeat
    );
    let top: Vec<String> = stats
        .ranked_numbers()
        .into_iter()
        .take(10)
        .map(|(n, c)| format!("{}×{}", n, c))
        .collect();
    println!("  Numéros les plus tirés : {}", top.join("  "));

    for tally in &stats.tiers {
        let parts: Vec<String> = ScoreBucket::ALL
            .iter()
            .filter(|b| tally.count(**b) > 0)
            .map(|b| format!("{}: {}", b, tally.count(*b)))
            .collect();
        let text = if parts.is_empty() { "aucun gain".to_string() } else { parts.join(", ") };
        println!("  Contre {} : {}", tally.tier, text);
    }
}

fn display_buy_list(list: &BuyList) {
    let mut table = new_table(vec!["#", "Boules", "Bonus", "Apparitions", "Masse", "Score"]);
    for (i, ticket) in list.tickets.iter().enumerate() {
        let occurrences = if ticket.from_frequency {
            Cell::new(format!("{} (fréq.)", ticket.occurrences)).fg(Color::Yellow)
        } else {
            Cell::new(ticket.occurrences)
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(join_numbers(&ticket.mains)),
            Cell::new(bonus_text(ticket.bonus)),
            occurrences,
            Cell::new(ticket.frequency_mass),
            Cell::new(format!("{:.2}", ticket.score)),
        ]);
    }
    println!("{table}");
}

pub fn display_phase2(report: &Phase2Report) {
    for game in &report.games {
        println!("\n── {} ── fourchette recalculée {}", game.game.name(), game.band);
        display_pools(&game.pools);
        display_stats(&game.stats);
        println!("\n  Liste d'achat :");
        display_buy_list(&game.buy_list);
    }
    println!("\nGraine : {}", report.seed);
    println!("Jeton de phase 2 : {} (depuis {})", report.token, report.source);
}

pub fn display_phase3(report: &Phase3Report) {
    for game in &report.games {
        println!("\n── {} ──", game.game.name());
        for tier in &game.tiers {
            println!(
                "  Tirage {} : {} + {}",
                tier.tier, join_numbers(&tier.target.mains), bonus_text(tier.target.bonus)
            );
            let mut table = new_table(vec!["#", "Boules", "Bonus", "Trouvées", "Rang"]);
            for row in &tier.rows {
                let bonus = if row.bonus_hit {
                    Cell::new(bonus_text(row.bonus)).fg(Color::Green)
                } else {
                    Cell::new(bonus_text(row.bonus))
                };
                let rank = match row.bucket {
                    Some(b) => Cell::new(b.label()).fg(Color::Green),
                    None => Cell::new("—"),
                };
                table.add_row(vec![
                    Cell::new(row.row),
                    Cell::new(join_numbers(&row.mains)),
                    bonus,
                    Cell::new(if row.matched.is_empty() { "—".to_string() } else { join_numbers(&row.matched) }),
                    rank,
                ]);
            }
            println!("{table}");
            display_hits(&format!("Bilan {}", tier.tier), &tier.summary);
        }
    }
}

pub fn display_recent(tokens: &[StateToken]) {
    if tokens.is_empty() {
        println!("Aucun état enregistré.");
        return;
    }
    let mut table = new_table(vec!["Jeton", "Phase"]);
    for token in tokens {
        let phase = token.kind().map(|k| k.number().to_string()).unwrap_or_else(|| "?".to_string());
        table.add_row(vec![token.to_string(), phase]);
    }
    println!("{table}");
}
