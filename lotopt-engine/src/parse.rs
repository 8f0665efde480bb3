//! Décodage des saisies texte : dernier tirage, historique collé, flux chaud/retard.
//! Toute la tolérance de format est concentrée ici ; le reste du moteur ne voit que des
//! valeurs typées.

use lotopt_db::models::{Draw, GameSpec};

use crate::error::{EngineError, Result};
use crate::history::{FeedHints, HistoryWindow};

/// Suites de chiffres d'un texte, dans l'ordre.
fn grab_ints(text: &str) -> Vec<u32> {
    let mut out = Vec::new();
    let mut current: Option<u32> = None;
    for c in text.chars() {
        match c.to_digit(10) {
            Some(d) => {
                current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(d));
            }
            None => {
                if let Some(n) = current.take() {
                    out.push(n);
                }
            }
        }
    }
    if let Some(n) = current {
        out.push(n);
    }
    out
}

fn to_u8(field: &str, n: u32) -> Result<u8> {
    u8::try_from(n).map_err(|_| EngineError::parse(field, format!("nombre {} hors limites", n)))
}

/// Sépare le texte en (boules, reste) selon la présence de crochets ou parenthèses.
fn split_bracketed<'a>(field: &str, text: &'a str) -> Result<Option<(&'a str, &'a str)>> {
    let (open, close) = if text.contains('[') {
        ('[', ']')
    } else if text.starts_with('(') {
        ('(', ')')
    } else {
        return Ok(None);
    };
    let start = text.find(open).map(|i| i + 1).unwrap_or(0);
    let end = text[start..]
        .find(close)
        .map(|i| start + i)
        .ok_or_else(|| EngineError::parse(field, format!("'{}' non fermé", open)))?;
    Ok(Some((&text[start..end], &text[end + 1..])))
}

/// Décode un tirage saisi sous l'une des formes acceptées :
/// `[n1,…,nk]`, `[n1,…,nk], b`, `(n1,…,nk), b`, `([n1,…,nk], b)`, `([…], None)`,
/// `[n1,…,nk,b]`, `(n1,…,nk,b)`
/// ou une simple liste séparée par espaces, virgules ou tirets.
pub fn parse_draw(field: &str, text: &str, spec: &GameSpec) -> Result<Draw> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngineError::parse(field, "valeur vide"));
    }

    let (mains, rest): (Vec<u32>, Vec<u32>) = match split_bracketed(field, text)? {
        Some((inner, rest)) => {
            let mut mains = grab_ints(inner);
            let mut rest = grab_ints(rest);
            // `[n1,…,nk,b]` : bonus placé dans la liste.
            if spec.bonus_max.is_some() && rest.is_empty() && mains.len() == spec.main_pick + 1 {
                rest = mains.split_off(spec.main_pick);
            }
            (mains, rest)
        }
        None => {
            let ints = grab_ints(text);
            if ints.len() < spec.main_pick {
                return Err(EngineError::parse(
                    field,
                    format!("attendu {} boules, reçu {}", spec.main_pick, ints.len()),
                ));
            }
            let (mains, rest) = ints.split_at(spec.main_pick);
            (mains.to_vec(), rest.to_vec())
        }
    };

    let bonus = match rest.as_slice() {
        [] => None,
        [b] => Some(to_u8(field, *b)?),
        _ => {
            return Err(EngineError::parse(
                field,
                format!("{} nombres inattendus après les boules", rest.len()),
            ))
        }
    };
    let mains = mains
        .into_iter()
        .map(|n| to_u8(field, n))
        .collect::<Result<Vec<u8>>>()?;

    Draw::new(spec, mains, bonus).map_err(|e| EngineError::parse(field, e))
}

/// Une ligne d'historique : `[date] n1-n2-…-nk [bonus]`.
fn parse_history_line(line: &str, spec: &GameSpec) -> Option<Draw> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let idx = tokens.iter().position(|tok| {
        let parts: Vec<&str> = tok.split(['-', ',']).filter(|p| !p.is_empty()).collect();
        parts.len() == spec.main_pick && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
    })?;

    let mains: Vec<u8> = tokens[idx]
        .split(['-', ','])
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;

    let bonus = match spec.bonus_max {
        Some(_) => tokens.get(idx + 1).and_then(|tok| tok.parse::<u8>().ok()),
        None => None,
    };

    Draw::new(spec, mains, bonus).ok()
}

/// Décode un historique collé, lignes du plus ancien au plus récent.
/// Les lignes mal formées sont ignorées. Seuls les `cap` tirages les plus récents sont gardés.
pub fn parse_history_blob(text: &str, spec: &GameSpec, cap: usize) -> HistoryWindow {
    let mut draws = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_history_line(line, spec) {
            Some(draw) => draws.push(draw),
            None => log::debug!("Ligne d'historique {} ignorée : '{}'", i + 1, line),
        }
    }
    draws.reverse();
    HistoryWindow::from_newest(draws, cap)
}

/// Format inverse de `parse_history_blob` (plus ancien d'abord).
pub fn format_history_blob(window: &HistoryWindow) -> String {
    let mut out = String::new();
    for draw in window.draws().iter().rev() {
        let mains = draw.mains
            .iter()
            .map(|n| format!("{:02}", n))
            .collect::<Vec<_>>()
            .join("-");
        out.push_str(&mains);
        if let Some(b) = draw.bonus {
            out.push_str(&format!(" {:02}", b));
        }
        out.push('\n');
    }
    out
}

/// Décode le flux "Top 8 hot numbers: …" / "Top 3 overdue Mega Ball numbers: …".
/// Seuls les nombres après les deux-points sont lus.
pub fn parse_feed(text: &str) -> FeedHints {
    let mut feed = FeedHints::default();
    for line in text.lines() {
        let Some((head, values)) = line.split_once(':') else {
            continue;
        };
        let head = head.to_lowercase();
        let numbers: Vec<u8> = grab_ints(values)
            .into_iter()
            .filter_map(|n| u8::try_from(n).ok())
            .collect();

        let is_bonus = head.contains("ball") || head.contains("bonus");
        let target = match (is_bonus, head.contains("hot"), head.contains("overdue")) {
            (false, true, false) => &mut feed.hot,
            (false, false, true) => &mut feed.overdue,
            (true, true, false) => &mut feed.bonus_hot,
            (true, false, true) => &mut feed.bonus_overdue,
            _ => {
                log::debug!("Ligne de flux ignorée : '{}'", line.trim());
                continue;
            }
        };
        *target = numbers;
    }
    feed
}
