// Plain-text rendering of list rows and detail views
use pokedex_core::moves::stat_or_dash;
use pokedex_core::{
    format_move_name, format_name, DetailController, MoveDetailController, PokemonEntry, Resource,
    StatLine,
};
use std::fmt::Write;

const BAR_WIDTH: usize = 20;

/// `#001 Bulbasaur     grass/poison     HP  45 Atk  49 Def  49 ★`
pub fn entry_line(entry: &PokemonEntry) -> String {
    let star = if entry.is_favorite { " ★" } else { "" };
    format!(
        "#{:03} {:<12} {:<16} HP {:>3} Atk {:>3} Def {:>3}{}",
        entry.number,
        entry.name,
        entry.types.join("/"),
        entry.hp,
        entry.attack,
        entry.defense,
        star
    )
}

/// `Atk   49 ████░░░░...` scaled against the highest base stat
pub fn stat_bar(stat: &StatLine) -> String {
    let filled = if stat.max > 0 {
        ((stat.value.clamp(0, stat.max) as usize) * BAR_WIDTH + stat.max as usize / 2)
            / stat.max as usize
    } else {
        0
    };
    format!(
        "{:<6}{:>4} {}{}",
        stat.abbreviation,
        stat.value,
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled)
    )
}

pub fn detail(detail: &DetailController) -> String {
    let mut out = String::new();

    if let Some(message) = detail.info().message() {
        let _ = writeln!(out, "Error: {}", message);
    }
    let Some(pokemon) = detail.info().data() else {
        return out;
    };

    let star = match detail.is_favorite() {
        Some(true) => " ★",
        _ => "",
    };
    let _ = writeln!(out, "#{:03} {}{}", pokemon.id, format_name(&pokemon.name), star);
    let _ = writeln!(out, "Type:      {}", pokemon.type_names().join(" / "));
    // PokeAPI reports decimetres and hectograms
    let _ = writeln!(
        out,
        "Height:    {:.1} m   Weight: {:.1} kg",
        pokemon.height as f64 / 10.0,
        pokemon.weight as f64 / 10.0
    );
    let _ = writeln!(out, "Abilities: {}", detail.abilities().join(", "));

    let _ = writeln!(out);
    for stat in detail.stats().iter().filter(|s| !s.abbreviation.is_empty()) {
        let _ = writeln!(out, "{}", stat_bar(stat));
    }

    let _ = writeln!(out);
    match detail.evolution_chain() {
        Resource::Success(stages) => {
            let names: Vec<String> = stages
                .iter()
                .map(|stage| format_name(&stage.species.name))
                .collect();
            let _ = writeln!(out, "Evolution: {}", names.join(" → "));
        }
        Resource::Error { message, .. } => {
            let _ = writeln!(out, "Evolution: {}", message);
        }
        Resource::Loading(_) => {}
    }

    out
}

pub fn move_detail(moves: &MoveDetailController) -> String {
    let mut out = String::new();
    match moves.info() {
        Resource::Success(detail) => {
            let _ = writeln!(
                out,
                "{} ({})",
                format_move_name(&detail.name),
                detail.kind.name.to_uppercase()
            );
            let _ = writeln!(
                out,
                "Power: {}   Accuracy: {}   PP: {}",
                stat_or_dash(detail.power),
                stat_or_dash(detail.accuracy),
                stat_or_dash(detail.pp)
            );
            if let Some(text) = moves.description() {
                let _ = writeln!(out, "\n{}", text);
            }
        }
        Resource::Error { message, .. } => {
            let _ = writeln!(out, "Error: {}", message);
        }
        Resource::Loading(_) => {}
    }
    out
}
