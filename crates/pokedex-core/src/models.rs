use pokedex_api::{Pokemon, PokemonAbility};
use pokedex_cache::PokemonRow;
use serde::{Deserialize, Serialize};

/// Highest base stat in the games (Blissey's HP) - used to scale stat bars
pub const MAX_BASE_STAT: i64 = 255;

/// A catalog entry as the list and detail screens see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonEntry {
    pub name: String,
    pub image_url: String,
    pub number: i64,
    pub is_favorite: bool,
    pub detail: Option<Pokemon>,
    pub types: Vec<String>,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub special_attack: i64,
    pub special_defense: i64,
    pub speed: i64,
}

impl TryFrom<PokemonRow> for PokemonEntry {
    type Error = crate::Error;

    fn try_from(row: PokemonRow) -> crate::Result<Self> {
        let detail = row.detail.map(serde_json::from_value).transpose()?;
        Ok(Self {
            name: row.name,
            image_url: row.image_url,
            number: row.number,
            is_favorite: row.is_favorite,
            detail,
            types: row.types,
            hp: row.hp,
            attack: row.attack,
            defense: row.defense,
            special_attack: row.special_attack,
            special_defense: row.special_defense,
            speed: row.speed,
        })
    }
}

/// Build the cache row for a freshly fetched detail payload
pub fn row_from_detail(detail: &Pokemon, is_favorite: bool) -> crate::Result<PokemonRow> {
    let stat = |name: &str| detail.base_stat(name).unwrap_or(0);

    let mut row = PokemonRow::new(format_name(&detail.name), detail.id);
    row.image_url = detail.sprites.front_default.clone().unwrap_or_default();
    row.is_favorite = is_favorite;
    row.detail = Some(serde_json::to_value(detail)?);
    row.types = detail.type_names();
    row.hp = stat("hp");
    row.attack = stat("attack");
    row.defense = stat("defense");
    row.special_attack = stat("special-attack");
    row.special_defense = stat("special-defense");
    row.speed = stat("speed");
    Ok(row)
}

/// API slugs are lower-case ("bulbasaur"); the catalog shows and keys them capitalised ("Bulbasaur")
pub fn format_name(name: &str) -> String {
    let name = name.trim();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Short label for a stat name, empty for stats we don't display
pub fn stat_abbreviation(stat_name: &str) -> &'static str {
    match stat_name.to_lowercase().as_str() {
        "hp" => "HP",
        "attack" => "Atk",
        "defense" => "Def",
        "special-attack" => "SpAtk",
        "special-defense" => "SpDef",
        "speed" => "Spd",
        _ => "",
    }
}

/// `"Overgrow"`, `"Chlorophyll (Hidden)"`
pub fn format_ability(ability: &PokemonAbility) -> String {
    let name = format_name(&ability.ability.name);
    if ability.is_hidden {
        format!("{} (Hidden)", name)
    } else {
        name
    }
}

/// One row of the stats panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLine {
    pub abbreviation: &'static str,
    pub value: i64,
    pub max: i64,
}

pub fn stat_lines(pokemon: &Pokemon) -> Vec<StatLine> {
    pokemon
        .stats
        .iter()
        .map(|s| StatLine {
            abbreviation: stat_abbreviation(&s.stat.name),
            value: s.base_stat,
            max: MAX_BASE_STAT,
        })
        .collect()
}
