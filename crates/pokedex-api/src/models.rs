// PokeAPI response shapes. Field names mirror the JSON so serde can do the work.
use serde::{Deserialize, Serialize};

/// A `{ name, url }` pair - PokeAPI's way of pointing at another resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// A bare `{ url }` pointer (used for the species -> evolution chain link)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResource {
    pub url: String,
}

/// One page of a paginated list endpoint (`/pokemon`, `/move`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedResourceList {
    pub count: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<NamedResource>,
}

/// Full detail payload for a single Pokémon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub base_experience: Option<i64>,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub types: Vec<PokemonType>,
    #[serde(default)]
    pub stats: Vec<PokemonStat>,
    #[serde(default)]
    pub abilities: Vec<PokemonAbility>,
    #[serde(default)]
    pub moves: Vec<PokemonMove>,
}

impl Pokemon {
    /// Base value of a stat by its API name (`"hp"`, `"special-attack"`, ...)
    pub fn base_stat(&self, name: &str) -> Option<i64> {
        self.stats
            .iter()
            .find(|s| s.stat.name == name)
            .map(|s| s.base_stat)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut types: Vec<&PokemonType> = self.types.iter().collect();
        types.sort_by_key(|t| t.slot);
        types.into_iter().map(|t| t.kind.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sprites {
    pub front_default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonType {
    pub slot: u32,
    #[serde(rename = "type")]
    pub kind: NamedResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonStat {
    pub base_stat: i64,
    #[serde(default)]
    pub effort: i64,
    pub stat: NamedResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonAbility {
    pub ability: NamedResource,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonMove {
    #[serde(rename = "move")]
    pub move_: NamedResource,
}

/// Species data - we mostly want it for the evolution chain URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonSpecies {
    pub id: i64,
    pub name: String,
    pub evolution_chain: Option<ApiResource>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionChain {
    pub id: i64,
    pub chain: Chain,
}

/// A node in the evolution tree. Branching species (Eevee) have several `evolves_to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub species: NamedResource,
    #[serde(default)]
    pub is_baby: bool,
    #[serde(default)]
    pub evolves_to: Vec<Chain>,
    #[serde(default)]
    pub evolution_details: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveDetail {
    pub id: i64,
    pub name: String,
    pub accuracy: Option<i64>,
    pub power: Option<i64>,
    pub pp: Option<i64>,
    #[serde(rename = "type")]
    pub kind: NamedResource,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorTextEntry {
    pub flavor_text: String,
    pub language: NamedResource,
}
