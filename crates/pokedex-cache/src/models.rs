use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cached catalog entry. Keyed by display name - there is exactly one row per name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonRow {
    pub name: String,
    pub image_url: String,
    pub number: i64,
    pub is_favorite: bool,
    /// Full detail payload as fetched from the API, if we have it
    pub detail: Option<serde_json::Value>,
    pub types: Vec<String>,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub special_attack: i64,
    pub special_defense: i64,
    pub speed: i64,
    pub cached_at: DateTime<Utc>,
}

impl PokemonRow {
    /// Bare row with no detail and zeroed stats
    pub fn new(name: impl Into<String>, number: i64) -> Self {
        Self {
            name: name.into(),
            image_url: String::new(),
            number,
            is_favorite: false,
            detail: None,
            types: Vec::new(),
            hp: 0,
            attack: 0,
            defense: 0,
            special_attack: 0,
            special_defense: 0,
            speed: 0,
            cached_at: Utc::now(),
        }
    }
}

/// Page-continuation record: where in the remote index the pages before and
/// after this item's page start, as item offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKey {
    pub name: String,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRow {
    pub name: String,
    pub url: String,
}
