use pokedex_api::{FlavorTextEntry, MoveDetail};
use std::sync::Arc;

use crate::repository::PokemonRepository;
use crate::resource::Resource;

/// First English flavor text, on one line.
///
/// PokeAPI text keeps the games' hard line breaks and form feeds.
pub fn english_flavor_text(entries: &[FlavorTextEntry]) -> Option<String> {
    entries
        .iter()
        .find(|entry| entry.language.name == "en")
        .map(|entry| entry.flavor_text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// `"thunder-punch"` → `"Thunder Punch"`
pub fn format_move_name(name: &str) -> String {
    name.split('-')
        .filter(|part| !part.is_empty())
        .map(crate::models::format_name)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Power/accuracy/PP cell; status moves have no power
pub fn stat_or_dash(value: Option<i64>) -> String {
    value.map_or_else(|| "--".to_string(), |v| v.to_string())
}

pub struct MoveDetailController {
    repository: Arc<PokemonRepository>,
    info: Resource<MoveDetail>,
}

impl MoveDetailController {
    pub fn new(repository: Arc<PokemonRepository>) -> Self {
        Self {
            repository,
            info: Resource::default(),
        }
    }

    pub fn info(&self) -> &Resource<MoveDetail> {
        &self.info
    }

    pub async fn load(&mut self, name: &str) -> &Resource<MoveDetail> {
        self.info = Resource::Loading(None);
        self.info = self.repository.move_info(name).await;
        &self.info
    }

    pub fn description(&self) -> Option<String> {
        self.info
            .data()
            .and_then(|m| english_flavor_text(&m.flavor_text_entries))
    }
}
