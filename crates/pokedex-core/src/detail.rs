// Detail screen state for a single Pokémon
use futures::StreamExt;
use pokedex_api::{Chain, Pokemon};
use std::sync::Arc;
use tracing::debug;

use crate::models::{format_ability, format_name, stat_lines, StatLine};
use crate::repository::PokemonRepository;
use crate::resource::Resource;
use crate::Result;

/// Walk an evolution tree along its first branch: Bulbasaur → Ivysaur → Venusaur.
///
/// Branching lines (Eevee) only show their first evolution.
pub fn flatten_evolution_chain(chain: &Chain) -> Vec<Chain> {
    let mut stages = Vec::new();
    let mut current = Some(chain);
    while let Some(stage) = current {
        stages.push(stage.clone());
        current = stage.evolves_to.first();
    }
    stages
}

pub struct DetailController {
    repository: Arc<PokemonRepository>,
    name: Option<String>,
    info: Resource<Pokemon>,
    evolution_chain: Resource<Vec<Chain>>,
    is_favorite: Option<bool>,
}

impl DetailController {
    pub fn new(repository: Arc<PokemonRepository>) -> Self {
        Self {
            repository,
            name: None,
            info: Resource::default(),
            evolution_chain: Resource::default(),
            is_favorite: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn info(&self) -> &Resource<Pokemon> {
        &self.info
    }

    pub fn evolution_chain(&self) -> &Resource<Vec<Chain>> {
        &self.evolution_chain
    }

    /// `None` until the entry is known to be cached
    pub fn is_favorite(&self) -> Option<bool> {
        self.is_favorite
    }

    /// Load everything the detail view shows.
    ///
    /// The evolution chain is fetched as soon as any detail is available,
    /// cached or fresh, and only once per load.
    pub async fn load(&mut self, name: &str) -> Result<()> {
        let name = format_name(name);
        self.name = Some(name.clone());
        self.info = Resource::default();
        self.evolution_chain = Resource::default();
        self.refresh_favorite()?;

        let mut updates = self.repository.pokemon_info(&name);
        while let Some(update) = updates.next().await {
            let species = update.data().map(|p| p.name.clone());
            self.info = update;

            // A dex number resolves to the row's real name
            if let Some(species) = &species {
                self.name = Some(format_name(species));
            }

            if let Some(species) = species {
                if !self.evolution_chain.is_success() {
                    self.load_evolution_chain(&species).await;
                }
            }
        }

        // The detail fetch may have created the row
        self.refresh_favorite()?;
        Ok(())
    }

    async fn load_evolution_chain(&mut self, species: &str) {
        self.evolution_chain = Resource::Loading(None);
        self.evolution_chain = match self.repository.pokemon_species(species).await {
            Resource::Success(species) => match species.evolution_chain {
                Some(link) => self
                    .repository
                    .evolution_chain(&link.url)
                    .await
                    .map(|chain| flatten_evolution_chain(&chain.chain)),
                None => Resource::error("No evolution chain URL found."),
            },
            Resource::Error { message, .. } => Resource::error(message),
            Resource::Loading(_) => return,
        };
        debug!(
            "Evolution chain for {}: {}",
            species,
            if self.evolution_chain.is_success() {
                "loaded"
            } else {
                "failed"
            }
        );
    }

    pub fn refresh_favorite(&mut self) -> Result<()> {
        if let Some(name) = &self.name {
            self.is_favorite = self
                .repository
                .pokemon_from_db(name)?
                .map(|entry| entry.is_favorite);
        }
        Ok(())
    }

    /// Flip the favorite mark. Does nothing while the current state is unknown.
    pub fn toggle_favorite(&mut self) -> Result<Option<bool>> {
        let (Some(name), Some(current)) = (&self.name, self.is_favorite) else {
            return Ok(None);
        };
        self.repository.set_favorite(name, !current)?;
        self.refresh_favorite()?;
        Ok(self.is_favorite)
    }

    /// `["Overgrow", "Chlorophyll (Hidden)"]`
    pub fn abilities(&self) -> Vec<String> {
        self.info
            .data()
            .map(|p| p.abilities.iter().map(format_ability).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Vec<StatLine> {
        self.info.data().map(stat_lines).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediator::PagingConfig;
    use crate::models::{fixtures, row_from_detail};
    use crate::source::MockPokemonSource;
    use pokedex_api::{ApiResource, EvolutionChain, NamedResource, PokeApiError, PokemonSpecies};
    use pokedex_cache::CacheManager;

    fn stage(name: &str, evolves_to: Vec<Chain>) -> Chain {
        Chain {
            species: NamedResource {
                name: name.to_string(),
                url: String::new(),
            },
            is_baby: false,
            evolves_to,
            evolution_details: Vec::new(),
        }
    }

    fn species(name: &str, chain_url: Option<&str>) -> PokemonSpecies {
        PokemonSpecies {
            id: 1,
            name: name.to_string(),
            evolution_chain: chain_url.map(|url| ApiResource {
                url: url.to_string(),
            }),
            flavor_text_entries: Vec::new(),
        }
    }

    fn controller(source: MockPokemonSource, cached: bool) -> DetailController {
        let cache = Arc::new(CacheManager::in_memory().unwrap());
        if cached {
            let row = row_from_detail(&fixtures::pokemon("bulbasaur", 1), false).unwrap();
            cache.insert_pokemon(&[row]).unwrap();
        }
        let repository = PokemonRepository::new(Arc::new(source), cache, PagingConfig::default());
        DetailController::new(Arc::new(repository))
    }

    #[test]
    fn test_flatten_follows_first_branch() {
        let eevee = stage(
            "eevee",
            vec![stage("vaporeon", vec![]), stage("jolteon", vec![])],
        );
        let names: Vec<String> = flatten_evolution_chain(&eevee)
            .into_iter()
            .map(|c| c.species.name)
            .collect();
        assert_eq!(names, vec!["eevee", "vaporeon"]);

        let line = stage(
            "bulbasaur",
            vec![stage("ivysaur", vec![stage("venusaur", vec![])])],
        );
        assert_eq!(flatten_evolution_chain(&line).len(), 3);
    }

    #[tokio::test]
    async fn test_load_fills_info_chain_and_favorite() {
        let mut source = MockPokemonSource::new();
        source
            .expect_pokemon()
            .returning(|name| Ok(fixtures::pokemon(name, 1)));
        source
            .expect_pokemon_species()
            .times(1)
            .returning(|name| Ok(species(name, Some("https://pokeapi.co/api/v2/evolution-chain/1/"))));
        source.expect_evolution_chain().times(1).returning(|_| {
            Ok(EvolutionChain {
                id: 1,
                chain: stage(
                    "bulbasaur",
                    vec![stage("ivysaur", vec![stage("venusaur", vec![])])],
                ),
            })
        });
        let mut detail = controller(source, true);

        detail.load("bulbasaur").await.unwrap();

        assert_eq!(detail.name(), Some("Bulbasaur"));
        assert!(detail.info().is_success());
        assert_eq!(detail.evolution_chain().data().map(Vec::len), Some(3));
        assert_eq!(detail.is_favorite(), Some(false));
        assert_eq!(detail.abilities(), vec!["Overgrow", "Chlorophyll (Hidden)"]);
        assert_eq!(detail.stats().len(), 6);
    }

    #[tokio::test]
    async fn test_missing_chain_url() {
        let mut source = MockPokemonSource::new();
        source
            .expect_pokemon()
            .returning(|name| Ok(fixtures::pokemon(name, 1)));
        source
            .expect_pokemon_species()
            .returning(|name| Ok(species(name, None)));
        let mut detail = controller(source, true);

        detail.load("bulbasaur").await.unwrap();
        assert_eq!(
            detail.evolution_chain().message(),
            Some("No evolution chain URL found.")
        );
    }

    #[tokio::test]
    async fn test_offline_with_nothing_cached() {
        let mut source = MockPokemonSource::new();
        source
            .expect_pokemon()
            .returning(|_| Err(PokeApiError::RateLimitExceeded.into()));
        let mut detail = controller(source, false);

        detail.load("pikachu").await.unwrap();
        assert!(detail.info().message().unwrap().starts_with("Network error:"));
        assert!(detail.info().data().is_none());
        assert!(detail.evolution_chain().is_loading());

        // Unknown favorite state: toggling is a no-op
        assert_eq!(detail.toggle_favorite().unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_by_dex_number_tracks_real_name() {
        let mut source = MockPokemonSource::new();
        source
            .expect_pokemon()
            .withf(|name| name == "25")
            .returning(|_| Ok(fixtures::pokemon("pikachu", 25)));
        source
            .expect_pokemon_species()
            .returning(|_| Err(PokeApiError::RateLimitExceeded.into()));
        let mut detail = controller(source, false);

        detail.load("25").await.unwrap();

        assert_eq!(detail.name(), Some("Pikachu"));
        assert_eq!(detail.is_favorite(), Some(false));
        assert_eq!(detail.toggle_favorite().unwrap(), Some(true));
        let stored = detail.repository.pokemon_from_db("pikachu").unwrap().unwrap();
        assert!(stored.is_favorite);
    }

    #[tokio::test]
    async fn test_toggle_favorite_twice_restores() {
        let mut source = MockPokemonSource::new();
        source
            .expect_pokemon()
            .returning(|name| Ok(fixtures::pokemon(name, 1)));
        source
            .expect_pokemon_species()
            .returning(|_| Err(PokeApiError::RateLimitExceeded.into()));
        let mut detail = controller(source, true);
        detail.load("Bulbasaur").await.unwrap();

        assert_eq!(detail.toggle_favorite().unwrap(), Some(true));
        assert_eq!(detail.toggle_favorite().unwrap(), Some(false));
        assert_eq!(
            detail.evolution_chain().message(),
            Some("An unknown error occurred.")
        );
    }
}
