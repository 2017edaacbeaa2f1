// Remote data seam - bridges the API client with the rest of core
use async_trait::async_trait;
use pokedex_api::{
    EvolutionChain, MoveDetail, NamedResourceList, PokeApiClient, Pokemon, PokemonSpecies,
};

use crate::Result;

/// Everything core needs from the remote catalog.
///
/// The real implementation talks to PokeAPI; tests swap in mocks or a
/// scripted fake so paging behaviour can be checked without a network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PokemonSource: Send + Sync {
    async fn pokemon_list(&self, limit: u32, offset: u32) -> Result<NamedResourceList>;
    async fn pokemon(&self, name: &str) -> Result<Pokemon>;
    async fn pokemon_species(&self, name: &str) -> Result<PokemonSpecies>;
    async fn evolution_chain(&self, url: &str) -> Result<EvolutionChain>;
    async fn move_list(&self, limit: u32, offset: u32) -> Result<NamedResourceList>;
    async fn move_detail(&self, name: &str) -> Result<MoveDetail>;
}

/// Wrapper around PokeApiClient that implements PokemonSource
pub struct PokeApiSource {
    client: PokeApiClient,
}

impl PokeApiSource {
    pub fn new(client: PokeApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PokemonSource for PokeApiSource {
    async fn pokemon_list(&self, limit: u32, offset: u32) -> Result<NamedResourceList> {
        Ok(self.client.pokemon_list(limit, offset).await?)
    }

    async fn pokemon(&self, name: &str) -> Result<Pokemon> {
        Ok(self.client.pokemon(name).await?)
    }

    async fn pokemon_species(&self, name: &str) -> Result<PokemonSpecies> {
        Ok(self.client.pokemon_species(name).await?)
    }

    async fn evolution_chain(&self, url: &str) -> Result<EvolutionChain> {
        Ok(self.client.evolution_chain(url).await?)
    }

    async fn move_list(&self, limit: u32, offset: u32) -> Result<NamedResourceList> {
        Ok(self.client.move_list(limit, offset).await?)
    }

    async fn move_detail(&self, name: &str) -> Result<MoveDetail> {
        Ok(self.client.move_detail(name).await?)
    }
}
