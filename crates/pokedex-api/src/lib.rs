// PokeAPI client and the response shapes it hands back
pub mod client;
pub mod models;
pub mod retry;

// Re-export common types
pub use client::{PokeApiClient, PokeApiError, Result, POKEAPI_BASE};
pub use models::{
    ApiResource, Chain, EvolutionChain, FlavorTextEntry, MoveDetail, NamedResource,
    NamedResourceList, Pokemon, PokemonAbility, PokemonMove, PokemonSpecies, PokemonStat,
    PokemonType, Sprites,
};
pub use retry::RetryConfig;
