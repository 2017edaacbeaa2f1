use thiserror::Error;

/// All the ways things can go wrong in the Pokédex
///
/// We use thiserror here because it generates the boilerplate for us.
/// Life's too short to manually implement Display and Error traits.
#[derive(Error, Debug)]
pub enum Error {
    #[error("API request failed: {0}")]
    Api(#[from] pokedex_api::PokeApiError),

    #[error("Cache operation failed: {0}")]
    Cache(#[from] pokedex_cache::CacheError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
