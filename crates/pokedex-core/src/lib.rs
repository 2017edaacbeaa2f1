// Core logic: paging, caching and the screen controllers built on them
pub mod config;
pub mod detail;
pub mod error;
pub mod list;
pub mod mediator;
pub mod models;
pub mod moves;
pub mod pager;
pub mod repository;
pub mod resource;
pub mod source;

pub use config::Config;
pub use detail::{flatten_evolution_chain, DetailController};
pub use error::Error;
pub use list::{ListController, ListUpdate};
pub use mediator::{
    LoadType, MediatorResult, PagingConfig, PagingState, PokemonRemoteMediator, RemoteMediator,
};
pub use models::{format_name, PokemonEntry, StatLine, MAX_BASE_STAT};
pub use moves::{english_flavor_text, format_move_name, MoveDetailController};
pub use pager::{
    CombinedLoadStates, LoadState, MoveListSource, Pager, PagingSource, PokemonListSource,
};
pub use repository::PokemonRepository;
pub use resource::Resource;
pub use source::{PokeApiSource, PokemonSource};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
