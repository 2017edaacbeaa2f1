// SQLite-backed local cache
// Keeps the list on screen between runs and makes offline browsing possible

pub mod cache;
pub mod error;
pub mod models;
pub mod query;

pub use cache::{CacheManager, CacheTx};
pub use error::{CacheError, Result};
pub use models::{MoveRow, PokemonRow, RemoteKey};
pub use query::{ListQuery, SortType};
