// Single entry point for catalog data: local cache first, PokeAPI behind it
use futures::stream::{self, BoxStream, StreamExt};
use pokedex_api::{EvolutionChain, MoveDetail, Pokemon, PokemonSpecies};
use pokedex_cache::{CacheManager, ListQuery, MoveRow};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::mediator::{PagingConfig, PokemonRemoteMediator, RemoteMediator};
use crate::models::{format_name, row_from_detail, PokemonEntry};
use crate::pager::{MoveListSource, Pager, PokemonListSource};
use crate::resource::Resource;
use crate::source::PokemonSource;
use crate::Result;

/// PokeAPI's move index has a little under a thousand entries
pub const MOVE_SYNC_LIMIT: u32 = 1000;

const UNKNOWN_ERROR: &str = "An unknown error occurred.";

pub struct PokemonRepository {
    source: Arc<dyn PokemonSource>,
    cache: Arc<CacheManager>,
    paging: PagingConfig,
    // Shared by every list pager so remote loads stay single-flight across query changes
    mediator: Arc<PokemonRemoteMediator>,
}

impl PokemonRepository {
    pub fn new(source: Arc<dyn PokemonSource>, cache: Arc<CacheManager>, paging: PagingConfig) -> Self {
        let mediator = Arc::new(PokemonRemoteMediator::new(
            source.clone(),
            cache.clone(),
            paging.page_size,
        ));
        Self {
            source,
            cache,
            paging,
            mediator,
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn paging(&self) -> PagingConfig {
        self.paging
    }

    /// A fresh pager for `query`.
    ///
    /// Only the plain catalog view pulls from the network. A search or type
    /// filter pages through whatever is already cached.
    pub fn pokemon_list(&self, query: ListQuery) -> Pager<PokemonListSource> {
        let mediator: Option<Arc<dyn RemoteMediator<Item = PokemonEntry>>> =
            if query.is_unfiltered() {
                Some(self.mediator.clone())
            } else {
                None
            };
        debug!(
            "New list pager (search={:?}, sort={}, types={:?}, remote={})",
            query.search,
            query.sort,
            query.types,
            mediator.is_some()
        );
        Pager::new(
            PokemonListSource::new(self.cache.clone(), query),
            self.paging,
            mediator,
        )
    }

    /// Cached detail first, then the network result.
    ///
    /// Emits `Loading(cached)` followed by either `Success(fresh)` or
    /// `Error { data: cached, .. }`.
    pub fn pokemon_info(&self, name: &str) -> BoxStream<'static, Resource<Pokemon>> {
        let name = format_name(name);
        let cached = self.cached_detail(&name);
        let loading = Resource::Loading(cached.clone());
        let source = self.source.clone();
        let cache = self.cache.clone();

        let fetch = async move {
            match fetch_and_store(source.as_ref(), &cache, &name).await {
                Ok(Some(fresh)) => Resource::Success(fresh),
                Ok(None) => Resource::Error {
                    message: "Data not found after fetch.".to_string(),
                    data: cached,
                },
                Err(e) => {
                    warn!("Detail fetch for {} failed: {}", name, e);
                    Resource::Error {
                        message: format!("Network error: {}", e),
                        data: cached,
                    }
                }
            }
        };

        stream::once(futures::future::ready(loading))
            .chain(stream::once(fetch))
            .boxed()
    }

    pub fn pokemon_from_db(&self, name: &str) -> Result<Option<PokemonEntry>> {
        self.cache
            .get_pokemon(&format_name(name))?
            .map(PokemonEntry::try_from)
            .transpose()
    }

    /// Returns false when the item isn't cached
    pub fn set_favorite(&self, name: &str, is_favorite: bool) -> Result<bool> {
        let name = format_name(name);
        let updated = self.cache.set_favorite(&name, is_favorite)?;
        if updated {
            info!("{} favorite: {}", name, is_favorite);
        }
        Ok(updated)
    }

    pub async fn pokemon_species(&self, name: &str) -> Resource<PokemonSpecies> {
        match self.source.pokemon_species(&name.to_lowercase()).await {
            Ok(species) => Resource::Success(species),
            Err(e) => {
                warn!("Species lookup for {} failed: {}", name, e);
                Resource::error(UNKNOWN_ERROR)
            }
        }
    }

    pub async fn evolution_chain(&self, url: &str) -> Resource<EvolutionChain> {
        match self.source.evolution_chain(url).await {
            Ok(chain) => Resource::Success(chain),
            Err(e) => {
                warn!("Evolution chain {} failed: {}", url, e);
                Resource::error(UNKNOWN_ERROR)
            }
        }
    }

    /// Local-only pager over the synced move index
    pub fn move_list(&self) -> Pager<MoveListSource> {
        Pager::new(MoveListSource::new(self.cache.clone()), self.paging, None)
    }

    /// Pull the whole move index in one request. Returns how many moves were stored.
    pub async fn sync_move_list(&self) -> Result<usize> {
        let listing = match self.source.move_list(MOVE_SYNC_LIMIT, 0).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Move sync failed: {}", e);
                return Err(e);
            }
        };

        let moves: Vec<MoveRow> = listing
            .results
            .into_iter()
            .map(|m| MoveRow {
                name: m.name,
                url: m.url,
            })
            .collect();
        self.cache.insert_moves(&moves)?;
        info!("Synced {} moves", moves.len());
        Ok(moves.len())
    }

    pub async fn move_info(&self, name: &str) -> Resource<MoveDetail> {
        match self.source.move_detail(&name.to_lowercase()).await {
            Ok(detail) => Resource::Success(detail),
            Err(e) => {
                warn!("Move lookup for {} failed: {}", name, e);
                Resource::error(UNKNOWN_ERROR)
            }
        }
    }

    fn cached_detail(&self, name: &str) -> Option<Pokemon> {
        match self.pokemon_from_db(name) {
            Ok(entry) => entry.and_then(|e| e.detail),
            Err(e) => {
                debug!("Cached detail for {} unreadable: {}", name, e);
                None
            }
        }
    }
}

/// Fetch a detail payload and store it against its catalog row.
///
/// A row that isn't cached yet (looked up directly rather than scrolled to)
/// is created from the payload, keeping any favorite mark it had before.
async fn fetch_and_store(
    source: &dyn PokemonSource,
    cache: &CacheManager,
    name: &str,
) -> Result<Option<Pokemon>> {
    let detail = source.pokemon(&name.to_lowercase()).await?;
    let value = serde_json::to_value(&detail)?;

    let stored_as = if cache.update_pokemon_detail(name, &value)? {
        name.to_string()
    } else {
        let row_name = format_name(&detail.name);
        cache.transaction(|tx| {
            let row = row_from_detail(&detail, tx.is_favorite(&row_name)?)?;
            tx.insert_pokemon(std::slice::from_ref(&row))?;
            Ok::<_, crate::Error>(())
        })?;
        debug!("Cached {} on first lookup", row_name);
        row_name
    };

    let stored = cache
        .get_pokemon(&stored_as)?
        .map(PokemonEntry::try_from)
        .transpose()?;
    Ok(stored.and_then(|entry| entry.detail))
}
