// Bridges the paginated PokeAPI index and the local cache.
//
// The local cache is the single source of truth for what the list shows; the
// mediator's only job is to pull the next remote page into it when the pager
// runs out of cached rows.
use async_trait::async_trait;
use futures::future::try_join_all;
use pokedex_cache::{CacheManager, RemoteKey};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{format_name, row_from_detail, PokemonEntry};
use crate::source::PokemonSource;
use crate::{Error, Result};

/// Why the pager is asking for data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
    /// Start over from the first page
    Refresh,
    /// Load before the first item (the catalog only grows at the end)
    Prepend,
    /// Load after the last item
    Append,
}

/// Outcome of a mediator load
#[derive(Debug)]
pub enum MediatorResult {
    Success { end_of_pagination_reached: bool },
    Error(Error),
}

impl MediatorResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MediatorResult::Success { .. })
    }
}

/// Paging knobs shared by the pager and the mediator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    pub page_size: usize,
    pub prefetch_distance: usize,
}

impl PagingConfig {
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            prefetch_distance: page_size,
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Snapshot of what the pager currently holds
#[derive(Debug, Clone)]
pub struct PagingState<T> {
    pub pages: Vec<Vec<T>>,
    pub config: PagingConfig,
}

impl<T> PagingState<T> {
    pub fn new(config: PagingConfig) -> Self {
        Self {
            pages: Vec::new(),
            config,
        }
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Pulls remote pages into local storage on the pager's behalf
#[async_trait]
pub trait RemoteMediator: Send + Sync {
    type Item: Send + Sync;

    async fn load(&self, load_type: LoadType, state: &PagingState<Self::Item>) -> MediatorResult;
}

/// Fetches pages of the Pokémon index plus each entry's detail and writes them to the cache
pub struct PokemonRemoteMediator {
    source: Arc<dyn PokemonSource>,
    cache: Arc<CacheManager>,
    page_size: u32,
    // Serializes loads so two appends never interleave their writes
    in_flight: Mutex<()>,
}

impl PokemonRemoteMediator {
    pub fn new(source: Arc<dyn PokemonSource>, cache: Arc<CacheManager>, page_size: usize) -> Self {
        Self {
            source,
            cache,
            page_size: page_size.max(1) as u32,
            in_flight: Mutex::new(()),
        }
    }

    /// Continuation to append from.
    ///
    /// The remote index is in dex order, so under any other sort the list's last
    /// row isn't necessarily the last one fetched. Rows cached by a direct lookup
    /// have no key, so the highest-numbered loaded row that has one wins, then
    /// the furthest key stored at all.
    fn append_key(&self, state: &PagingState<PokemonEntry>) -> Result<Option<RemoteKey>> {
        let mut loaded: Vec<&PokemonEntry> = state.pages.iter().flatten().collect();
        loaded.sort_by_key(|p| std::cmp::Reverse(p.number));
        for entry in loaded {
            if let Some(key) = self.cache.remote_key(&entry.name)? {
                return Ok(Some(key));
            }
        }
        Ok(self.cache.furthest_remote_key()?)
    }

    /// Returns whether the end of the remote catalog has been reached
    async fn try_load(&self, load_type: LoadType, state: &PagingState<PokemonEntry>) -> Result<bool> {
        let offset = match load_type {
            LoadType::Refresh => 0,
            LoadType::Prepend => return Ok(true),
            LoadType::Append => match self.append_key(state)? {
                Some(RemoteKey {
                    next_key: Some(next),
                    ..
                }) => next,
                // A key with no successor means we already hit the end
                Some(_) => return Ok(true),
                // Nothing has come through the index yet
                None => 0,
            },
        };

        debug!("Fetching remote index at offset {} (limit {})", offset, self.page_size);
        let listing = self.source.pokemon_list(self.page_size, offset).await?;
        let fetched = listing.results.len() as u32;
        let end_of_pagination_reached = fetched == 0;

        // Details come back in list order even though the requests overlap
        let details = try_join_all(
            listing
                .results
                .iter()
                .map(|entry| self.source.pokemon(&entry.name)),
        )
        .await?;

        // Keys are item offsets into the index, so they stay valid when the page size changes
        let prev_key = if offset == 0 {
            None
        } else {
            Some(offset.saturating_sub(self.page_size))
        };
        let next_key = if end_of_pagination_reached {
            None
        } else {
            Some(offset + fetched)
        };

        self.cache.transaction(|tx| {
            if load_type == LoadType::Refresh {
                tx.clear_pokemon()?;
                tx.clear_remote_keys()?;
            }

            let mut rows = Vec::with_capacity(details.len());
            for detail in &details {
                let name = format_name(&detail.name);
                let is_favorite = tx.is_favorite(&name)?;
                rows.push(row_from_detail(detail, is_favorite)?);
            }
            tx.insert_pokemon(&rows)?;

            let keys: Vec<RemoteKey> = listing
                .results
                .iter()
                .map(|entry| RemoteKey {
                    name: format_name(&entry.name),
                    prev_key,
                    next_key,
                })
                .collect();
            tx.insert_remote_keys(&keys)?;
            Ok::<_, Error>(())
        })?;

        info!(
            "Stored remote index at offset {} ({} entries, end reached: {})",
            offset,
            details.len(),
            end_of_pagination_reached
        );
        Ok(end_of_pagination_reached)
    }
}

#[async_trait]
impl RemoteMediator for PokemonRemoteMediator {
    type Item = PokemonEntry;

    async fn load(&self, load_type: LoadType, state: &PagingState<PokemonEntry>) -> MediatorResult {
        let _guard = self.in_flight.lock().await;

        match self.try_load(load_type, state).await {
            Ok(end_of_pagination_reached) => MediatorResult::Success {
                end_of_pagination_reached,
            },
            Err(e) => {
                warn!("{:?} load failed: {}", load_type, e);
                MediatorResult::Error(e)
            }
        }
    }
}
