// Paged view over the local cache, optionally topped up by a remote mediator
use pokedex_cache::{CacheManager, ListQuery, MoveRow};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::mediator::{LoadType, MediatorResult, PagingConfig, PagingState, RemoteMediator};
use crate::models::PokemonEntry;
use crate::Result;

/// Where a pager reads its pages from
pub trait PagingSource: Send + Sync {
    type Item: Clone + Send + Sync + 'static;

    /// Stable identity used to drop duplicates when rows shift between pages
    fn key(item: &Self::Item) -> &str;

    fn load(&self, limit: usize, offset: usize) -> Result<Vec<Self::Item>>;
}

/// Pokémon rows matching a list query
pub struct PokemonListSource {
    cache: Arc<CacheManager>,
    query: ListQuery,
}

impl PokemonListSource {
    pub fn new(cache: Arc<CacheManager>, query: ListQuery) -> Self {
        Self { cache, query }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }
}

impl PagingSource for PokemonListSource {
    type Item = PokemonEntry;

    fn key(item: &PokemonEntry) -> &str {
        &item.name
    }

    fn load(&self, limit: usize, offset: usize) -> Result<Vec<PokemonEntry>> {
        self.cache
            .query_pokemon(&self.query, limit, offset)?
            .into_iter()
            .map(PokemonEntry::try_from)
            .collect()
    }
}

/// The cached move index, alphabetical
pub struct MoveListSource {
    cache: Arc<CacheManager>,
}

impl MoveListSource {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }
}

impl PagingSource for MoveListSource {
    type Item = MoveRow;

    fn key(item: &MoveRow) -> &str {
        &item.name
    }

    fn load(&self, limit: usize, offset: usize) -> Result<Vec<MoveRow>> {
        Ok(self.cache.moves(limit, offset)?)
    }
}

/// Progress of one kind of load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoading { end_of_pagination_reached: bool },
    Loading,
    Error(String),
}

impl LoadState {
    fn idle() -> Self {
        LoadState::NotLoading {
            end_of_pagination_reached: false,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(
            self,
            LoadState::NotLoading {
                end_of_pagination_reached: true
            }
        )
    }
}

/// Refresh and append progress, reported separately like a list screen needs them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedLoadStates {
    pub refresh: LoadState,
    pub append: LoadState,
}

impl CombinedLoadStates {
    /// The error to show with a retry button, refresh first
    pub fn error(&self) -> Option<&str> {
        match (&self.refresh, &self.append) {
            (LoadState::Error(message), _) | (_, LoadState::Error(message)) => Some(message),
            _ => None,
        }
    }
}

/// A scrollable, incrementally loaded list.
///
/// Pages always come out of the local source. When the source runs dry and a
/// mediator is attached, the mediator is asked to fetch more into storage and
/// the pager then reloads what it shows, the same way a list backed by an
/// observed query would be invalidated.
pub struct Pager<S: PagingSource> {
    source: S,
    mediator: Option<Arc<dyn RemoteMediator<Item = S::Item>>>,
    state: PagingState<S::Item>,
    load_states: CombinedLoadStates,
    remote_end_reached: bool,
    last_failed: Option<LoadType>,
}

impl<S: PagingSource> Pager<S> {
    pub fn new(
        source: S,
        config: PagingConfig,
        mediator: Option<Arc<dyn RemoteMediator<Item = S::Item>>>,
    ) -> Self {
        Self {
            source,
            mediator,
            state: PagingState::new(config),
            load_states: CombinedLoadStates {
                refresh: LoadState::idle(),
                append: LoadState::idle(),
            },
            remote_end_reached: false,
            last_failed: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn has_mediator(&self) -> bool {
        self.mediator.is_some()
    }

    pub fn items(&self) -> impl Iterator<Item = &S::Item> {
        self.state.pages.iter().flatten()
    }

    pub fn get(&self, index: usize) -> Option<&S::Item> {
        self.items().nth(index)
    }

    pub fn len(&self) -> usize {
        self.state.item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_count(&self) -> usize {
        self.state.pages.len()
    }

    pub fn load_states(&self) -> &CombinedLoadStates {
        &self.load_states
    }

    /// Whether another append could produce anything
    pub fn can_load_more(&self) -> bool {
        // After a failure only an explicit retry loads again
        matches!(
            self.load_states.append,
            LoadState::NotLoading {
                end_of_pagination_reached: false
            }
        )
    }

    /// Start over: remote refresh (when a mediator is attached), then reload the first page.
    ///
    /// A failed remote refresh still shows whatever is cached.
    pub async fn refresh(&mut self) -> &CombinedLoadStates {
        self.begin_refresh();

        let mut remote_error = None;
        if let Some(mediator) = &self.mediator {
            match mediator.load(LoadType::Refresh, &self.state).await {
                MediatorResult::Success {
                    end_of_pagination_reached,
                } => self.remote_end_reached = end_of_pagination_reached,
                MediatorResult::Error(e) => remote_error = Some(e.to_string()),
            }
        }

        self.finish_refresh(remote_error);
        &self.load_states
    }

    /// Reload the first page from what's already stored, skipping the remote refresh.
    ///
    /// Appends still reach the remote once the stored rows run out.
    pub fn refresh_local(&mut self) -> &CombinedLoadStates {
        self.begin_refresh();
        self.finish_refresh(None);
        &self.load_states
    }

    fn begin_refresh(&mut self) {
        self.load_states.refresh = LoadState::Loading;
        self.load_states.append = LoadState::idle();
        self.remote_end_reached = false;
    }

    fn finish_refresh(&mut self, remote_error: Option<String>) {
        let page_size = self.state.config.page_size;
        match self.reload(page_size) {
            Ok(()) => {
                self.load_states.append = LoadState::NotLoading {
                    end_of_pagination_reached: self.local_end(page_size),
                };
                match remote_error {
                    Some(message) => self.fail(LoadType::Refresh, message),
                    None => {
                        self.load_states.refresh = LoadState::idle();
                        self.last_failed = None;
                    }
                }
            }
            Err(e) => self.fail(LoadType::Refresh, remote_error.unwrap_or_else(|| e.to_string())),
        }
    }

    /// Load the next page, pulling from the remote when the cache runs out
    pub async fn load_more(&mut self) -> &CombinedLoadStates {
        if !self.can_load_more() {
            return &self.load_states;
        }
        self.load_states.append = LoadState::Loading;

        let page_size = self.state.config.page_size;
        let offset = self.len();
        let page = match self.source.load(page_size, offset) {
            Ok(page) => page,
            Err(e) => {
                self.fail(LoadType::Append, e.to_string());
                return &self.load_states;
            }
        };

        let short = page.len() < page_size;
        let wants_remote = short && self.mediator.is_some() && !self.remote_end_reached;
        if !wants_remote {
            self.push_page(page);
            self.finish_append(short);
            return &self.load_states;
        }

        let outcome = match &self.mediator {
            Some(mediator) => mediator.load(LoadType::Append, &self.state).await,
            None => MediatorResult::Success {
                end_of_pagination_reached: true,
            },
        };

        match outcome {
            MediatorResult::Success {
                end_of_pagination_reached,
            } => {
                self.remote_end_reached = end_of_pagination_reached;
                // Storage changed underneath us; re-read everything shown plus one page
                match self.reload(offset + page_size) {
                    Ok(()) => {
                        let short = self.len() < offset + page_size;
                        self.finish_append(short);
                    }
                    Err(e) => self.fail(LoadType::Append, e.to_string()),
                }
            }
            MediatorResult::Error(e) => {
                // Keep whatever the cache had so the list doesn't jump, then offer retry
                self.push_page(page);
                self.fail(LoadType::Append, e.to_string());
            }
        }

        &self.load_states
    }

    /// Scroll hook: call with the index of an item as it becomes visible
    pub async fn on_item_visible(&mut self, index: usize) -> bool {
        let near_end = index + self.state.config.prefetch_distance >= self.len();
        if near_end && self.can_load_more() {
            self.load_more().await;
            true
        } else {
            false
        }
    }

    /// Re-run whichever load failed last
    pub async fn retry(&mut self) -> &CombinedLoadStates {
        match self.last_failed {
            Some(LoadType::Refresh) => self.refresh().await,
            Some(LoadType::Append) => {
                self.load_states.append = LoadState::idle();
                self.load_more().await
            }
            Some(LoadType::Prepend) | None => &self.load_states,
        }
    }

    fn local_end(&self, requested: usize) -> bool {
        let short = self.len() < requested;
        short && (self.mediator.is_none() || self.remote_end_reached)
    }

    fn finish_append(&mut self, short: bool) {
        let end = short && (self.mediator.is_none() || self.remote_end_reached);
        self.load_states.append = LoadState::NotLoading {
            end_of_pagination_reached: end,
        };
        if self.last_failed == Some(LoadType::Append) {
            self.last_failed = None;
        }
    }

    fn fail(&mut self, load_type: LoadType, message: String) {
        warn!("{:?} failed: {}", load_type, message);
        let state = LoadState::Error(message);
        match load_type {
            LoadType::Refresh => self.load_states.refresh = state,
            _ => self.load_states.append = state,
        }
        self.last_failed = Some(load_type);
    }

    /// Replace everything shown with the first `target` items of the source
    fn reload(&mut self, target: usize) -> Result<()> {
        let items = self.source.load(target, 0)?;
        debug!("Reloaded {} items (asked for {})", items.len(), target);

        self.state.pages.clear();
        let page_size = self.state.config.page_size;
        let mut seen = HashSet::new();
        let mut page = Vec::with_capacity(page_size);
        for item in items {
            if !seen.insert(S::key(&item).to_string()) {
                continue;
            }
            page.push(item);
            if page.len() == page_size {
                self.state.pages.push(std::mem::take(&mut page));
            }
        }
        if !page.is_empty() {
            self.state.pages.push(page);
        }
        Ok(())
    }

    /// Append a page, skipping anything already shown
    fn push_page(&mut self, page: Vec<S::Item>) {
        let shown: HashSet<&str> = self.items().map(S::key).collect();
        let fresh: Vec<S::Item> = page
            .into_iter()
            .filter(|item| !shown.contains(S::key(item)))
            .collect();
        if !fresh.is_empty() {
            self.state.pages.push(fresh);
        }
    }
}
