// List screen state: search, sort and type filters feeding a pager
use pokedex_cache::{ListQuery, SortType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::pager::{Pager, PokemonListSource};
use crate::repository::PokemonRepository;

/// A new pager for a changed query.
///
/// Anything loaded through an older generation's pager should be dropped
/// once this arrives; check with [`ListController::accepts`].
pub struct ListUpdate {
    pub generation: u64,
    pub query: ListQuery,
    pub pager: Pager<PokemonListSource>,
}

pub struct ListController {
    repository: Arc<PokemonRepository>,
    debounce: Duration,

    search_query: String,
    sort_type: SortType,
    selected_types: Vec<String>,
    favorites_only: bool,

    // Search text only takes effect once typing has paused
    settled_search: String,
    search_deadline: Option<Instant>,

    issued: Option<ListQuery>,
    generation: u64,
}

impl ListController {
    pub fn new(repository: Arc<PokemonRepository>, debounce: Duration) -> Self {
        Self {
            repository,
            debounce,
            search_query: String::new(),
            sort_type: SortType::default(),
            selected_types: Vec::new(),
            favorites_only: false,
            settled_search: String::new(),
            search_deadline: None,
            issued: None,
            generation: 0,
        }
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn sort_type(&self) -> SortType {
        self.sort_type
    }

    pub fn selected_types(&self) -> &[String] {
        &self.selected_types
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn on_search_query_changed(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.search_deadline = Some(Instant::now() + self.debounce);
    }

    pub fn on_sort_type_changed(&mut self, sort_type: SortType) {
        self.sort_type = sort_type;
    }

    /// Select a type, or deselect it if it already was
    pub fn on_type_selected(&mut self, kind: &str) {
        if let Some(pos) = self.selected_types.iter().position(|t| t == kind) {
            self.selected_types.remove(pos);
        } else {
            self.selected_types.push(kind.to_string());
        }
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.favorites_only = favorites_only;
    }

    /// Apply the search text now instead of waiting out the debounce
    pub fn flush_search(&mut self) {
        self.settled_search = self.search_query.clone();
        self.search_deadline = None;
    }

    /// The query the list reflects right now (search as of the last settled keystroke)
    pub fn effective_query(&self) -> ListQuery {
        let query = ListQuery::new(
            self.settled_search.clone(),
            self.sort_type,
            self.selected_types.clone(),
        );
        if self.favorites_only {
            query.favorites()
        } else {
            query
        }
    }

    /// Whether results tagged with `generation` still belong on screen
    pub fn accepts(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// A new pager if the effective query changed since the last one was issued
    pub fn poll(&mut self) -> Option<ListUpdate> {
        if let Some(deadline) = self.search_deadline {
            if Instant::now() >= deadline {
                self.flush_search();
            }
        }

        let query = self.effective_query();
        if self.issued.as_ref() == Some(&query) {
            return None;
        }

        self.generation += 1;
        self.issued = Some(query.clone());
        debug!("List query generation {}: {:?}", self.generation, query);

        Some(ListUpdate {
            generation: self.generation,
            pager: self.repository.pokemon_list(query.clone()),
            query,
        })
    }

    /// Wait out a pending search debounce, then poll
    pub async fn next_update(&mut self) -> Option<ListUpdate> {
        if let Some(deadline) = self.search_deadline {
            tokio::time::sleep_until(deadline).await;
        }
        self.poll()
    }
}
