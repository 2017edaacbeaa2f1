use async_trait::async_trait;
use pokedex_api::{
    EvolutionChain, MoveDetail, NamedResource, NamedResourceList, PokeApiError, Pokemon,
    PokemonSpecies,
};
use pokedex_cache::{CacheManager, ListQuery, SortType};
use pokedex_core::{
    DetailController, ListController, LoadState, PagingConfig, PokemonRepository, PokemonSource,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CATALOG: &[(&str, &str, i64)] = &[
    ("bulbasaur", "grass", 45),
    ("ivysaur", "grass", 60),
    ("venusaur", "grass", 80),
    ("charmander", "fire", 39),
    ("charmeleon", "fire", 58),
];

/// Scripted stand-in for PokeAPI over a fixed five-entry catalog
#[derive(Default)]
struct FakeCatalog {
    list_calls: AtomicUsize,
    offline: AtomicBool,
    broken_detail: Mutex<Option<String>>,
}

impl FakeCatalog {
    fn unavailable() -> pokedex_core::Error {
        PokeApiError::RequestFailed {
            status: 503,
            body: "offline".into(),
        }
        .into()
    }

    fn check_online(&self) -> pokedex_core::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Self::unavailable())
        } else {
            Ok(())
        }
    }
}

fn detail(id: usize) -> Pokemon {
    let (name, kind, hp) = CATALOG[id - 1];
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "sprites": { "front_default": format!("https://img.example/{}.png", id) },
        "types": [{ "slot": 1, "type": { "name": kind } }],
        "stats": [
            { "base_stat": hp, "stat": { "name": "hp" } },
            { "base_stat": 50, "stat": { "name": "attack" } },
            { "base_stat": 50, "stat": { "name": "defense" } }
        ]
    }))
    .unwrap()
}

#[async_trait]
impl PokemonSource for FakeCatalog {
    async fn pokemon_list(&self, limit: u32, offset: u32) -> pokedex_core::Result<NamedResourceList> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let results = CATALOG
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(name, _, _)| NamedResource {
                name: name.to_string(),
                url: String::new(),
            })
            .collect();
        Ok(NamedResourceList {
            count: CATALOG.len() as u32,
            next: None,
            previous: None,
            results,
        })
    }

    async fn pokemon(&self, name: &str) -> pokedex_core::Result<Pokemon> {
        self.check_online()?;
        let id = CATALOG
            .iter()
            .position(|(n, _, _)| *n == name)
            .map(|i| i + 1)
            .ok_or_else(|| PokeApiError::NotFound(name.to_string()))?;

        // Earlier entries answer later, so completion order differs from list order
        tokio::time::sleep(Duration::from_millis(50 - 10 * id as u64)).await;

        if self.broken_detail.lock().unwrap().as_deref() == Some(name) {
            return Err(Self::unavailable());
        }
        Ok(detail(id))
    }

    async fn pokemon_species(&self, name: &str) -> pokedex_core::Result<PokemonSpecies> {
        Ok(PokemonSpecies {
            id: 1,
            name: name.to_string(),
            evolution_chain: None,
            flavor_text_entries: Vec::new(),
        })
    }

    async fn evolution_chain(&self, url: &str) -> pokedex_core::Result<EvolutionChain> {
        Err(PokeApiError::NotFound(url.to_string()).into())
    }

    async fn move_list(&self, _limit: u32, _offset: u32) -> pokedex_core::Result<NamedResourceList> {
        Err(Self::unavailable())
    }

    async fn move_detail(&self, name: &str) -> pokedex_core::Result<MoveDetail> {
        Err(PokeApiError::NotFound(name.to_string()).into())
    }
}

fn setup() -> (Arc<FakeCatalog>, Arc<PokemonRepository>) {
    let catalog = Arc::new(FakeCatalog::default());
    let cache = Arc::new(CacheManager::in_memory().unwrap());
    let repository = Arc::new(PokemonRepository::new(
        catalog.clone(),
        cache,
        PagingConfig::new(2),
    ));
    (catalog, repository)
}

fn names<'a>(items: impl Iterator<Item = &'a pokedex_core::PokemonEntry>) -> Vec<&'a str> {
    items.map(|p| p.name.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_favorite_survives_refresh() {
    let (_, repository) = setup();
    let mut pager = repository.pokemon_list(ListQuery::default());
    pager.refresh().await;
    assert_eq!(names(pager.items()), vec!["Bulbasaur", "Ivysaur"]);

    assert!(repository.set_favorite("Ivysaur", true).unwrap());

    pager.refresh().await;
    let ivysaur = pager.items().find(|p| p.name == "Ivysaur").unwrap();
    assert!(ivysaur.is_favorite);
    assert!(!pager.get(0).unwrap().is_favorite);
}

#[tokio::test(start_paused = true)]
async fn test_pagination_stops_on_empty_page() {
    let (catalog, repository) = setup();
    let mut pager = repository.pokemon_list(ListQuery::default());
    pager.refresh().await;

    let mut appends = 0;
    while pager.can_load_more() {
        pager.load_more().await;
        appends += 1;
        assert!(appends < 10, "pager never reached the end");
    }

    assert_eq!(
        names(pager.items()),
        vec!["Bulbasaur", "Ivysaur", "Venusaur", "Charmander", "Charmeleon"]
    );
    assert!(pager.load_states().append.is_end());
    // Refresh, two full pages, the short page, then the empty page
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 4);

    pager.load_more().await;
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_catalog_loads_after_direct_lookup() {
    let (catalog, repository) = setup();

    // Looked up by name before the list was ever fetched
    let mut detail = DetailController::new(repository.clone());
    detail.load("charmander").await.unwrap();
    assert_eq!(detail.is_favorite(), Some(false));

    let mut pager = repository.pokemon_list(ListQuery::default());
    pager.refresh_local();
    assert_eq!(names(pager.items()), vec!["Charmander"]);

    let mut appends = 0;
    while pager.can_load_more() {
        pager.load_more().await;
        appends += 1;
        assert!(appends < 10, "pager never reached the end");
    }

    assert_eq!(
        names(pager.items()),
        vec!["Bulbasaur", "Ivysaur", "Venusaur", "Charmander", "Charmeleon"]
    );
    assert!(pager.load_states().append.is_end());
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_page_size_change_resumes_where_index_left_off() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("pokedex.db");
    let catalog = Arc::new(FakeCatalog::default());

    {
        let cache = Arc::new(CacheManager::open(&path).unwrap());
        let repository = PokemonRepository::new(catalog.clone(), cache, PagingConfig::new(2));
        let mut pager = repository.pokemon_list(ListQuery::default());
        pager.refresh().await;
        pager.load_more().await;
        assert_eq!(pager.len(), 4);
    }

    let cache = Arc::new(CacheManager::open(&path).unwrap());
    let repository = PokemonRepository::new(catalog.clone(), cache, PagingConfig::new(3));
    let mut pager = repository.pokemon_list(ListQuery::default());
    pager.refresh_local();
    assert_eq!(pager.len(), 3);

    let mut appends = 0;
    while pager.can_load_more() {
        pager.load_more().await;
        appends += 1;
        assert!(appends < 10, "pager never reached the end");
    }

    assert_eq!(
        names(pager.items()),
        vec!["Bulbasaur", "Ivysaur", "Venusaur", "Charmander", "Charmeleon"]
    );
    assert!(pager.load_states().append.is_end());
    // Two calls in the first run; the second fetches Charmeleon, then the empty page
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_query_change_reloads_list() {
    let (catalog, repository) = setup();
    let mut list = ListController::new(repository.clone(), Duration::from_millis(500));

    let mut first = list.poll().unwrap();
    first.pager.refresh().await;
    while first.pager.can_load_more() {
        first.pager.load_more().await;
    }
    let remote_calls = catalog.list_calls.load(Ordering::SeqCst);

    list.on_search_query_changed("char");
    let mut searched = list.next_update().await.unwrap();
    assert!(!list.accepts(first.generation));
    searched.pager.refresh().await;
    assert_eq!(names(searched.pager.items()), vec!["Charmander", "Charmeleon"]);

    list.on_sort_type_changed(SortType::Hp);
    let mut sorted = list.poll().unwrap();
    assert_eq!(sorted.generation, searched.generation + 1);
    sorted.pager.refresh().await;
    assert_eq!(names(sorted.pager.items()), vec!["Charmeleon", "Charmander"]);

    list.on_type_selected("grass");
    let mut typed = list.poll().unwrap();
    typed.pager.refresh().await;
    assert!(typed.pager.is_empty());

    // Filtered views only read the cache
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), remote_calls);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_favorite_twice_restores_state() {
    let (_, repository) = setup();
    repository.pokemon_list(ListQuery::default()).refresh().await;

    let mut detail = DetailController::new(repository.clone());
    detail.load("bulbasaur").await.unwrap();
    assert!(detail.info().is_success());
    assert_eq!(detail.is_favorite(), Some(false));

    detail.toggle_favorite().unwrap();
    detail.toggle_favorite().unwrap();

    let entry = repository.pokemon_from_db("Bulbasaur").unwrap().unwrap();
    assert!(!entry.is_favorite);
    assert_eq!(detail.is_favorite(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_failed_append_keeps_pages_and_retries() {
    let (catalog, repository) = setup();
    let mut pager = repository.pokemon_list(ListQuery::default());
    pager.refresh().await;

    catalog.offline.store(true, Ordering::SeqCst);
    pager.load_more().await;
    assert_eq!(names(pager.items()), vec!["Bulbasaur", "Ivysaur"]);
    assert!(matches!(pager.load_states().append, LoadState::Error(_)));
    assert!(pager.load_states().error().is_some());

    // Scrolling doesn't hammer a failed load; retry does
    assert!(!pager.on_item_visible(1).await);

    catalog.offline.store(false, Ordering::SeqCst);
    pager.retry().await;
    assert_eq!(pager.len(), 4);
    assert!(pager.load_states().error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_leaves_cache_untouched() {
    let (catalog, repository) = setup();
    let mut pager = repository.pokemon_list(ListQuery::default());
    pager.refresh().await;
    pager.load_more().await;
    assert_eq!(pager.len(), 4);

    // One bad detail aborts the whole refresh before anything is cleared
    *catalog.broken_detail.lock().unwrap() = Some("ivysaur".to_string());
    let mut fresh = repository.pokemon_list(ListQuery::default());
    fresh.refresh().await;

    assert!(matches!(fresh.load_states().refresh, LoadState::Error(_)));
    assert_eq!(names(fresh.items()), vec!["Bulbasaur", "Ivysaur"]);
    assert_eq!(repository.cache().count_pokemon(&ListQuery::default()).unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_appends_do_not_duplicate() {
    let (_, repository) = setup();
    let mut left = repository.pokemon_list(ListQuery::default());
    let mut right = repository.pokemon_list(ListQuery::default());
    left.refresh().await;
    right.refresh().await;

    tokio::join!(left.load_more(), right.load_more());

    for pager in [&left, &right] {
        let shown = names(pager.items());
        let unique: HashSet<&str> = shown.iter().copied().collect();
        assert_eq!(shown.len(), unique.len());
        assert_eq!(shown, vec!["Bulbasaur", "Ivysaur", "Venusaur", "Charmander"]);
    }
    assert_eq!(repository.cache().count_pokemon(&ListQuery::default()).unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_favorite_survives_restart_and_refresh() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("pokedex.db");
    let catalog = Arc::new(FakeCatalog::default());

    {
        let cache = Arc::new(CacheManager::open(&path).unwrap());
        let repository = PokemonRepository::new(catalog.clone(), cache, PagingConfig::new(2));
        repository.pokemon_list(ListQuery::default()).refresh().await;
        assert!(repository.set_favorite("bulbasaur", true).unwrap());
    }

    let cache = Arc::new(CacheManager::open(&path).unwrap());
    let repository = PokemonRepository::new(catalog, cache, PagingConfig::new(2));
    let mut pager = repository.pokemon_list(ListQuery::default());

    pager.refresh_local();
    assert!(pager.get(0).unwrap().is_favorite);

    pager.refresh().await;
    assert!(pager.get(0).unwrap().is_favorite);

    let mut favorites = repository.pokemon_list(ListQuery::default().favorites());
    favorites.refresh().await;
    assert_eq!(names(favorites.items()), vec!["Bulbasaur"]);
}
