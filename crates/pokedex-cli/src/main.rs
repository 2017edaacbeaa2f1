mod output;

use anyhow::{bail, Context};
use clap::Parser;
use pokedex_api::{PokeApiClient, RetryConfig};
use pokedex_cache::{CacheManager, ListQuery, SortType};
use pokedex_core::{
    Config, DetailController, ListController, MoveDetailController, PagingConfig, PagingSource,
    Pager, PokeApiSource, PokemonRepository,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pokedex")]
#[command(version, about = "Browse the Pokédex from your terminal, backed by a local cache", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "POKEDEX_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite cache file
    #[arg(long, global = true, env = "POKEDEX_DB")]
    db: Option<PathBuf>,

    /// Items per page
    #[arg(long, global = true)]
    page_size: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List Pokémon, fetching more pages from PokeAPI as needed
    List {
        /// Only names containing this text
        #[arg(short, long)]
        search: Option<String>,
        /// number, name, hp, attack or defense
        #[arg(long, default_value = "number")]
        sort: SortType,
        /// Only these types (repeatable; any match counts)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
        /// Only favorites
        #[arg(short, long)]
        favorites: bool,
        /// How many pages to show
        #[arg(short, long, default_value_t = 1)]
        pages: usize,
        /// Refetch from the first page instead of starting from the cache
        #[arg(long)]
        refresh: bool,
    },
    /// Show stats, abilities and evolution line for one Pokémon
    Show {
        /// Pokémon name (or dex number)
        name: String,
    },
    /// Toggle the favorite mark on a cached Pokémon
    Favorite {
        name: String,
    },
    /// List moves
    Moves {
        /// Download the move index again
        #[arg(long)]
        sync: bool,
        #[arg(short, long, default_value_t = 1)]
        pages: usize,
    },
    /// Show one move
    Move {
        name: String,
    },
    /// Drop the cached list and fetch the first page again
    Refresh,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with listing output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pokedex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let Some(command) = cli.command else {
        println!("No command specified. Try --help");
        return Ok(());
    };

    // Opened per command so `config` works even when the cache can't be
    let open = || open_repository(&config).map(Arc::new);

    match command {
        Commands::List {
            search,
            sort,
            types,
            favorites,
            pages,
            refresh,
        } => {
            let repository = open()?;
            let mut list = ListController::new(repository.clone(), config.search.debounce());
            if let Some(search) = search {
                list.on_search_query_changed(search);
                list.flush_search();
            }
            list.on_sort_type_changed(sort);
            for kind in &types {
                list.on_type_selected(&kind.to_lowercase());
            }
            list.set_favorites_only(favorites);

            let Some(update) = list.poll() else {
                bail!("no list query to run");
            };
            let mut pager = update.pager;

            let cached = repository.cache().count_pokemon(&ListQuery::default())?;
            if refresh || (pager.has_mediator() && cached == 0) {
                pager.refresh().await;
            } else {
                pager.refresh_local();
            }
            load_pages(&mut pager, pages).await;

            if pager.is_empty() {
                println!("Nothing matches.");
            }
            for entry in pager.items() {
                println!("{}", output::entry_line(entry));
            }
            report_errors(&pager);
        }
        Commands::Show { name } => {
            let repository = open()?;
            let mut detail = DetailController::new(repository.clone());
            detail.load(&name).await?;
            print!("{}", output::detail(&detail));
        }
        Commands::Favorite { name } => {
            let repository = open()?;
            let Some(entry) = repository.pokemon_from_db(&name)? else {
                bail!(
                    "{} isn't cached yet; run `pokedex show {}` first",
                    pokedex_core::format_name(&name),
                    name
                );
            };
            repository.set_favorite(&entry.name, !entry.is_favorite)?;
            let state = if entry.is_favorite { "removed from" } else { "added to" };
            println!("{} {} favorites", entry.name, state);
        }
        Commands::Moves { sync, pages } => {
            let repository = open()?;
            if sync || repository.cache().count_moves()? == 0 {
                if let Err(e) = repository.sync_move_list().await {
                    eprintln!("Move sync failed ({}); showing cached moves", e);
                }
            }
            let mut pager = repository.move_list();
            pager.refresh().await;
            load_pages(&mut pager, pages).await;

            for row in pager.items() {
                println!("{}", pokedex_core::format_move_name(&row.name));
            }
            report_errors(&pager);
        }
        Commands::Move { name } => {
            let repository = open()?;
            let mut moves = MoveDetailController::new(repository.clone());
            moves.load(&name).await;
            print!("{}", output::move_detail(&moves));
        }
        Commands::Refresh => {
            let repository = open()?;
            let mut pager = repository.pokemon_list(ListQuery::default());
            pager.refresh().await;
            report_errors(&pager);
            println!(
                "{} Pokémon cached",
                repository.cache().count_pokemon(&ListQuery::default())?
            );
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // CLI flags override the file
    if let Some(db) = &cli.db {
        config.cache.path = Some(db.clone());
    }
    if let Some(page_size) = cli.page_size {
        config.paging.page_size = page_size;
    }
    Ok(config)
}

fn open_repository(config: &Config) -> anyhow::Result<PokemonRepository> {
    let retry = RetryConfig {
        max_retries: config.api.max_retries,
        ..RetryConfig::default()
    };
    let client = PokeApiClient::builder(config.api.base_url.clone(), config.api.timeout(), retry)
        .context("failed to build HTTP client")?;

    let path = config.cache_path()?;
    let cache = CacheManager::open(&path)
        .with_context(|| format!("failed to open cache at {}", path.display()))?;
    tracing::debug!("Cache at {}", path.display());

    let paging = PagingConfig {
        prefetch_distance: config.paging.prefetch_distance,
        ..PagingConfig::new(config.paging.page_size)
    };
    Ok(PokemonRepository::new(
        Arc::new(PokeApiSource::new(client)),
        Arc::new(cache),
        paging,
    ))
}

/// Keep appending until `pages` pages are shown or the list ends
async fn load_pages<S: PagingSource>(pager: &mut Pager<S>, pages: usize) {
    while pager.page_count() < pages && pager.can_load_more() {
        let before = pager.len();
        pager.load_more().await;
        if pager.len() == before {
            break;
        }
    }
}

fn report_errors<S: PagingSource>(pager: &Pager<S>) {
    if let Some(message) = pager.load_states().error() {
        eprintln!("Warning: {}", message);
    }
}
