use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{EvolutionChain, MoveDetail, NamedResourceList, Pokemon, PokemonSpecies};
use crate::retry::{is_retryable_status, with_retry, RetryConfig};

pub const POKEAPI_BASE: &str = "https://pokeapi.co/api/v2";

#[derive(Error, Debug)]
pub enum PokeApiError {
    #[error("API request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl PokeApiError {
    /// Whether asking again could plausibly give a different answer
    pub fn is_retryable(&self) -> bool {
        match self {
            PokeApiError::NetworkError(_) | PokeApiError::RateLimitExceeded => true,
            PokeApiError::RequestFailed { status, .. } => reqwest::StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            PokeApiError::NotFound(_) | PokeApiError::ParseError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PokeApiError>;

pub struct PokeApiClient {
    client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl PokeApiClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(POKEAPI_BASE.to_string())
    }

    /// For mirrors or a local PokeAPI instance
    pub fn with_base_url(base_url: String) -> Result<Self> {
        Self::builder(base_url, Duration::from_secs(30), RetryConfig::default())
    }

    /// Full control over base URL, request timeout and retry behaviour
    pub fn builder(base_url: String, timeout: Duration, retry_config: RetryConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "Pokedex/",
                env!("CARGO_PKG_VERSION")
            )),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One page of the Pokémon index (`GET /pokemon?limit&offset`)
    pub async fn pokemon_list(&self, limit: u32, offset: u32) -> Result<NamedResourceList> {
        let url = format!("{}/pokemon", self.base_url);
        self.get_json(&url, &[("limit", limit), ("offset", offset)], "pokemon list")
            .await
    }

    /// Full detail for one Pokémon by name or id
    pub async fn pokemon(&self, name: &str) -> Result<Pokemon> {
        let url = format!("{}/pokemon/{}", self.base_url, encode_name(name));
        self.get_json(&url, &[], name).await
    }

    pub async fn pokemon_species(&self, name: &str) -> Result<PokemonSpecies> {
        let url = format!("{}/pokemon-species/{}", self.base_url, encode_name(name));
        self.get_json(&url, &[], name).await
    }

    /// Evolution chains are addressed by the absolute URL the species hands us
    pub async fn evolution_chain(&self, url: &str) -> Result<EvolutionChain> {
        self.get_json(url, &[], url).await
    }

    pub async fn move_list(&self, limit: u32, offset: u32) -> Result<NamedResourceList> {
        let url = format!("{}/move", self.base_url);
        self.get_json(&url, &[("limit", limit), ("offset", offset)], "move list")
            .await
    }

    pub async fn move_detail(&self, name: &str) -> Result<MoveDetail> {
        let url = format!("{}/move/{}", self.base_url, encode_name(name));
        self.get_json(&url, &[], name).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, u32)],
        what: &str,
    ) -> Result<T> {
        debug!("GET {} {:?}", url, query);

        with_retry(
            &self.retry_config,
            || async {
                let response = self.client.get(url).query(query).send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(PokeApiError::NotFound(what.to_string()));
                }

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(PokeApiError::RateLimitExceeded);
                }

                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PokeApiError::RequestFailed {
                        status: status.as_u16(),
                        body,
                    });
                }

                let body = response.text().await?;
                let parsed: T = serde_json::from_str(&body)?;
                Ok(parsed)
            },
            PokeApiError::is_retryable,
        )
        .await
    }
}

/// PokeAPI only knows lower-case slugs ("mr-mime"), the cache keeps display names ("Mr-mime")
fn encode_name(name: &str) -> String {
    urlencoding::encode(&name.trim().to_lowercase()).into_owned()
}
