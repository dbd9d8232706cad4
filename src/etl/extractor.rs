//! Rate-limited, retrying PokéAPI client.
//!
//! One extractor instance is shared by all coordinator workers; its
//! rate-limiter timestamp is the single point of throttling for every
//! request the pipeline issues.

use crate::error::{DataShapeError, ExtractError, FetchError};
use crate::etl::records::{PokemonListEntry, RawMoveEntry, RawPokemonPayload};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Minimum spacing between requests, measured from the end of the previous
/// request.
const RATE_LIMIT_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PokeApiExtractor {
    http: reqwest::Client,
    base_url: String,
    /// Completion time of the most recent request. Held across the request
    /// so the minimum spacing holds even with concurrent workers.
    last_request: Mutex<Option<Instant>>,
}

impl PokeApiExtractor {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("pokedex-sync/0.1")
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_request: Mutex::new(None),
        })
    }

    /// Fetch the paginated Pokémon listing. IDs are parsed from the trailing
    /// numeric path segment of each result URL; entries whose URL cannot be
    /// parsed are skipped with a warning.
    pub async fn list_pokemon(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<PokemonListEntry>, ExtractError> {
        let url = match limit {
            Some(n) => format!("{}/pokemon?limit={}", self.base_url, n),
            None => format!("{}/pokemon", self.base_url),
        };
        let data = self.get_json(&url).await?;

        let results = data
            .get("results")
            .and_then(Value::as_array)
            .ok_or(DataShapeError {
                field: "results",
                url,
            })?;

        let mut entries = Vec::with_capacity(results.len());
        for result in results {
            let name = result.get("name").and_then(Value::as_str);
            let resource_url = result.get("url").and_then(Value::as_str);
            match (name, resource_url.and_then(extract_trailing_id)) {
                (Some(name), Some(id)) => entries.push(PokemonListEntry {
                    id,
                    name: name.to_string(),
                }),
                _ => log::warn!("skipping listing entry with unparseable url: {}", result),
            }
        }

        Ok(entries)
    }

    /// Assemble the full raw payload for one Pokémon: primary document,
    /// species document, the evolution chain referenced by the species, and
    /// move details.
    ///
    /// Only the first referenced move's detail is fetched; callers needing
    /// the full move history must extend the extractor.
    pub async fn fetch_pokemon(&self, pokedex_id: i32) -> Result<RawPokemonPayload, ExtractError> {
        log::info!("fetching data for pokemon #{}", pokedex_id);

        let pokemon = self
            .get_json(&format!("{}/pokemon/{}", self.base_url, pokedex_id))
            .await?;
        let species = self
            .get_json(&format!("{}/pokemon-species/{}", self.base_url, pokedex_id))
            .await?;

        let chain_url = species
            .pointer("/evolution_chain/url")
            .and_then(Value::as_str)
            .ok_or(DataShapeError {
                field: "evolution_chain",
                url: String::new(),
            })?;
        let chain_id = extract_trailing_id(chain_url).ok_or_else(|| DataShapeError {
            field: "evolution_chain",
            url: chain_url.to_string(),
        })?;
        let evolution_chain = self
            .get_json(&format!("{}/evolution-chain/{}", self.base_url, chain_id))
            .await?;

        let moves = self.fetch_first_move(&pokemon).await;

        Ok(RawPokemonPayload {
            pokemon,
            species,
            evolution_chain,
            moves,
        })
    }

    /// Fetch detail for the first move the Pokémon document references.
    /// Failures here degrade to an empty move list rather than failing the
    /// whole payload.
    async fn fetch_first_move(&self, pokemon: &Value) -> Vec<RawMoveEntry> {
        let Some(entry) = pokemon
            .get("moves")
            .and_then(Value::as_array)
            .and_then(|moves| moves.first())
        else {
            return Vec::new();
        };

        let Some(move_id) = entry
            .pointer("/move/url")
            .and_then(Value::as_str)
            .and_then(extract_trailing_id)
        else {
            log::warn!("skipping move entry with unparseable url: {}", entry);
            return Vec::new();
        };

        match self
            .get_json(&format!("{}/move/{}", self.base_url, move_id))
            .await
        {
            Ok(detail) => {
                let learn_details = entry
                    .get("version_group_details")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                vec![RawMoveEntry {
                    detail,
                    learn_details,
                }]
            }
            Err(err) => {
                log::error!("error fetching move #{}: {}", move_id, err);
                Vec::new()
            }
        }
    }

    /// GET a JSON document, retrying transient failures with linear backoff.
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY * attempt).await;
            }
            match self.request_once(url).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < MAX_RETRIES => {
                    log::warn!(
                        "attempt {}/{} failed for {}: {}; retrying",
                        attempt + 1,
                        MAX_RETRIES,
                        url,
                        err
                    );
                    attempt += 1;
                }
                Err(err) => {
                    log::error!("http error fetching {}: {}", url, err);
                    return Err(err);
                }
            }
        }
    }

    async fn request_once(&self, url: &str) -> Result<Value, FetchError> {
        // The lock is held across the request so spacing is measured from the
        // end of the previous request, whichever worker issued it.
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < RATE_LIMIT_DELAY {
                tokio::time::sleep(RATE_LIMIT_DELAY - elapsed).await;
            }
        }

        let result = self.http.get(url).send().await;
        *last = Some(Instant::now());
        drop(last);

        let response = result.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

/// Parse the trailing numeric path segment of a PokéAPI resource URL,
/// e.g. `https://pokeapi.co/api/v2/pokemon-species/25/` -> 25.
pub(crate) fn extract_trailing_id(url: &str) -> Option<i32> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_id_parses_with_and_without_slash() {
        assert_eq!(
            extract_trailing_id("https://pokeapi.co/api/v2/pokemon/25/"),
            Some(25)
        );
        assert_eq!(
            extract_trailing_id("https://pokeapi.co/api/v2/evolution-chain/10"),
            Some(10)
        );
    }

    #[test]
    fn trailing_id_rejects_non_numeric_segments() {
        assert_eq!(extract_trailing_id("https://pokeapi.co/api/v2/pokemon/"), None);
        assert_eq!(extract_trailing_id(""), None);
        assert_eq!(extract_trailing_id("not-a-url"), None);
    }

    #[test]
    fn base_url_is_normalized() {
        let extractor = PokeApiExtractor::new("http://localhost:8080/").expect("client builds");
        assert_eq!(extractor.base_url, "http://localhost:8080");
    }
}
