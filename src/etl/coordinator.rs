//! Pipeline orchestration.
//!
//! The coordinator owns the run lifecycle: list the catalog, process it in
//! batches through a bounded worker pool, then give permanently failed
//! entities one more pass. Individual entity failures never abort the run;
//! only a failed listing does.

use crate::error::{EntityError, PipelineError};
use crate::etl::extractor::PokeApiExtractor;
use crate::etl::loader::PokemonLoader;
use crate::etl::records::PokemonListEntry;
use crate::etl::stats::{EtlStats, EtlStatsSnapshot, RunOutcome};
use crate::etl::transformer::transform_payload;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Inline retries per entity, on top of the initial attempt. Only transform
/// and load failures are retried here; fetch failures already exhausted the
/// extractor's own retry loop.
const MAX_ENTITY_RETRIES: u32 = 3;
const ENTITY_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cap on how many entities to process; `None` fetches the full catalog.
    pub limit: Option<u32>,
    pub batch_size: usize,
    pub max_workers: usize,
    /// Whether failed entities get an end-of-run retry pass.
    pub retry_failed: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: None,
            batch_size: 20,
            max_workers: 4,
            retry_failed: true,
        }
    }
}

/// Final report for one run.
#[derive(Debug, Clone)]
pub struct EtlReport {
    pub stats: EtlStatsSnapshot,
    pub outcome: RunOutcome,
    pub elapsed: Duration,
}

pub struct EtlCoordinator {
    extractor: Arc<PokeApiExtractor>,
    loader: Arc<PokemonLoader>,
}

impl EtlCoordinator {
    pub fn new(extractor: PokeApiExtractor, loader: PokemonLoader) -> Self {
        Self {
            extractor: Arc::new(extractor),
            loader: Arc::new(loader),
        }
    }

    /// Run the full pipeline. Fails only if the listing itself cannot be
    /// fetched; everything downstream is absorbed into the run statistics.
    pub async fn run(&self, options: RunOptions) -> Result<EtlReport, PipelineError> {
        let result = self.run_pipeline(options).await;
        // Caches die with the run, success or failure; the next run must
        // not trust ids resolved by this one.
        self.loader.clear_caches();
        result
    }

    async fn run_pipeline(&self, options: RunOptions) -> Result<EtlReport, PipelineError> {
        let started = Instant::now();
        let stats = Arc::new(EtlStats::default());

        let entries = self.extractor.list_pokemon(options.limit).await?;
        let batch_size = options.batch_size.max(1);
        let total_batches = entries.len().div_ceil(batch_size);
        log::info!(
            "starting etl run: {} pokemon, {} batches, {} workers",
            entries.len(),
            total_batches,
            options.max_workers
        );

        // One task per batch, gated by the worker semaphore. Entities inside
        // a batch are processed sequentially in listing order.
        let workers = Arc::new(Semaphore::new(options.max_workers.max(1)));
        let mut tasks = JoinSet::new();
        for (index, batch) in entries.chunks(batch_size).enumerate() {
            let batch = batch.to_vec();
            let extractor = Arc::clone(&self.extractor);
            let loader = Arc::clone(&self.loader);
            let stats = Arc::clone(&stats);
            let workers = Arc::clone(&workers);

            tasks.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };
                log::info!(
                    "processing batch {}/{} ({} pokemon)",
                    index + 1,
                    total_batches,
                    batch.len()
                );
                for entry in &batch {
                    process_single(&extractor, &loader, &stats, entry.id, &entry.name).await;
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                log::error!("batch task panicked: {}", err);
            }
        }

        if options.retry_failed {
            self.retry_failures(&stats, &entries).await;
        }

        let snapshot = stats.snapshot();
        let report = EtlReport {
            outcome: snapshot.outcome(),
            elapsed: started.elapsed(),
            stats: snapshot,
        };
        log_completion(&report);
        Ok(report)
    }

    /// One more sequential pass over everything that failed the main phase.
    /// Entities that fail again go back into the statistics as permanent
    /// failures.
    async fn retry_failures(&self, stats: &Arc<EtlStats>, entries: &[PokemonListEntry]) {
        let mut failed = stats.take_failures();
        if failed.is_empty() {
            return;
        }
        failed.sort_unstable();

        let names = names_by_id(entries);
        log::info!("retrying {} failed pokemon", failed.len());
        for pokedex_id in failed {
            let name = names.get(&pokedex_id).copied().unwrap_or("unknown");
            process_single(&self.extractor, &self.loader, stats, pokedex_id, name).await;
        }
    }
}

/// Process one Pokémon end to end, with inline retries for transform and
/// load failures. Outcomes land in the statistics; nothing propagates.
async fn process_single(
    extractor: &PokeApiExtractor,
    loader: &PokemonLoader,
    stats: &EtlStats,
    pokedex_id: i32,
    name: &str,
) {
    let mut attempt = 0u32;
    loop {
        match run_entity(extractor, loader, pokedex_id).await {
            Ok(()) => {
                stats.record_success();
                return;
            }
            Err(err) if err.is_retryable() && attempt < MAX_ENTITY_RETRIES => {
                attempt += 1;
                log::warn!(
                    "pokemon #{} ({}) failed (attempt {}/{}): {}; retrying",
                    pokedex_id,
                    name,
                    attempt,
                    MAX_ENTITY_RETRIES,
                    err
                );
                tokio::time::sleep(ENTITY_RETRY_DELAY * attempt).await;
            }
            Err(err) => {
                log::error!("pokemon #{} ({}) failed permanently: {}", pokedex_id, name, err);
                stats.record_failure(pokedex_id);
                return;
            }
        }
    }
}

/// Name lookup for the retry pass, which only has Pokédex IDs to go on.
fn names_by_id(entries: &[PokemonListEntry]) -> HashMap<i32, &str> {
    entries.iter().map(|e| (e.id, e.name.as_str())).collect()
}

async fn run_entity(
    extractor: &PokeApiExtractor,
    loader: &PokemonLoader,
    pokedex_id: i32,
) -> Result<(), EntityError> {
    let raw = extractor.fetch_pokemon(pokedex_id).await?;
    let bundle = transform_payload(&raw)?;
    loader.load_bundle(&bundle).await?;
    Ok(())
}

fn log_completion(report: &EtlReport) {
    let stats = &report.stats;
    let avg_ms = if stats.total_processed > 0 {
        report.elapsed.as_millis() / stats.total_processed as u128
    } else {
        0
    };

    log::info!(
        "etl run {}: {} processed, {} successful, {} failed in {:.1}s (avg {}ms/pokemon)",
        report.outcome,
        stats.total_processed,
        stats.successful,
        stats.failed,
        report.elapsed.as_secs_f64(),
        avg_ms
    );
    if !stats.failed_ids.is_empty() {
        log::warn!("failed pokemon ids: {:?}", stats.failed_ids);
    }
}
